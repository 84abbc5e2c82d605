//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{ConfigDraft, Difficulty, QuestionType};
use crate::session::SessionView;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    /// Any subset of the selection fields; missing ones keep their value.
    Configure {
        #[serde(flatten)]
        config: ConfigDraft,
    },
    Restart,
    SwitchView {
        view: QuestionType,
    },
    UpdateDraft {
        text: String,
    },
    Submit,
    RevealSolution,
    RevealHint,
    SuggestTopic {
        difficulty: Difficulty,
    },
    Snapshot,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session {
        session: SessionView,
    },
    Topic {
        difficulty: Difficulty,
        topic: String,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct ViewIn {
    pub view: QuestionType,
}

#[derive(Debug, Deserialize)]
pub struct DraftIn {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct TopicQuery {
    pub difficulty: Option<Difficulty>,
}

#[derive(Serialize)]
pub struct TopicOut {
    pub difficulty: Difficulty,
    pub topic: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub provider: String,
    pub sessions: usize,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TypePreference;

    #[test]
    fn configure_accepts_partial_fields() {
        let msg: ClientWsMessage =
            serde_json::from_str(r#"{"type":"configure","topic":"Bubble Sort","typePreference":"any"}"#).unwrap();
        match msg {
            ClientWsMessage::Configure { config } => {
                assert_eq!(config.topic.as_deref(), Some("Bubble Sort"));
                assert_eq!(config.type_preference, Some(TypePreference::Either));
                assert_eq!(config.difficulty, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unit_and_struct_variants_parse() {
        let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"submit"}"#).unwrap();
        assert!(matches!(msg, ClientWsMessage::Submit));
        let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"switch_view","view":"conceptual"}"#).unwrap();
        assert!(matches!(msg, ClientWsMessage::SwitchView { view: QuestionType::Conceptual }));
    }

    #[test]
    fn server_messages_are_tagged() {
        let out = serde_json::to_value(ServerWsMessage::Error { message: "nope".into() }).unwrap();
        assert_eq!(out["type"], "error");
        assert_eq!(out["message"], "nope");
    }
}

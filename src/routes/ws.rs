//! WebSocket upgrade + message loop. Each connection owns one session.
//!
//! The reader applies intents in arrival order and spawns any provider call
//! they owe. A writer task streams every published snapshot plus direct
//! replies (pong, topic, error) back to the client.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::logic::{self, Intent};
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::session::SessionView;
use crate::state::{AppState, SessionHandle};

type Replies = mpsc::UnboundedSender<ServerWsMessage>;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "codecrafter", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
  let handle = state.create_session().await;
  info!(target: "codecrafter", id = %handle.id(), "WebSocket connected");

  let (sink, mut stream) = socket.split();
  let (replies, reply_rx) = mpsc::unbounded_channel();
  let writer = tokio::spawn(write_loop(sink, handle.subscribe(), reply_rx));

  while let Some(Ok(msg)) = stream.next().await {
    match msg {
      Message::Text(txt) => match serde_json::from_str::<ClientWsMessage>(&txt) {
        Ok(incoming) => {
          debug!(target: "codecrafter", id = %handle.id(), "WS received: {:?}", &incoming);
          dispatch(incoming, &state, &handle, &replies).await;
        }
        Err(e) => {
          let _ = replies.send(ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) });
        }
      },
      Message::Close(_) => break,
      _ => {}
    }
  }

  writer.abort();
  state.remove_session(handle.id()).await;
  info!(target: "codecrafter", id = %handle.id(), "WebSocket disconnected");
}

async fn dispatch(msg: ClientWsMessage, state: &Arc<AppState>, handle: &Arc<SessionHandle>, replies: &Replies) {
  let intent = match msg {
    ClientWsMessage::Ping => {
      let _ = replies.send(ServerWsMessage::Pong);
      return;
    }
    ClientWsMessage::Snapshot => {
      let _ = replies.send(ServerWsMessage::Session { session: handle.snapshot().await });
      return;
    }
    ClientWsMessage::SuggestTopic { difficulty } => {
      let (state, replies) = (state.clone(), replies.clone());
      tokio::spawn(async move {
        let reply = match logic::suggest_topic(&state, difficulty).await {
          Ok(topic) => ServerWsMessage::Topic { difficulty, topic },
          Err(e) => ServerWsMessage::Error { message: e.to_string() },
        };
        let _ = replies.send(reply);
      });
      return;
    }
    ClientWsMessage::Configure { config } => Intent::Configure(config),
    ClientWsMessage::Restart => Intent::Restart,
    ClientWsMessage::SwitchView { view } => Intent::SwitchView(view),
    ClientWsMessage::UpdateDraft { text } => Intent::UpdateDraft(text),
    ClientWsMessage::Submit => Intent::Submit,
    ClientWsMessage::RevealSolution => Intent::RevealSolution,
    ClientWsMessage::RevealHint => Intent::RevealHint,
  };

  match logic::start(handle, intent).await {
    Ok((_, Some(pending))) => {
      let (state, handle) = (state.clone(), handle.clone());
      tokio::spawn(async move {
        logic::resolve(&state, &handle, pending).await;
      });
    }
    Ok((_, None)) => {}
    Err(e) => {
      let _ = replies.send(ServerWsMessage::Error { message: e.to_string() });
    }
  }
}

async fn write_loop(
  mut sink: SplitSink<WebSocket, Message>,
  mut updates: watch::Receiver<SessionView>,
  mut replies: mpsc::UnboundedReceiver<ServerWsMessage>,
) {
  let first = updates.borrow_and_update().clone();
  if send(&mut sink, &ServerWsMessage::Session { session: first }).await.is_err() {
    return;
  }

  loop {
    let msg = tokio::select! {
      changed = updates.changed() => match changed {
        Ok(()) => ServerWsMessage::Session { session: updates.borrow_and_update().clone() },
        Err(_) => break,
      },
      reply = replies.recv() => match reply {
        Some(m) => m,
        None => break,
      },
    };
    if send(&mut sink, &msg).await.is_err() {
      break;
    }
  }
}

async fn send(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = match serde_json::to_string(msg) {
    Ok(out) => out,
    Err(e) => {
      warn!(target: "codecrafter", error = %e, "WS serialization error");
      return Ok(());
    }
  };
  sink.send(Message::Text(out)).await.map_err(|e| {
    error!(target: "codecrafter", error = %e, "WS send error");
    e
  })
}

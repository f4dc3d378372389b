use axum::{
    debug_handler,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::{registry::Outbound, AppState};

#[debug_handler]
pub async fn chat_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(async move |stream| serve(state, stream).await)
}

async fn serve(state: AppState, stream: WebSocket) {
    let (conn, mut rx) = super::connect(&state).await;
    let (mut sender, mut receiver) = stream.split();

    let writer = tokio::spawn(async move {
        while let Some(out) = rx.recv().await {
            match out {
                Outbound::Event(event) => {
                    let text = match event.to_text() {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(%conn, "could not encode outgoing event: {e}");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                if super::receive(&state, conn, text.as_str()).await.is_close() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => debug!(%conn, "ignoring non-text frame"),
        }
    }

    // drops the outbound sender, so the writer ends once its queue is flushed
    super::disconnect(&state, conn).await;
    let _ = writer.await;
}

//! Per-connection protocol handling.
//!
//! A connection starts `Connected`, becomes `Identified` once its client version
//! passes the allow-list, and is frozen in `Closing` when rejected. Handlers
//! are plain functions over `(state, connection id, payload)`.

mod command;
mod fanout;
mod identify;
mod msg;
mod room;
pub mod ws;

use tracing::{debug, error, info, warn};

use crate::{
    error::ChatError,
    protocol::{ClientEvent, ServerEvent},
    registry::{ConnId, ConnState, Identity, OutboundRx},
    AppState,
};

pub use fanout::{fan_out, Delivery, FanoutReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

impl Flow {
    pub fn is_close(self) -> bool {
        self == Flow::Close
    }
}

/// Registers a fresh transport and asks it to identify.
pub async fn connect(state: &AppState) -> (ConnId, OutboundRx) {
    let (conn, rx) = state.registry.register().await;
    state.registry.send_to(conn, ServerEvent::Handshake).await;
    info!(%conn, "client connected");
    (conn, rx)
}

pub async fn disconnect(state: &AppState, conn: ConnId) {
    match state.registry.unregister(conn).await {
        Some(ConnState::Identified(identity)) => info!(
            %conn,
            "client {} ({}) disconnected",
            identity.user.email.as_deref().unwrap_or("?"),
            identity.user.uid,
        ),
        Some(_) => info!(%conn, "unidentified client disconnected"),
        None => {}
    }
}

/// Handles one raw text frame from a socket.
///
/// `identify` runs before returning so nothing the client sends after it can
/// overtake it. Everything else is checked against the connection's state as
/// it is now, then runs as its own task with the identity it arrived under.
pub async fn receive(state: &AppState, conn: ConnId, text: &str) -> Flow {
    match ClientEvent::parse(text) {
        Ok(Some(event @ ClientEvent::Identify(_))) => dispatch(state, conn, event).await,
        Ok(Some(event)) => {
            let identity = match sender_identity(state, conn, &event).await {
                Ok(identity) => identity,
                Err(flow) => return flow,
            };
            let task_state = state.clone();
            state.tasks.spawn(async move {
                handle(&task_state, conn, event, Some(identity)).await;
            });
            Flow::Continue
        }
        Ok(None) => {
            debug!(%conn, "ignoring unknown event");
            Flow::Continue
        }
        Err(e) => report(state, conn, e).await,
    }
}

/// Handles one decoded event against the connection's current state.
pub async fn dispatch(state: &AppState, conn: ConnId, event: ClientEvent) -> Flow {
    match event {
        ClientEvent::Identify(_) => match state.registry.state(conn).await {
            None | Some(ConnState::Closing) => dropped(conn, &event),
            Some(_) => handle(state, conn, event, None).await,
        },
        event => match sender_identity(state, conn, &event).await {
            Ok(identity) => handle(state, conn, event, Some(identity)).await,
            Err(flow) => flow,
        },
    }
}

/// The identity an event is processed under, or how to answer a sender that has none.
async fn sender_identity(state: &AppState, conn: ConnId, event: &ClientEvent) -> Result<Identity, Flow> {
    match state.registry.state(conn).await {
        None | Some(ConnState::Closing) => Err(dropped(conn, event)),
        Some(ConnState::Connected) => Err(report(state, conn, ChatError::NotIdentified).await),
        Some(ConnState::Identified(identity)) => Ok(identity),
    }
}

fn dropped(conn: ConnId, event: &ClientEvent) -> Flow {
    debug!(%conn, event = event.name(), "dropping event from a closed connection");
    Flow::Close
}

async fn handle(state: &AppState, conn: ConnId, event: ClientEvent, identity: Option<Identity>) -> Flow {
    debug!(%conn, event = event.name(), "dispatching");

    use ClientEvent::*;
    let result = match (event, identity) {
        (Identify(payload), _) => identify::identify(state, conn, payload).await,
        (_, None) => Err(ChatError::NotIdentified),
        (Message(payload), Some(identity)) => msg::submit_message(state, conn, &identity, payload).await,
        (Attachment(payload), Some(_)) => msg::submit_attachment(state, conn, payload).await,
        (UserEvent(payload), Some(_)) => room::user_event(state, payload).await,
        (GetAllMessages(payload), Some(_)) => room::all_messages(state, conn, payload).await,
        (GetUnreadRooms(payload), Some(_)) => room::unread_rooms(state, conn, payload).await,
        (ReadRoom(payload), Some(_)) => room::read_room(state, payload).await,
        (GetPeopleInvolved(payload), Some(identity)) => {
            room::people_involved(state, conn, &identity, payload).await
        }
    };

    match result {
        Ok(()) => Flow::Continue,
        Err(e) => report(state, conn, e).await,
    }
}

/// Tells the client what went wrong and hangs up on fatal errors.
async fn report(state: &AppState, conn: ConnId, err: ChatError) -> Flow {
    match &err {
        ChatError::Persistence(_) => error!(%conn, "{err}"),
        _ => warn!(%conn, "{err}"),
    }

    state.registry.send_to(conn, ServerEvent::Error(err.to_payload())).await;
    if err.is_fatal() {
        state.registry.close(conn).await;
        Flow::Close
    } else {
        Flow::Continue
    }
}

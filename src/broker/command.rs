use tracing::debug;

use crate::{
    protocol::{CommandResponse, MessagePayload, ServerEvent},
    registry::{ConnId, Identity},
    AppState,
};

pub(super) const SIGIL: char = '/';

type Command = fn(&Identity) -> String;

const COMMANDS: &[(&str, Command)] = &[("/version", version)];

fn version(identity: &Identity) -> String {
    format!(
        "Current server version is {}<br />Client version is {}",
        env!("CARGO_PKG_VERSION"),
        identity.client_version,
    )
}

/// Answers a slash command to its sender only. Unknown commands do nothing.
pub(super) async fn run(state: &AppState, conn: ConnId, identity: &Identity, payload: &MessagePayload) {
    let name = payload.message.split_whitespace().next().unwrap_or_default();
    let Some((_, command)) = COMMANDS.iter().find(|(known, _)| *known == name) else {
        debug!(%conn, "ignoring unknown command {name:?}");
        return;
    };

    state
        .registry
        .send_to(
            conn,
            ServerEvent::Response(CommandResponse {
                room_uid: payload.room_uid.clone(),
                project_uid: payload.project_uid.clone(),
                author_uid: payload.author.uid.clone(),
                response: command(identity),
            }),
        )
        .await;
}

use tracing::{error, info};

use crate::{
    error::{ChatError, ChatResult},
    protocol::{IdentifyPayload, ServerEvent},
    registry::{ConnId, Identity},
    AppState,
};

pub(super) async fn identify(state: &AppState, conn: ConnId, payload: IdentifyPayload) -> ChatResult<()> {
    let IdentifyPayload {
        user,
        client_version,
        project_uid,
        auth_token,
    } = payload;

    if user.uid.trim().is_empty() {
        return Err(ChatError::validation("identify", "user.uid is empty"));
    }

    let compatible = &state.config.compatible_client_versions;
    if !compatible.contains(&client_version) {
        error!(%conn, "incompatible client version {client_version} from {}", user.uid);
        return Err(ChatError::IncompatibleVersion {
            compatible: compatible.clone(),
            client_version,
        });
    }

    info!(
        %conn,
        "new client identified as {:?} ({}), version {client_version}",
        user.email.as_deref().unwrap_or_default(),
        user.uid,
    );

    let identified = state
        .registry
        .identify(conn, Identity {
            user,
            client_version,
            project_uid,
            auth_token,
        })
        .await;
    if identified {
        state.registry.send_to(conn, ServerEvent::Identified).await;
    }
    Ok(())
}

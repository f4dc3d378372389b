use crate::{
    error::{ChatError, ChatResult},
    protocol::{AttachmentPayload, MessagePayload, ServerEvent},
    registry::{ConnId, Identity},
    store::{self, NewMessage},
    AppState,
};

use super::{command, fanout};

const ATTACHMENT_TITLE: &str = "Attachment";
const ATTACHMENT_BODY: &str = "New attachment";

/// Persists a text message, starts its receipt fan-out and echoes it to everyone, sender included.
pub(super) async fn submit_message(
    state: &AppState,
    conn: ConnId,
    identity: &Identity,
    mut payload: MessagePayload,
) -> ChatResult<()> {
    if payload.message.starts_with(command::SIGIL) {
        command::run(state, conn, identity, &payload).await;
        return Ok(());
    }

    let saved = store::save_message(&state.db_pool, NewMessage {
        room_uid: &payload.room_uid,
        project_uid: &payload.project_uid,
        title: payload.title.as_deref(),
        message: &payload.message,
        attachment_uid: None,
        author: &payload.author,
        extra_info: &payload.extra_info,
    })
    .await?;

    fanout::spawn(state, fanout::Delivery {
        message_uid: saved.uid.clone(),
        project_uid: payload.project_uid.clone(),
        room_uid: payload.room_uid.clone(),
        author_uid: payload.author.uid.clone(),
        extra_info: payload.extra_info.clone(),
        auth_token: payload.auth_token.clone().or_else(|| identity.auth_token.clone()),
    });

    payload.uid = Some(saved.uid);
    payload.sent_on = Some(saved.sent_on);
    state.registry.broadcast_all(ServerEvent::Message(payload)).await;
    Ok(())
}

/// Persists an already uploaded attachment and shows it to everyone but the sender.
pub(super) async fn submit_attachment(
    state: &AppState,
    conn: ConnId,
    mut payload: AttachmentPayload,
) -> ChatResult<()> {
    if payload.attachment.uid.trim().is_empty() {
        return Err(ChatError::validation("attachment", "attachment.uid is empty, upload first"));
    }

    let saved = store::save_message(&state.db_pool, NewMessage {
        room_uid: &payload.room_uid,
        project_uid: &payload.project_uid,
        title: Some(ATTACHMENT_TITLE),
        message: ATTACHMENT_BODY,
        attachment_uid: Some(&payload.attachment.uid),
        author: &payload.author,
        extra_info: &payload.extra_info,
    })
    .await?;

    payload.uid = Some(saved.uid);
    payload.sent_on = Some(saved.sent_on);
    state.registry.broadcast_except(conn, ServerEvent::Attachment(payload)).await;
    Ok(())
}

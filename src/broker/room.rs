use tracing::debug;

use crate::{
    error::ChatResult,
    protocol::{PeopleQuery, ReadRoomPayload, RoomRef, ServerEvent, UnreadQuery, UserEventPayload},
    registry::{ConnId, Identity},
    store, AppState,
};

/// Typing and presence go to everyone; clients filter by room.
pub(super) async fn user_event(state: &AppState, payload: UserEventPayload) -> ChatResult<()> {
    state.registry.broadcast_all(ServerEvent::UserEvent(payload)).await;
    Ok(())
}

pub(super) async fn all_messages(
    state: &AppState,
    conn: ConnId,
    RoomRef { room_uid, project_uid }: RoomRef,
) -> ChatResult<()> {
    let messages = store::room_messages(&state.db_pool, &room_uid, &project_uid).await?;
    debug!(%conn, "sending {} message(s) of {project_uid}/{room_uid}", messages.len());
    state.registry.send_to(conn, ServerEvent::AllMessages(messages)).await;
    Ok(())
}

pub(super) async fn unread_rooms(
    state: &AppState,
    conn: ConnId,
    UnreadQuery { project_uid, author_uid }: UnreadQuery,
) -> ChatResult<()> {
    let unread = store::unread_receipts(&state.db_pool, &project_uid, &author_uid).await?;
    state.registry.send_to(conn, ServerEvent::UnreadRooms(unread)).await;
    Ok(())
}

/// Marks the whole room read for the user and remembers them as a member.
pub(super) async fn read_room(
    state: &AppState,
    ReadRoomPayload { author_uid, room_uid, project_uid }: ReadRoomPayload,
) -> ChatResult<()> {
    let (read, joined) = tokio::join!(
        store::read_all_messages(&state.db_pool, &author_uid, &room_uid, &project_uid),
        store::join_room(&state.db_pool, &project_uid, &room_uid, &author_uid),
    );
    let read = read?;
    if joined? {
        debug!("{author_uid} joined {project_uid}/{room_uid}");
    }
    debug!("{author_uid} read {read} message(s) in {project_uid}/{room_uid}");
    Ok(())
}

pub(super) async fn people_involved(
    state: &AppState,
    conn: ConnId,
    identity: &Identity,
    query: PeopleQuery,
) -> ChatResult<()> {
    let auth_token = query.auth_token.as_deref().or(identity.auth_token.as_deref());
    let people = state
        .directory
        .people_or_nobody(&query.project_uid, &query.room_uid, &query.extra_info, auth_token)
        .await;
    state.registry.send_to(conn, ServerEvent::PeopleInvolved(people)).await;
    Ok(())
}

use axum::{
    debug_handler,
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    store::{self, LogFilter, LoggedMessage, RoomMessage, SortOrder},
    AppResult,
};

const DEFAULT_PAGE_SIZE: i64 = 15;
const MAX_PAGE_SIZE: i64 = 500;

#[derive(Debug, Serialize)]
pub(crate) struct Numbered<T> {
    #[serde(rename = "rowNumber")]
    row_number: i64,
    #[serde(flatten)]
    row: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LogQuery {
    page: Option<i64>,
    page_size: Option<i64>,
    user_uid: Option<String>,
    unread: Option<String>,
    sort: Option<SortOrder>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_history(
    State(db_pool): State<SqlitePool>,
    Path((project_uid, room_uid)): Path<(String, String)>,
) -> AppResult<Json<Vec<Numbered<RoomMessage>>>> {
    let messages = store::room_messages(&db_pool, &room_uid, &project_uid).await?;

    Ok(Json(
        messages
            .into_iter()
            .zip(0..)
            .map(|(row, row_number)| Numbered { row_number, row })
            .collect(),
    ))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn project_log(
    State(db_pool): State<SqlitePool>,
    Path(project_uid): Path<String>,
    Query(LogQuery { page, page_size, user_uid, unread, sort }): Query<LogQuery>,
) -> AppResult<Json<Vec<Numbered<LoggedMessage>>>> {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let unread_only = matches!(unread.as_deref(), Some("true" | "1"));

    let rows = store::logged_messages(&db_pool, &LogFilter {
        project_uid,
        room_uid: None,
        sent_to: user_uid.filter(|uid| !uid.is_empty()),
        unread_only,
        sort,
        page: Some((page, page_size)),
    })
    .await?;

    let first = store::page_offset(page, page_size);
    Ok(Json(
        rows.into_iter()
            .zip(0..)
            .map(|(row, i)| Numbered {
                row_number: first.saturating_add(i),
                row,
            })
            .collect(),
    ))
}

mod history;

use axum::{routing::get, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{project_uid}", get(history::project_log))
        .route("/{project_uid}/{room_uid}", get(history::room_history))
}

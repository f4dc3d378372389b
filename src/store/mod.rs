mod members;
mod messages;
mod receipts;

use std::str::FromStr;

use anyhow::Context;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

pub use members::{join_room, room_people};
pub use messages::{room_messages, save_message, NewMessage, RoomMessage, SavedMessage};
pub use receipts::{
    logged_messages, page_offset, read_all_messages, unread_receipts, upsert_receipt, LogFilter, LoggedMessage,
    SortOrder,
};

/// Opens the pool and brings the schema up to date.
pub async fn open(database_url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("bad DATABASE_URL {database_url}"))?
        .create_if_missing(true);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .context("connecting to the message store")?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("migrating the message store")?;

    Ok(db_pool)
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    open("sqlite::memory:", 1).await.unwrap()
}

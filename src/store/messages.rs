use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::protocol::{AttachmentRef, User};

pub struct NewMessage<'a> {
    pub room_uid: &'a str,
    pub project_uid: &'a str,
    pub title: Option<&'a str>,
    pub message: &'a str,
    pub attachment_uid: Option<&'a str>,
    pub author: &'a User,
    pub extra_info: &'a Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedMessage {
    pub uid: String,
    pub sent_on: String,
}

/// A stored message as the chat widget renders it.
#[derive(Debug, Clone, Serialize)]
pub struct RoomMessage {
    pub uid: String,
    pub room_uid: String,
    pub project_uid: String,
    pub title: Option<String>,
    pub message: Option<String>,
    pub author: User,
    pub attachment: Option<AttachmentRef>,
    pub extra_info: Value,
    pub sent_on: String,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    uid: String,
    room_uid: String,
    project_uid: String,
    title: Option<String>,
    message: Option<String>,
    attachment_uid: Option<String>,
    author_uid: String,
    author_email: Option<String>,
    author_full_name: Option<String>,
    #[sqlx(json)]
    extra_info: Value,
    sent_on: String,
    filename: Option<String>,
    filetype: Option<String>,
    filesize: Option<i64>,
}

impl From<MessageRow> for RoomMessage {
    fn from(row: MessageRow) -> Self {
        let attachment = row.attachment_uid.map(|uid| AttachmentRef {
            uid,
            name: row.filename,
            size: row.filesize,
            mime_type: row.filetype,
        });

        RoomMessage {
            uid: row.uid,
            room_uid: row.room_uid,
            project_uid: row.project_uid,
            title: row.title,
            message: row.message,
            author: User {
                uid: row.author_uid,
                email: row.author_email,
                full_name: row.author_full_name,
            },
            attachment,
            extra_info: row.extra_info,
            sent_on: row.sent_on,
        }
    }
}

/// Inserts one message; the uid and `sent_on` are minted here, never by the client.
pub async fn save_message(db_pool: &SqlitePool, msg: NewMessage<'_>) -> sqlx::Result<SavedMessage> {
    let (uid, sent_on): (String, String) = sqlx::query_as(
        "INSERT INTO chat_messages
            (uid,room_uid,project_uid,title,message,attachment_uid,author_uid,author_email,author_full_name,extra_info)
         VALUES (?,?,?,?,?,?,?,?,?,?)
         RETURNING uid,sent_on",
    )
    .bind(Uuid::now_v7().to_string())
    .bind(msg.room_uid)
    .bind(msg.project_uid)
    .bind(msg.title)
    .bind(msg.message)
    .bind(msg.attachment_uid)
    .bind(&msg.author.uid)
    .bind(msg.author.email.as_deref())
    .bind(msg.author.full_name.as_deref())
    .bind(msg.extra_info.to_string())
    .fetch_one(db_pool)
    .await?;

    Ok(SavedMessage { uid, sent_on })
}

pub async fn room_messages(
    db_pool: &SqlitePool,
    room_uid: &str,
    project_uid: &str,
) -> sqlx::Result<Vec<RoomMessage>> {
    let rows: Vec<MessageRow> = sqlx::query_as(
        "SELECT m.uid,m.room_uid,m.project_uid,m.title,m.message,m.attachment_uid,
                m.author_uid,m.author_email,m.author_full_name,m.extra_info,m.sent_on,
                a.original_name AS filename,a.mime_type AS filetype,a.filesize
         FROM chat_messages m
         LEFT JOIN chat_attachments a ON m.attachment_uid = a.name_key
         WHERE m.room_uid=? AND m.project_uid=?
         ORDER BY m.sent_on, m.rowid",
    )
    .bind(room_uid)
    .bind(project_uid)
    .fetch_all(db_pool)
    .await?;

    Ok(rows.into_iter().map(RoomMessage::from).collect())
}

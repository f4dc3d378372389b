use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// One receipt joined with the message it points at.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LoggedMessage {
    pub message_uid: String,
    pub sent_to: String,
    pub sent_by: Option<String>,
    pub read_on: Option<String>,
    pub room_uid: String,
    pub project_uid: String,
    pub title: Option<String>,
    pub message: Option<String>,
    pub attachment_uid: Option<String>,
    pub author_uid: String,
    pub author_email: Option<String>,
    pub author_full_name: Option<String>,
    #[sqlx(json)]
    pub extra_info: Value,
    pub sent_on: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[serde(alias = "ASC")]
    Asc,
    #[serde(alias = "DESC")]
    Desc,
}

impl SortOrder {
    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub project_uid: String,
    pub room_uid: Option<String>,
    pub sent_to: Option<String>,
    pub unread_only: bool,
    pub sort: Option<SortOrder>,
    /// 1-based page and page size
    pub page: Option<(i64, i64)>,
}

const LOGGED_COLUMNS: &str = "SELECT message_uid,sent_to,sent_by,read_on,room_uid,project_uid,title,message,\
     attachment_uid,author_uid,author_email,author_full_name,extra_info,sent_on FROM vw_logged_messages";

/// Rows skipped before `page`. Pages past the end saturate instead of wrapping.
pub fn page_offset(page: i64, page_size: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(page_size.max(0))
}

/// Writes the receipt of `message_uid` for `sent_to`.
///
/// The author's own receipt is born read and refreshed on every repeat. Anyone
/// else gets an unread row, and a repeat leaves whatever is there alone so a
/// read that already happened is never undone.
pub async fn upsert_receipt(
    db_pool: &SqlitePool,
    message_uid: &str,
    sent_to: &str,
    sent_by: &str,
) -> sqlx::Result<()> {
    let query = if sent_to == sent_by {
        "INSERT INTO chat_log (message_uid,sent_to,sent_by,read_on)
         VALUES (?,?,?,strftime('%Y-%m-%dT%H:%M:%fZ','now'))
         ON CONFLICT (message_uid,sent_to) DO UPDATE SET read_on=excluded.read_on"
    } else {
        "INSERT INTO chat_log (message_uid,sent_to,sent_by,read_on)
         VALUES (?,?,?,NULL)
         ON CONFLICT (message_uid,sent_to) DO NOTHING"
    };

    sqlx::query(query)
        .bind(message_uid)
        .bind(sent_to)
        .bind(sent_by)
        .execute(db_pool)
        .await?;
    Ok(())
}

/// Marks every message of the room read for `author_uid`. Returns the rows touched.
pub async fn read_all_messages(
    db_pool: &SqlitePool,
    author_uid: &str,
    room_uid: &str,
    project_uid: &str,
) -> sqlx::Result<u64> {
    let result = sqlx::query(
        "INSERT INTO chat_log (message_uid,sent_to,sent_by,read_on)
         SELECT uid,?,author_uid,strftime('%Y-%m-%dT%H:%M:%fZ','now')
         FROM chat_messages WHERE project_uid=? AND room_uid=?
         ON CONFLICT (message_uid,sent_to) DO UPDATE SET read_on=excluded.read_on",
    )
    .bind(author_uid)
    .bind(project_uid)
    .bind(room_uid)
    .execute(db_pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn unread_receipts(
    db_pool: &SqlitePool,
    project_uid: &str,
    author_uid: &str,
) -> sqlx::Result<Vec<LoggedMessage>> {
    logged_messages(db_pool, &LogFilter {
        project_uid: project_uid.to_owned(),
        sent_to: Some(author_uid.to_owned()),
        unread_only: true,
        sort: Some(SortOrder::Asc),
        ..Default::default()
    })
    .await
}

pub async fn logged_messages(db_pool: &SqlitePool, filter: &LogFilter) -> sqlx::Result<Vec<LoggedMessage>> {
    let mut query = QueryBuilder::<Sqlite>::new(LOGGED_COLUMNS);
    query.push(" WHERE project_uid=").push_bind(filter.project_uid.clone());
    if let Some(room_uid) = &filter.room_uid {
        query.push(" AND room_uid=").push_bind(room_uid.clone());
    }
    if let Some(sent_to) = &filter.sent_to {
        query.push(" AND sent_to=").push_bind(sent_to.clone());
    }
    if filter.unread_only {
        query.push(" AND read_on IS NULL");
    }
    if let Some(sort) = filter.sort {
        // uids are v7, so they break ties inside the same millisecond
        query
            .push(" ORDER BY sent_on ")
            .push(sort.sql())
            .push(", message_uid ")
            .push(sort.sql());
    }
    if let Some((page, page_size)) = filter.page {
        query
            .push(" LIMIT ")
            .push_bind(page_size)
            .push(" OFFSET ")
            .push_bind(page_offset(page, page_size));
    }

    query.build_query_as::<LoggedMessage>().fetch_all(db_pool).await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        protocol::User,
        store::{memory_pool, save_message, NewMessage},
    };

    async fn seed(db_pool: &SqlitePool, room_uid: &str, author_uid: &str, text: &str) -> String {
        let author = User {
            uid: author_uid.into(),
            email: None,
            full_name: None,
        };
        save_message(db_pool, NewMessage {
            room_uid,
            project_uid: "P1",
            title: Some("A-101"),
            message: text,
            attachment_uid: None,
            author: &author,
            extra_info: &json!({ "room_type": "RFI" }),
        })
        .await
        .unwrap()
        .uid
    }

    async fn read_on(db_pool: &SqlitePool, message_uid: &str, sent_to: &str) -> Option<Option<String>> {
        sqlx::query_as::<_, (Option<String>,)>("SELECT read_on FROM chat_log WHERE message_uid=? AND sent_to=?")
            .bind(message_uid)
            .bind(sent_to)
            .fetch_optional(db_pool)
            .await
            .unwrap()
            .map(|(read_on,)| read_on)
    }

    #[tokio::test]
    async fn author_reads_own_message_others_do_not() {
        let db_pool = memory_pool().await;
        let uid = seed(&db_pool, "R1", "U1", "hello").await;

        upsert_receipt(&db_pool, &uid, "U1", "U1").await.unwrap();
        upsert_receipt(&db_pool, &uid, "U2", "U1").await.unwrap();

        assert!(matches!(read_on(&db_pool, &uid, "U1").await, Some(Some(_))));
        assert_eq!(read_on(&db_pool, &uid, "U2").await, Some(None));
    }

    #[tokio::test]
    async fn repeat_unread_write_keeps_a_read_receipt() {
        let db_pool = memory_pool().await;
        let uid = seed(&db_pool, "R1", "U1", "hello").await;

        upsert_receipt(&db_pool, &uid, "U2", "U1").await.unwrap();
        upsert_receipt(&db_pool, &uid, "U2", "U1").await.unwrap();
        assert_eq!(read_on(&db_pool, &uid, "U2").await, Some(None));

        read_all_messages(&db_pool, "U2", "R1", "P1").await.unwrap();
        upsert_receipt(&db_pool, &uid, "U2", "U1").await.unwrap();
        assert!(matches!(read_on(&db_pool, &uid, "U2").await, Some(Some(_))));
    }

    #[tokio::test]
    async fn reading_a_room_twice_is_harmless() {
        let db_pool = memory_pool().await;
        let first = seed(&db_pool, "R1", "U1", "one").await;
        let second = seed(&db_pool, "R1", "U1", "two").await;
        let elsewhere = seed(&db_pool, "R2", "U1", "three").await;
        upsert_receipt(&db_pool, &first, "U2", "U1").await.unwrap();

        assert_eq!(read_all_messages(&db_pool, "U2", "R1", "P1").await.unwrap(), 2);
        assert_eq!(read_all_messages(&db_pool, "U2", "R1", "P1").await.unwrap(), 2);

        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chat_log WHERE sent_to='U2'")
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!(rows, 2);
        assert!(matches!(read_on(&db_pool, &first, "U2").await, Some(Some(_))));
        assert!(matches!(read_on(&db_pool, &second, "U2").await, Some(Some(_))));
        assert_eq!(read_on(&db_pool, &elsewhere, "U2").await, None);
    }

    #[tokio::test]
    async fn unread_receipts_follow_reads() {
        let db_pool = memory_pool().await;
        let r1 = seed(&db_pool, "R1", "U1", "one").await;
        let r2 = seed(&db_pool, "R2", "U1", "two").await;
        upsert_receipt(&db_pool, &r1, "U2", "U1").await.unwrap();
        upsert_receipt(&db_pool, &r2, "U2", "U1").await.unwrap();

        let unread = unread_receipts(&db_pool, "P1", "U2").await.unwrap();
        assert_eq!(unread.len(), 2);
        assert_eq!(unread[0].message_uid, r1);
        assert_eq!(unread[0].extra_info["room_type"], "RFI");

        read_all_messages(&db_pool, "U2", "R1", "P1").await.unwrap();
        let unread = unread_receipts(&db_pool, "P1", "U2").await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].room_uid, "R2");

        assert!(unread_receipts(&db_pool, "P9", "U2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_pages_and_sorts() {
        let db_pool = memory_pool().await;
        let mut uids = Vec::new();
        for i in 0..5 {
            let uid = seed(&db_pool, "R1", "U1", &format!("msg {i}")).await;
            upsert_receipt(&db_pool, &uid, "U2", "U1").await.unwrap();
            uids.push(uid);
        }

        let page = logged_messages(&db_pool, &LogFilter {
            project_uid: "P1".into(),
            sort: Some(SortOrder::Asc),
            page: Some((2, 2)),
            ..Default::default()
        })
        .await
        .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].message_uid, uids[2]);
        assert_eq!(page[1].message_uid, uids[3]);

        let newest = logged_messages(&db_pool, &LogFilter {
            project_uid: "P1".into(),
            sent_to: Some("U2".into()),
            unread_only: true,
            sort: Some(SortOrder::Desc),
            page: Some((1, 1)),
            ..Default::default()
        })
        .await
        .unwrap();
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].message_uid, uids[4]);
    }

    #[test]
    fn page_offset_saturates() {
        assert_eq!(page_offset(1, 15), 0);
        assert_eq!(page_offset(3, 15), 30);
        assert_eq!(page_offset(0, 15), 0);
        assert_eq!(page_offset(4611686018427387904, 4), i64::MAX);
        assert_eq!(page_offset(i64::MAX, i64::MAX), i64::MAX);
    }

    #[tokio::test]
    async fn huge_pages_list_nothing() {
        let db_pool = memory_pool().await;
        let uid = seed(&db_pool, "R1", "U1", "one").await;
        upsert_receipt(&db_pool, &uid, "U2", "U1").await.unwrap();

        let rows = logged_messages(&db_pool, &LogFilter {
            project_uid: "P1".into(),
            page: Some((i64::MAX, i64::MAX)),
            ..Default::default()
        })
        .await
        .unwrap();
        assert!(rows.is_empty());
    }
}

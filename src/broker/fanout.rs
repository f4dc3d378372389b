//! Read-receipt fan-out for a freshly stored message.
//!
//! Recipients come from two sources, the document directory and the room's
//! members. Every receipt is its own write with its own retries, so one bad
//! write never holds up the others or the broadcast.

use std::{collections::BTreeSet, time::Duration};

use futures_util::future::join_all;
use rand::Rng;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{debug, error, warn};

use crate::{store, AppState};

#[derive(Debug, Clone)]
pub struct Delivery {
    pub message_uid: String,
    pub project_uid: String,
    pub room_uid: String,
    pub author_uid: String,
    pub extra_info: Value,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub written: usize,
    pub failed: usize,
    /// Store writes tried, retries included.
    pub attempts: u32,
}

pub(super) fn spawn(state: &AppState, delivery: Delivery) {
    let task_state = state.clone();
    state.tasks.spawn(async move {
        fan_out(&task_state, delivery).await;
    });
}

/// Writes an unread receipt for every recipient but the author, and a read one for the author.
pub async fn fan_out(state: &AppState, delivery: Delivery) -> FanoutReport {
    let Delivery {
        message_uid,
        project_uid,
        room_uid,
        author_uid,
        extra_info,
        auth_token,
    } = &delivery;

    let (people, members) = tokio::join!(
        state
            .directory
            .people_or_nobody(project_uid, room_uid, extra_info, auth_token.as_deref()),
        async {
            store::room_people(&state.db_pool, project_uid, room_uid)
                .await
                .unwrap_or_else(|e| {
                    warn!("treating {project_uid}/{room_uid} as having no members: {e}");
                    Vec::new()
                })
        },
    );

    let recipients: BTreeSet<&str> = people
        .iter()
        .map(|person| person.key.as_str())
        .chain(members.iter().map(String::as_str))
        .filter(|uid| *uid != author_uid)
        .collect();
    debug!("message {message_uid} goes to {} recipient(s)", recipients.len());

    let attempts = state.config.receipt_write_attempts;
    let writes = recipients
        .into_iter()
        .chain([author_uid.as_str()])
        .map(|sent_to| write_receipt(&state.db_pool, attempts, message_uid, sent_to, author_uid));
    let results = join_all(writes).await;

    let written = results.iter().filter(|(ok, _)| *ok).count();
    FanoutReport {
        written,
        failed: results.len() - written,
        attempts: results.iter().map(|(_, tries)| tries).sum(),
    }
}

async fn write_receipt(
    db_pool: &SqlitePool,
    attempts: u32,
    message_uid: &str,
    sent_to: &str,
    sent_by: &str,
) -> (bool, u32) {
    let mut attempt = 1;
    loop {
        match store::upsert_receipt(db_pool, message_uid, sent_to, sent_by).await {
            Ok(()) => return (true, attempt),
            Err(e) if attempt < attempts => {
                let delay = backoff(attempt);
                warn!("receipt {message_uid}->{sent_to} failed (attempt {attempt}), retrying in {delay:?}: {e}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!("giving up on receipt {message_uid}->{sent_to} after {attempt} attempt(s): {e}");
                return (false, attempt);
            }
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    let base = 50u64 << attempt.saturating_sub(1).min(6);
    Duration::from_millis(base + rand::rng().random_range(0..=base / 2))
}

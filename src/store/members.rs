use sqlx::SqlitePool;

/// Records that `author_uid` has opened the room. Repeats are no-ops.
pub async fn join_room(
    db_pool: &SqlitePool,
    project_uid: &str,
    room_uid: &str,
    author_uid: &str,
) -> sqlx::Result<bool> {
    let result = sqlx::query(
        "INSERT INTO chat_room_people (project_uid,room_uid,author_uid) VALUES (?,?,?)
         ON CONFLICT (project_uid,room_uid,author_uid) DO NOTHING",
    )
    .bind(project_uid)
    .bind(room_uid)
    .bind(author_uid)
    .execute(db_pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Everyone who ever opened the room.
pub async fn room_people(db_pool: &SqlitePool, project_uid: &str, room_uid: &str) -> sqlx::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT author_uid FROM chat_room_people WHERE project_uid=? AND room_uid=? ORDER BY joined_on",
    )
    .bind(project_uid)
    .bind(room_uid)
    .fetch_all(db_pool)
    .await?;

    Ok(rows.into_iter().map(|(author_uid,)| author_uid).collect())
}

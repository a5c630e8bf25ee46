//! Notification intent persistence
//!
//! Every status transition is a conditional UPDATE on the current status, so
//! concurrent sweep workers and recomputation can never both win the same row.

use chrono::{DateTime, Utc};
use meateye_common::db::{format_timestamp, parse_timestamp};
use meateye_common::db::{AlertKind, DeliveryChannel, NotificationIntent, NotificationStatus, NotificationType};
use meateye_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use uuid::Uuid;

use super::parse_uuid;

const SELECT_COLUMNS: &str = r#"
    SELECT guid, member_id, fridge_item_id, notification_type, alert_kind, title, body,
           scheduled_at, sent_at, status, attempts, last_error, channel, claimed_at, created_at
    FROM notifications
"#;

fn intent_from_row(row: &SqliteRow) -> Result<NotificationIntent> {
    let optional_timestamp = |column: &str| -> Result<Option<DateTime<Utc>>> {
        row.get::<Option<String>, _>(column)
            .map(|s| parse_timestamp(column, &s))
            .transpose()
    };

    Ok(NotificationIntent {
        id: parse_uuid("guid", &row.get::<String, _>("guid"))?,
        member_id: parse_uuid("member_id", &row.get::<String, _>("member_id"))?,
        fridge_item_id: row
            .get::<Option<String>, _>("fridge_item_id")
            .map(|s| parse_uuid("fridge_item_id", &s))
            .transpose()?,
        notification_type: row.get::<String, _>("notification_type").parse::<NotificationType>()?,
        alert_kind: row
            .get::<Option<String>, _>("alert_kind")
            .map(|s| s.parse::<AlertKind>())
            .transpose()?,
        title: row.get("title"),
        body: row.get("body"),
        scheduled_at: parse_timestamp("scheduled_at", &row.get::<String, _>("scheduled_at"))?,
        sent_at: optional_timestamp("sent_at")?,
        status: row.get::<String, _>("status").parse::<NotificationStatus>()?,
        attempts: row.get::<i64, _>("attempts").max(0) as u32,
        last_error: row.get("last_error"),
        channel: row
            .get::<Option<String>, _>("channel")
            .map(|s| s.parse::<DeliveryChannel>())
            .transpose()?,
        claimed_at: optional_timestamp("claimed_at")?,
        created_at: parse_timestamp("created_at", &row.get::<String, _>("created_at"))?,
    })
}

pub async fn insert<'e, E>(executor: E, intent: &NotificationIntent) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO notifications (
            guid, member_id, fridge_item_id, notification_type, alert_kind, title, body,
            scheduled_at, sent_at, status, attempts, last_error, channel, claimed_at, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(intent.id.to_string())
    .bind(intent.member_id.to_string())
    .bind(intent.fridge_item_id.map(|id| id.to_string()))
    .bind(intent.notification_type.as_str())
    .bind(intent.alert_kind.map(|k| k.as_str()))
    .bind(&intent.title)
    .bind(&intent.body)
    .bind(format_timestamp(intent.scheduled_at))
    .bind(intent.sent_at.map(format_timestamp))
    .bind(intent.status.as_str())
    .bind(intent.attempts as i64)
    .bind(&intent.last_error)
    .bind(intent.channel.map(|c| c.as_str()))
    .bind(intent.claimed_at.map(format_timestamp))
    .bind(format_timestamp(intent.created_at))
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn get<'e, E>(executor: E, notification_id: Uuid) -> Result<Option<NotificationIntent>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{} WHERE guid = ?", SELECT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(notification_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(intent_from_row).transpose()
}

/// Supersede every live (pending or claimed) expiry alert of an item
pub async fn cancel_live_expiry_alerts<'e, E>(executor: E, item_id: Uuid) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE notifications
        SET status = 'cancelled', claimed_at = NULL
        WHERE fridge_item_id = ?
          AND notification_type = 'expiry_alert'
          AND status IN ('pending', 'in_flight')
        "#,
    )
    .bind(item_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Cancel every live intent of an item regardless of type
pub async fn cancel_all_live_for_item<'e, E>(executor: E, item_id: Uuid) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE notifications
        SET status = 'cancelled', claimed_at = NULL
        WHERE fridge_item_id = ? AND status IN ('pending', 'in_flight')
        "#,
    )
    .bind(item_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Clear the back-reference on every row of a deleted item
pub async fn detach_item<'e, E>(executor: E, item_id: Uuid) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE notifications SET fridge_item_id = NULL WHERE fridge_item_id = ?")
        .bind(item_id.to_string())
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// Intents referencing an item, oldest schedule first
pub async fn list_for_item<'e, E>(executor: E, item_id: Uuid) -> Result<Vec<NotificationIntent>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{} WHERE fridge_item_id = ? ORDER BY scheduled_at ASC, guid ASC", SELECT_COLUMNS);
    let rows = sqlx::query(&sql)
        .bind(item_id.to_string())
        .fetch_all(executor)
        .await?;

    rows.iter().map(intent_from_row).collect()
}

pub async fn list_for_member<'e, E>(
    executor: E,
    member_id: Uuid,
    status: Option<NotificationStatus>,
) -> Result<Vec<NotificationIntent>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "{} WHERE member_id = ? AND (? IS NULL OR status = ?) ORDER BY scheduled_at ASC, guid ASC",
        SELECT_COLUMNS
    );
    let status = status.map(|s| s.as_str());
    let rows = sqlx::query(&sql)
        .bind(member_id.to_string())
        .bind(status)
        .bind(status)
        .fetch_all(executor)
        .await?;

    rows.iter().map(intent_from_row).collect()
}

/// Row counts per status for one member
pub async fn count_by_status<'e, E>(executor: E, member_id: Uuid) -> Result<Vec<(NotificationStatus, i64)>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT status, COUNT(*) AS cnt FROM notifications WHERE member_id = ? GROUP BY status",
    )
    .bind(member_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| {
            let status = row.get::<String, _>("status").parse::<NotificationStatus>()?;
            Ok((status, row.get::<i64, _>("cnt")))
        })
        .collect()
}

/// Return claims older than `claimed_before` to the pending set
pub async fn release_stale_claims<'e, E>(executor: E, claimed_before: DateTime<Utc>) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE notifications
        SET status = 'pending', claimed_at = NULL
        WHERE status = 'in_flight' AND claimed_at < ?
        "#,
    )
    .bind(format_timestamp(claimed_before))
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Pending intents due at `now`, oldest first, at most `limit`
pub async fn select_due<'e, E>(executor: E, now: DateTime<Utc>, limit: u32) -> Result<Vec<NotificationIntent>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "{} WHERE status = 'pending' AND scheduled_at <= ? ORDER BY scheduled_at ASC, guid ASC LIMIT ?",
        SELECT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(format_timestamp(now))
        .bind(limit as i64)
        .fetch_all(executor)
        .await?;

    rows.iter().map(intent_from_row).collect()
}

/// Atomically move a pending intent to in-flight; false if another worker won
pub async fn claim<'e, E>(executor: E, notification_id: Uuid, now: DateTime<Utc>) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE notifications SET status = 'in_flight', claimed_at = ? WHERE guid = ? AND status = 'pending'",
    )
    .bind(format_timestamp(now))
    .bind(notification_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn mark_sent<'e, E>(
    executor: E,
    notification_id: Uuid,
    sent_at: DateTime<Utc>,
    channel: DeliveryChannel,
    attempts: u32,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE notifications
        SET status = 'sent', sent_at = ?, channel = ?, attempts = ?, claimed_at = NULL
        WHERE guid = ? AND status = 'in_flight'
        "#,
    )
    .bind(format_timestamp(sent_at))
    .bind(channel.as_str())
    .bind(attempts as i64)
    .bind(notification_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Failed attempt with budget left: back to pending at `next_attempt_at`
pub async fn mark_retry<'e, E>(
    executor: E,
    notification_id: Uuid,
    attempts: u32,
    next_attempt_at: DateTime<Utc>,
    error: &str,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE notifications
        SET status = 'pending', attempts = ?, scheduled_at = ?, last_error = ?, claimed_at = NULL
        WHERE guid = ? AND status = 'in_flight'
        "#,
    )
    .bind(attempts as i64)
    .bind(format_timestamp(next_attempt_at))
    .bind(error)
    .bind(notification_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Failed attempt with the budget exhausted: terminal
pub async fn mark_failed<'e, E>(executor: E, notification_id: Uuid, attempts: u32, error: &str) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE notifications
        SET status = 'failed', attempts = ?, last_error = ?, claimed_at = NULL
        WHERE guid = ? AND status = 'in_flight'
        "#,
    )
    .bind(attempts as i64)
    .bind(error)
    .bind(notification_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Cancel one live intent (pending or claimed)
pub async fn cancel<'e, E>(executor: E, notification_id: Uuid) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE notifications
        SET status = 'cancelled', claimed_at = NULL
        WHERE guid = ? AND status IN ('pending', 'in_flight')
        "#,
    )
    .bind(notification_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

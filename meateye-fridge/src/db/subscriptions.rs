//! Push subscription persistence

use chrono::{DateTime, Utc};
use meateye_common::db::{format_timestamp, parse_timestamp, PushSubscription};
use meateye_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use uuid::Uuid;

use super::parse_uuid;

fn subscription_from_row(row: &SqliteRow) -> Result<PushSubscription> {
    Ok(PushSubscription {
        id: parse_uuid("guid", &row.get::<String, _>("guid"))?,
        member_id: parse_uuid("member_id", &row.get::<String, _>("member_id"))?,
        endpoint: row.get("endpoint"),
        p256dh_key: row.get("p256dh_key"),
        auth_key: row.get("auth_key"),
        user_agent: row.get("user_agent"),
        created_at: parse_timestamp("created_at", &row.get::<String, _>("created_at"))?,
    })
}

/// Register an endpoint; re-registering the same (member, endpoint) refreshes its keys
pub async fn upsert<'e, E>(
    executor: E,
    member_id: Uuid,
    endpoint: &str,
    p256dh_key: &str,
    auth_key: &str,
    user_agent: Option<&str>,
    now: DateTime<Utc>,
) -> Result<PushSubscription>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        INSERT INTO push_subscriptions (guid, member_id, endpoint, p256dh_key, auth_key, user_agent, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(member_id, endpoint) DO UPDATE SET
            p256dh_key = excluded.p256dh_key,
            auth_key = excluded.auth_key,
            user_agent = excluded.user_agent
        RETURNING guid, member_id, endpoint, p256dh_key, auth_key, user_agent, created_at
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(member_id.to_string())
    .bind(endpoint)
    .bind(p256dh_key)
    .bind(auth_key)
    .bind(user_agent)
    .bind(format_timestamp(now))
    .fetch_one(executor)
    .await?;

    subscription_from_row(&row)
}

pub async fn list_for_member<'e, E>(executor: E, member_id: Uuid) -> Result<Vec<PushSubscription>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT guid, member_id, endpoint, p256dh_key, auth_key, user_agent, created_at
        FROM push_subscriptions
        WHERE member_id = ?
        ORDER BY created_at ASC, guid ASC
        "#,
    )
    .bind(member_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter().map(subscription_from_row).collect()
}

pub async fn delete_for_member<'e, E>(executor: E, member_id: Uuid, endpoint: &str) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM push_subscriptions WHERE member_id = ? AND endpoint = ?")
        .bind(member_id.to_string())
        .bind(endpoint)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_by_id<'e, E>(executor: E, subscription_id: Uuid) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM push_subscriptions WHERE guid = ?")
        .bind(subscription_id.to_string())
        .execute(executor)
        .await?;

    Ok(result.rows_affected() == 1)
}

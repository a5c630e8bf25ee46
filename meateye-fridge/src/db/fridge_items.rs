//! Fridge item persistence

use chrono::NaiveDate;
use meateye_common::db::{format_date, format_timestamp, parse_date, parse_timestamp};
use meateye_common::db::{FridgeItem, ItemStatus, TraceSnapshot};
use meateye_common::{CanonicalPart, Error, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use uuid::Uuid;

use super::parse_uuid;

const SELECT_COLUMNS: &str = r#"
    SELECT guid, member_id, part, custom_name, storage_date, expiry_date, desired_consumption_date,
           slaughter_date, grade, origin, company_name, trace_number,
           status, alert_before, use_push, created_at, updated_at
    FROM fridge_items
"#;

fn item_from_row(row: &SqliteRow) -> Result<FridgeItem> {
    let part = row
        .get::<Option<String>, _>("part")
        .map(|s| {
            CanonicalPart::from_canonical(&s)
                .ok_or_else(|| Error::Internal(format!("Unknown part in database: {}", s)))
        })
        .transpose()?;

    let slaughter_date = row
        .get::<Option<String>, _>("slaughter_date")
        .map(|s| parse_date("slaughter_date", &s))
        .transpose()?;
    let desired_consumption_date = row
        .get::<Option<String>, _>("desired_consumption_date")
        .map(|s| parse_date("desired_consumption_date", &s))
        .transpose()?;

    Ok(FridgeItem {
        id: parse_uuid("guid", &row.get::<String, _>("guid"))?,
        member_id: parse_uuid("member_id", &row.get::<String, _>("member_id"))?,
        part,
        custom_name: row.get("custom_name"),
        storage_date: parse_date("storage_date", &row.get::<String, _>("storage_date"))?,
        expiry_date: parse_date("expiry_date", &row.get::<String, _>("expiry_date"))?,
        desired_consumption_date,
        trace: TraceSnapshot {
            trace_number: row.get("trace_number"),
            slaughter_date,
            grade: row.get("grade"),
            origin: row.get("origin"),
            company_name: row.get("company_name"),
        },
        status: row.get::<String, _>("status").parse::<ItemStatus>()?,
        alert_before: row.get::<i64, _>("alert_before").max(0) as u32,
        use_push: row.get::<i64, _>("use_push") != 0,
        created_at: parse_timestamp("created_at", &row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp("updated_at", &row.get::<String, _>("updated_at"))?,
    })
}

pub async fn insert_item<'e, E>(executor: E, item: &FridgeItem) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO fridge_items (
            guid, member_id, part, custom_name, storage_date, expiry_date, desired_consumption_date,
            slaughter_date, grade, origin, company_name, trace_number,
            status, alert_before, use_push, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(item.id.to_string())
    .bind(item.member_id.to_string())
    .bind(item.part.map(|p| p.as_str()))
    .bind(&item.custom_name)
    .bind(format_date(item.storage_date))
    .bind(format_date(item.expiry_date))
    .bind(item.desired_consumption_date.map(format_date))
    .bind(item.trace.slaughter_date.map(format_date))
    .bind(&item.trace.grade)
    .bind(&item.trace.origin)
    .bind(&item.trace.company_name)
    .bind(&item.trace.trace_number)
    .bind(item.status.as_str())
    .bind(item.alert_before as i64)
    .bind(item.use_push as i64)
    .bind(format_timestamp(item.created_at))
    .bind(format_timestamp(item.updated_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// Write every mutable column of an existing item
pub async fn update_item<'e, E>(executor: E, item: &FridgeItem) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE fridge_items SET
            part = ?, custom_name = ?, expiry_date = ?, desired_consumption_date = ?,
            slaughter_date = ?, grade = ?, origin = ?, company_name = ?, trace_number = ?,
            status = ?, alert_before = ?, use_push = ?, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(item.part.map(|p| p.as_str()))
    .bind(&item.custom_name)
    .bind(format_date(item.expiry_date))
    .bind(item.desired_consumption_date.map(format_date))
    .bind(item.trace.slaughter_date.map(format_date))
    .bind(&item.trace.grade)
    .bind(&item.trace.origin)
    .bind(&item.trace.company_name)
    .bind(&item.trace.trace_number)
    .bind(item.status.as_str())
    .bind(item.alert_before as i64)
    .bind(item.use_push as i64)
    .bind(format_timestamp(item.updated_at))
    .bind(item.id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_item<'e, E>(executor: E, item_id: Uuid) -> Result<Option<FridgeItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{} WHERE guid = ?", SELECT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(item_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(item_from_row).transpose()
}

pub async fn delete_item<'e, E>(executor: E, item_id: Uuid) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM fridge_items WHERE guid = ?")
        .bind(item_id.to_string())
        .execute(executor)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Member's items, soonest expiry first, ties broken by id
pub async fn list_items<'e, E>(
    executor: E,
    member_id: Uuid,
    status: Option<ItemStatus>,
) -> Result<Vec<FridgeItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "{} WHERE member_id = ? AND (? IS NULL OR status = ?) ORDER BY expiry_date ASC, guid ASC",
        SELECT_COLUMNS
    );
    let status = status.map(|s| s.as_str());
    let rows = sqlx::query(&sql)
        .bind(member_id.to_string())
        .bind(status)
        .bind(status)
        .fetch_all(executor)
        .await?;

    rows.iter().map(item_from_row).collect()
}

/// Stored and consumed item counts for one storage date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyConsumption {
    pub date: NaiveDate,
    pub stored: i64,
    pub consumed: i64,
}

/// Per storage date counts for a member, newest date first
pub async fn consumption_by_storage_date<'e, E>(executor: E, member_id: Uuid) -> Result<Vec<DailyConsumption>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT storage_date,
               SUM(CASE WHEN status = 'stored' THEN 1 ELSE 0 END) AS stored,
               SUM(CASE WHEN status = 'consumed' THEN 1 ELSE 0 END) AS consumed
        FROM fridge_items
        WHERE member_id = ?
        GROUP BY storage_date
        ORDER BY storage_date DESC
        "#,
    )
    .bind(member_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(DailyConsumption {
                date: parse_date("storage_date", &row.get::<String, _>("storage_date"))?,
                stored: row.get("stored"),
                consumed: row.get("consumed"),
            })
        })
        .collect()
}

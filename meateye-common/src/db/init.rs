//! Database initialization
//!
//! Creates the SQLite file on first run and brings the schema up
//! idempotently on every start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .create_if_missing(true)
                .foreign_keys(true)
                // WAL lets request handlers read while the sweep writes
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .busy_timeout(Duration::from_millis(5000)),
        )
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table and index (safe to call repeatedly)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_fridge_items_table(pool).await?;
    create_notifications_table(pool).await?;
    create_push_subscriptions_table(pool).await?;
    add_desired_consumption_date(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (1)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_fridge_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fridge_items (
            guid TEXT PRIMARY KEY,
            member_id TEXT NOT NULL,
            part TEXT,
            custom_name TEXT,
            storage_date TEXT NOT NULL,
            expiry_date TEXT NOT NULL,
            slaughter_date TEXT,
            grade TEXT,
            origin TEXT,
            company_name TEXT,
            trace_number TEXT,
            desired_consumption_date TEXT,
            status TEXT NOT NULL DEFAULT 'stored' CHECK (status IN ('stored', 'consumed')),
            alert_before INTEGER NOT NULL DEFAULT 3 CHECK (alert_before >= 0),
            use_push INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (storage_date <= expiry_date),
            CHECK (part IS NOT NULL OR custom_name IS NOT NULL)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_fridge_items_member_expiry ON fridge_items(member_id, expiry_date, guid)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Schema v2: member's planned eating date
///
/// Databases created at v1 get the column added in place.
async fn add_desired_consumption_date(pool: &SqlitePool) -> Result<()> {
    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('fridge_items') WHERE name = 'desired_consumption_date'",
    )
    .fetch_one(pool)
    .await?;

    if has_column == 0 {
        sqlx::query("ALTER TABLE fridge_items ADD COLUMN desired_consumption_date TEXT")
            .execute(pool)
            .await?;
        info!("Migration v2: added desired_consumption_date to fridge_items");
    }

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (2)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_notifications_table(pool: &SqlitePool) -> Result<()> {
    // fridge_item_id is a plain column: clearing it on delete is done by the
    // store so the cancel/orphan transition stays in application code.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            guid TEXT PRIMARY KEY,
            member_id TEXT NOT NULL,
            fridge_item_id TEXT,
            notification_type TEXT NOT NULL CHECK (notification_type IN ('expiry_alert', 'custom')),
            alert_kind TEXT CHECK (alert_kind IN ('expiring_soon', 'expired')),
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            scheduled_at TEXT NOT NULL,
            sent_at TEXT,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'in_flight', 'sent', 'failed', 'cancelled')),
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            channel TEXT CHECK (channel IN ('push', 'in_app')),
            claimed_at TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // At most one live expiry alert per (item, kind)
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_notifications_one_live_alert
        ON notifications(fridge_item_id, alert_kind)
        WHERE notification_type = 'expiry_alert' AND status IN ('pending', 'in_flight')
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_notifications_due ON notifications(status, scheduled_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_notifications_member ON notifications(member_id, scheduled_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_push_subscriptions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS push_subscriptions (
            guid TEXT PRIMARY KEY,
            member_id TEXT NOT NULL,
            endpoint TEXT NOT NULL,
            p256dh_key TEXT NOT NULL,
            auth_key TEXT NOT NULL,
            user_agent TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (member_id, endpoint)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

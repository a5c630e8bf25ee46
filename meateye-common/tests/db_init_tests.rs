//! Database initialization tests

use meateye_common::db::init::init_database;
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("meateye.db");

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("meateye.db");

    let pool1 = init_database(&db_path).await;
    assert!(pool1.is_ok());

    // Second open re-runs the idempotent schema creation
    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_expected_tables_exist() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("meateye.db")).await.unwrap();

    for table in ["fridge_items", "notifications", "push_subscriptions", "schema_version"] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_expiry_before_storage_rejected_by_schema() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("meateye.db")).await.unwrap();

    let result = sqlx::query(
        r#"
        INSERT INTO fridge_items (guid, member_id, custom_name, storage_date, expiry_date, created_at, updated_at)
        VALUES ('a', 'm', 'x', '2026-10-19', '2026-10-18', 'now', 'now')
        "#,
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "CHECK constraint should reject expiry before storage");
}

#[tokio::test]
async fn test_single_live_alert_index() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("meateye.db")).await.unwrap();

    let insert = |guid: &'static str, status: &'static str| {
        let pool = pool.clone();
        async move {
            sqlx::query(
                r#"
                INSERT INTO notifications (guid, member_id, fridge_item_id, notification_type, alert_kind,
                                           title, body, scheduled_at, status, created_at)
                VALUES (?, 'm', 'item', 'expiry_alert', 'expiring_soon', 't', 'b', 's', ?, 'c')
                "#,
            )
            .bind(guid)
            .bind(status)
            .execute(&pool)
            .await
        }
    };

    assert!(insert("n1", "pending").await.is_ok());
    assert!(insert("n2", "pending").await.is_err(), "second pending alert must be rejected");
    assert!(insert("n3", "sent").await.is_ok(), "history rows are unrestricted");
}

#[tokio::test]
async fn test_v1_database_gains_desired_consumption_date() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("meateye.db");

    // Layout written by the first release
    {
        let options = sqlx::sqlite::SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = sqlx::SqlitePool::connect_with(options).await.unwrap();
        sqlx::query(
            r#"
            CREATE TABLE fridge_items (
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
                status TEXT NOT NULL DEFAULT 'stored',
                alert_before INTEGER NOT NULL DEFAULT 3,
                use_push INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('fridge_items') WHERE name = 'desired_consumption_date'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(has_column, 1);

    let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, 2);

    // Running again is a no-op
    assert!(init_database(&db_path).await.is_ok());
}

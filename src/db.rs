use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

const LEAVE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS employees (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS leave_balances (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_id INTEGER NOT NULL UNIQUE REFERENCES employees(id),
        annual_balance INTEGER NOT NULL DEFAULT 20,
        sick_balance INTEGER NOT NULL DEFAULT 10
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS leave_requests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_id INTEGER NOT NULL REFERENCES employees(id),
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        leave_type TEXT NOT NULL,
        reason TEXT,
        status TEXT NOT NULL DEFAULT 'pending'
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_leave_requests_employee ON leave_requests(employee_id)",
];

const TIMESHEET_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS employees (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS timesheet_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_id INTEGER NOT NULL REFERENCES employees(id),
        entry_date TEXT NOT NULL,
        hours REAL NOT NULL,
        project TEXT,
        notes TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_timesheet_entries_employee ON timesheet_entries(employee_id)",
];

/// Which resource service a database belongs to.
#[derive(Debug, Clone, Copy)]
pub enum Schema {
    Leave,
    Timesheet,
}

pub async fn init_db(database_url: &str) -> Result<SqlitePool> {
    ensure_parent_dir(database_url)?;

    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid database url: {database_url}"))?
        .create_if_missing(true)
        .foreign_keys(true);

    let mut pool_options = SqlitePoolOptions::new().max_connections(5);
    if database_url.contains(":memory:") {
        // every connection to :memory: is a separate database
        pool_options = pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    pool_options
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to database {database_url}"))
}

pub async fn migrate(pool: &SqlitePool, schema: Schema) -> Result<()> {
    let statements = match schema {
        Schema::Leave => LEAVE_SCHEMA,
        Schema::Timesheet => TIMESHEET_SCHEMA,
    };

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to apply {schema:?} schema"))?;
    }

    info!(?schema, "Schema ready");
    Ok(())
}

/// Seeds starter data when the employees table is empty. Never fails start-up.
pub async fn seed_if_empty(pool: &SqlitePool, schema: Schema) {
    if let Err(e) = try_seed(pool, schema).await {
        warn!(error = %e, ?schema, "Seeding skipped");
    }
}

async fn try_seed(pool: &SqlitePool, schema: Schema) -> Result<()> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    let alice = sqlx::query("INSERT INTO employees (name, email) VALUES (?, ?)")
        .bind("Alice Johnson")
        .bind("alice@example.com")
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
    let bob = sqlx::query("INSERT INTO employees (name, email) VALUES (?, ?)")
        .bind("Bob Smith")
        .bind("bob@example.com")
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    match schema {
        Schema::Leave => {
            for (employee_id, annual, sick) in [(alice, 20, 10), (bob, 18, 9)] {
                sqlx::query(
                    "INSERT INTO leave_balances (employee_id, annual_balance, sick_balance) VALUES (?, ?, ?)",
                )
                .bind(employee_id)
                .bind(annual)
                .bind(sick)
                .execute(&mut *tx)
                .await?;
            }
        }
        Schema::Timesheet => {
            let today = chrono::Local::now().date_naive();
            for (employee_id, hours, project) in [(alice, 8.0, "PROJ001"), (bob, 7.0, "OPS")] {
                sqlx::query(
                    "INSERT INTO timesheet_entries (employee_id, entry_date, hours, project, notes) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(employee_id)
                .bind(today)
                .bind(hours)
                .bind(project)
                .bind("Init")
                .execute(&mut *tx)
                .await?;
            }
        }
    }

    tx.commit().await?;
    info!(?schema, "Seeded starter employees");
    Ok(())
}

fn ensure_parent_dir(database_url: &str) -> Result<()> {
    let Some(path) = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
    else {
        return Ok(());
    };
    if path.starts_with(":memory:") {
        return Ok(());
    }
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Fresh in-memory database with the given schema applied.
#[cfg(test)]
pub async fn test_pool(schema: Schema) -> SqlitePool {
    let pool = init_db("sqlite::memory:").await.unwrap();
    migrate(&pool, schema).await.unwrap();
    pool
}

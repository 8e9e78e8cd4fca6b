pub mod models;

use std::collections::HashSet;
use std::path::Path;

use chrono::Utc;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection};

use crate::config::DatabaseConfig;
use crate::db::models::{format_timestamp, MigrationRecord};
use crate::state::DbPool;

/// What a migration does to the schema.
#[derive(Clone, Copy)]
pub enum MigrationAction {
    /// A SQL batch, executed as-is.
    Sql(&'static str),
    /// A Rust procedure, for changes SQLite cannot express idempotently in SQL.
    Procedure(fn(&Connection) -> rusqlite::Result<()>),
}

#[derive(Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    pub action: MigrationAction,
}

impl Migration {
    pub const fn sql(name: &'static str, sql: &'static str) -> Self {
        Self {
            name,
            action: MigrationAction::Sql(sql),
        }
    }

    pub const fn procedure(
        name: &'static str,
        procedure: fn(&Connection) -> rusqlite::Result<()>,
    ) -> Self {
        Self {
            name,
            action: MigrationAction::Procedure(procedure),
        }
    }

    fn execute(&self, conn: &Connection) -> rusqlite::Result<()> {
        match self.action {
            MigrationAction::Sql(sql) => conn.execute_batch(sql),
            MigrationAction::Procedure(procedure) => procedure(conn),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Migration {name} failed: {source}")]
    Failed {
        name: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Migration name declared twice: {0}")]
    DuplicateName(&'static str),

    #[error("Migration bookkeeping failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub const MIGRATIONS: &[Migration] = &[
    Migration::sql(
        "001_create_posts",
        include_str!("../../migrations/001_create_posts.sql"),
    ),
    Migration::procedure("002_add_post_series", add_post_series),
    Migration::sql(
        "003_post_indexes",
        include_str!("../../migrations/003_post_indexes.sql"),
    ),
    Migration::sql(
        "004_sessions",
        include_str!("../../migrations/004_sessions.sql"),
    ),
];

fn add_post_series(conn: &Connection) -> rusqlite::Result<()> {
    add_column_if_absent(conn, "posts", "series", "TEXT")?;
    add_column_if_absent(conn, "posts", "series_order", "REAL")
}

/// `ALTER TABLE .. ADD COLUMN`, skipped when the column already exists.
pub fn add_column_if_absent(
    conn: &Connection,
    table: &str,
    column: &str,
    definition: &str,
) -> rusqlite::Result<()> {
    if column_exists(conn, table, column)? {
        return Ok(());
    }
    conn.execute_batch(&format!(
        "ALTER TABLE {} ADD COLUMN {} {};",
        table, column, definition
    ))
}

pub fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name == column))
}

pub fn create_pool(db_path: &Path, settings: &DatabaseConfig) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Per-connection pragmas; journal_mode is persisted in the file itself.
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )
    });
    let pool = Pool::builder()
        .max_size(settings.pool_size.max(1))
        .idle_timeout(Some(settings.idle_timeout()))
        .connection_timeout(settings.connection_timeout())
        .build(manager)?;

    let conn = pool.get()?;
    conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))?;

    Ok(pool)
}

/// Apply every pending entry of [`MIGRATIONS`]. Returns the names applied in this run.
pub fn run_migrations(pool: &DbPool) -> Result<Vec<&'static str>, MigrationError> {
    let mut conn = pool.get()?;
    let applied = apply_migrations(&mut conn, MIGRATIONS)?;

    if applied.is_empty() {
        tracing::info!("Database schema up to date");
    } else {
        tracing::info!("Database migrations complete ({} applied)", applied.len());
    }
    Ok(applied)
}

/// Run the migrations of `declared` whose names are not yet recorded in
/// `_migrations`, in declared order. Each action and its record commit together;
/// the first failure stops the run.
pub fn apply_migrations(
    conn: &mut Connection,
    declared: &[Migration],
) -> Result<Vec<&'static str>, MigrationError> {
    let mut seen = HashSet::new();
    for migration in declared {
        if !seen.insert(migration.name) {
            return Err(MigrationError::DuplicateName(migration.name));
        }
    }

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            executed_at TEXT NOT NULL
        );",
    )?;

    let recorded: HashSet<String> = recorded_migrations(conn)?
        .into_iter()
        .map(|record| record.name)
        .collect();

    let mut applied = Vec::new();
    for migration in declared
        .iter()
        .filter(|m| !recorded.contains(m.name))
    {
        tracing::info!("Applying migration: {}", migration.name);

        let fail = |source: rusqlite::Error| MigrationError::Failed {
            name: migration.name,
            source,
        };
        let tx = conn.transaction().map_err(fail)?;
        migration.execute(&tx).map_err(fail)?;
        tx.execute(
            "INSERT INTO _migrations (name, executed_at) VALUES (?1, ?2)",
            params![migration.name, format_timestamp(Utc::now())],
        )
        .map_err(fail)?;
        tx.commit().map_err(fail)?;

        applied.push(migration.name);
    }

    Ok(applied)
}

pub fn recorded_migrations(conn: &Connection) -> rusqlite::Result<Vec<MigrationRecord>> {
    let mut stmt =
        conn.prepare("SELECT name, executed_at FROM _migrations ORDER BY executed_at, name")?;
    let records = stmt
        .query_map([], |row| {
            Ok(MigrationRecord {
                name: row.get(0)?,
                executed_at: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

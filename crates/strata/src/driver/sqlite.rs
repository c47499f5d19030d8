//! SQLite driver, registered as `sqlite3`.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::MigrateResult;
use crate::migration::Record;

use super::{Driver, DriverFactory, DriverTransaction};

/// Connects [`SqliteDriver`]s. The datasource is a file path, a
/// `sqlite:` URL, or `:memory:`.
pub struct SqliteFactory;

#[async_trait]
impl DriverFactory for SqliteFactory {
    fn dialect(&self) -> &'static str {
        "sqlite3"
    }

    async fn open(&self, datasource: &str, table: &str) -> MigrateResult<Box<dyn Driver>> {
        Ok(Box::new(SqliteDriver::connect(datasource, table).await?))
    }
}

/// Driver over a single-connection SQLite pool.
pub struct SqliteDriver {
    pool: SqlitePool,
    table: String,
}

impl SqliteDriver {
    /// Open the database, creating the file if it does not exist yet.
    pub async fn connect(datasource: &str, table: &str) -> MigrateResult<Self> {
        let options = SqliteConnectOptions::from_str(datasource)?.create_if_missing(true);

        // One connection, so `:memory:` databases keep their contents
        // between calls.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        debug!(datasource, table, "opened sqlite database");
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    /// The underlying pool, for callers that need to inspect the schema.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn table_ident(&self) -> String {
        quote_ident(&self.table)
    }
}

/// Double-quote an identifier, doubling embedded quotes.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[async_trait]
impl Driver for SqliteDriver {
    async fn ensure_record_table(&self) -> MigrateResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    id         TEXT PRIMARY KEY,\n    applied_at DATETIME NOT NULL\n)",
            self.table_ident()
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn records(&self) -> MigrateResult<Vec<Record>> {
        let sql = format!(
            "SELECT id, applied_at FROM {} ORDER BY id ASC",
            self.table_ident()
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                Ok(Record {
                    id: row.try_get("id")?,
                    applied_at: row.try_get("applied_at")?,
                })
            })
            .collect()
    }

    async fn begin(&self) -> MigrateResult<Box<dyn DriverTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteDriverTransaction {
            tx,
            table: self.table.clone(),
        }))
    }

    async fn exec(&self, sql: &str) -> MigrateResult<()> {
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_record(&self, record: &Record) -> MigrateResult<()> {
        let sql = format!(
            "INSERT INTO {} (id, applied_at) VALUES (?, ?)",
            self.table_ident()
        );
        sqlx::query(&sql)
            .bind(&record.id)
            .bind(record.applied_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_record(&self, id: &str) -> MigrateResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", self.table_ident());
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// SQLite transactions are serializable by construction, so `begin`
/// requests nothing beyond the default.
struct SqliteDriverTransaction {
    tx: Transaction<'static, Sqlite>,
    table: String,
}

impl SqliteDriverTransaction {
    fn table_ident(&self) -> String {
        quote_ident(&self.table)
    }
}

#[async_trait]
impl DriverTransaction for SqliteDriverTransaction {
    async fn exec(&mut self, sql: &str) -> MigrateResult<()> {
        sqlx::query(sql).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn insert_record(&mut self, record: &Record) -> MigrateResult<()> {
        let sql = format!(
            "INSERT INTO {} (id, applied_at) VALUES (?, ?)",
            self.table_ident()
        );
        sqlx::query(&sql)
            .bind(&record.id)
            .bind(record.applied_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_record(&mut self, id: &str) -> MigrateResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", self.table_ident());
        sqlx::query(&sql).bind(id).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

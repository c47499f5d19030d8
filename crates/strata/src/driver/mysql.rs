//! MySQL driver, registered as `mysql`.

use async_trait::async_trait;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySql, MySqlPool, Row, Transaction};
use tracing::debug;

use crate::error::MigrateResult;
use crate::migration::Record;

use super::{Driver, DriverFactory, DriverTransaction};

/// Connects [`MySqlDriver`]s from a `mysql://` URL.
pub struct MySqlFactory;

#[async_trait]
impl DriverFactory for MySqlFactory {
    fn dialect(&self) -> &'static str {
        "mysql"
    }

    async fn open(&self, datasource: &str, table: &str) -> MigrateResult<Box<dyn Driver>> {
        Ok(Box::new(MySqlDriver::connect(datasource, table).await?))
    }
}

/// Driver over a MySQL connection pool.
pub struct MySqlDriver {
    pool: MySqlPool,
    table: String,
}

impl MySqlDriver {
    pub async fn connect(datasource: &str, table: &str) -> MigrateResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect(datasource)
            .await?;

        debug!(table, "opened mysql database");
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    /// The underlying pool, for callers that need to inspect the schema.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    fn table_ident(&self) -> String {
        quote_ident(&self.table)
    }
}

/// Backtick-quote an identifier, doubling embedded backticks.
fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[async_trait]
impl Driver for MySqlDriver {
    async fn ensure_record_table(&self) -> MigrateResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    id         VARCHAR(255) PRIMARY KEY,\n    applied_at TIMESTAMP NOT NULL\n)",
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
        Ok(Box::new(MySqlDriverTransaction {
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

struct MySqlDriverTransaction {
    tx: Transaction<'static, MySql>,
    table: String,
}

impl MySqlDriverTransaction {
    fn table_ident(&self) -> String {
        quote_ident(&self.table)
    }
}

#[async_trait]
impl DriverTransaction for MySqlDriverTransaction {
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

//! Database driver contract and registry.
//!
//! A driver is the sole entry point to one database: it owns the
//! connection pool, keeps the bookkeeping table, and hands out
//! transactions. Drivers are registered by dialect name in a
//! [`DriverRegistry`] owned by the process entry point; the registry is
//! built once during startup and read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{MigrateError, MigrateResult};
use crate::migration::Record;

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::{MySqlDriver, MySqlFactory};
pub use postgres::{PostgresDriver, PostgresFactory};
pub use sqlite::{SqliteDriver, SqliteFactory};

/// The capability set the executor needs from a database.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Idempotent create-if-not-exists of the bookkeeping table.
    async fn ensure_record_table(&self) -> MigrateResult<()>;

    /// All bookkeeping rows, ascending by ID.
    async fn records(&self) -> MigrateResult<Vec<Record>>;

    /// Start a transaction with the same statement surface plus
    /// commit/rollback.
    async fn begin(&self) -> MigrateResult<Box<dyn DriverTransaction>>;

    /// Execute one statement outside any transaction.
    async fn exec(&self, sql: &str) -> MigrateResult<()>;

    /// Write one bookkeeping row.
    async fn insert_record(&self, record: &Record) -> MigrateResult<()>;

    /// Remove one bookkeeping row by ID.
    async fn delete_record(&self, id: &str) -> MigrateResult<()>;

    /// Release the connection pool.
    async fn close(&self);
}

/// One open transaction. Substitutable for the driver in per-step
/// execution; committing or rolling back consumes it.
#[async_trait]
pub trait DriverTransaction: Send {
    async fn exec(&mut self, sql: &str) -> MigrateResult<()>;
    async fn insert_record(&mut self, record: &Record) -> MigrateResult<()>;
    async fn delete_record(&mut self, id: &str) -> MigrateResult<()>;
    async fn commit(self: Box<Self>) -> MigrateResult<()>;
    async fn rollback(self: Box<Self>) -> MigrateResult<()>;
}

/// Connects drivers of one dialect.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// The dialect name this factory registers under.
    fn dialect(&self) -> &'static str;

    /// Open a connection to `datasource`, using `table` as the
    /// bookkeeping table name.
    async fn open(&self, datasource: &str, table: &str) -> MigrateResult<Box<dyn Driver>>;
}

/// Maps dialect names to driver factories.
pub struct DriverRegistry {
    factories: HashMap<&'static str, Arc<dyn DriverFactory>>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with every built-in dialect registered.
    pub fn with_default_drivers() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PostgresFactory));
        registry.register(Arc::new(SqliteFactory));
        registry.register(Arc::new(MySqlFactory));
        registry
    }

    /// Register a driver factory under its dialect name.
    pub fn register(&mut self, factory: Arc<dyn DriverFactory>) {
        self.factories.insert(factory.dialect(), factory);
    }

    /// Dialect names with a registered factory.
    pub fn dialects(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Connect to the database and make sure the bookkeeping table
    /// exists.
    pub async fn open(
        &self,
        dialect: &str,
        datasource: &str,
        table: &str,
    ) -> MigrateResult<Box<dyn Driver>> {
        let factory = self
            .factories
            .get(dialect)
            .ok_or_else(|| MigrateError::UnsupportedDialect(dialect.to_string()))?;

        let driver = factory.open(datasource, table).await?;
        driver.ensure_record_table().await?;
        Ok(driver)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

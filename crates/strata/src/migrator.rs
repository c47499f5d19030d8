//! The migrator: ties a driver to a source and runs plans.

use tracing::info;

use crate::driver::{Driver, DriverRegistry};
use crate::error::MigrateResult;
use crate::executor;
use crate::migration::{Direction, PlannedMigration, Record};
use crate::planner;
use crate::source::Source;

/// Applies migration plans against one database.
///
/// The migrator owns the driver handle for its whole life; callers open
/// it before the first plan and [`close`](Migrator::close) it after the
/// last.
pub struct Migrator {
    driver: Box<dyn Driver>,
}

impl Migrator {
    /// Wrap an already-open driver.
    pub fn new(driver: Box<dyn Driver>) -> Self {
        Self { driver }
    }

    /// Open a driver through the registry and wrap it. The bookkeeping
    /// table is created if it does not exist yet.
    pub async fn open(
        registry: &DriverRegistry,
        dialect: &str,
        datasource: &str,
        table: &str,
    ) -> MigrateResult<Self> {
        let driver = registry.open(dialect, datasource, table).await?;
        Ok(Self::new(driver))
    }

    /// The underlying driver.
    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// Apply all pending migrations in `direction`. Returns the number
    /// of applied steps.
    pub async fn exec(&self, source: &dyn Source, direction: Direction) -> MigrateResult<usize> {
        self.exec_max(source, direction, 0).await
    }

    /// Apply at most `limit` migrations in `direction`; 0 means no
    /// limit. Catch-up steps do not count against the limit.
    pub async fn exec_max(
        &self,
        source: &dyn Source,
        direction: Direction,
        limit: usize,
    ) -> MigrateResult<usize> {
        let plan = self.plan(source, direction, limit).await?;
        let applied = executor::execute(self.driver.as_ref(), &plan).await?;
        info!(applied, direction = direction.label(), "migrations applied");
        Ok(applied)
    }

    /// Mark at most `limit` migrations as applied (or reversed) without
    /// running their statements; 0 means no limit.
    pub async fn skip_max(
        &self,
        source: &dyn Source,
        direction: Direction,
        limit: usize,
    ) -> MigrateResult<usize> {
        let plan = self.plan(source, direction, limit).await?;
        let skipped = executor::skip(self.driver.as_ref(), &plan).await?;
        info!(skipped, direction = direction.label(), "migrations skipped");
        Ok(skipped)
    }

    /// Compute the plan without executing it.
    pub async fn plan(
        &self,
        source: &dyn Source,
        direction: Direction,
        limit: usize,
    ) -> MigrateResult<Vec<PlannedMigration>> {
        let declared = source.find()?;
        let records = self.driver.records().await?;
        planner::plan(&declared, &records, direction, limit)
    }

    /// The bookkeeping rows, ascending by ID.
    pub async fn records(&self) -> MigrateResult<Vec<Record>> {
        self.driver.records().await
    }

    /// Release the database connection.
    pub async fn close(&self) {
        self.driver.close().await;
    }
}

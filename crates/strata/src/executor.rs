//! Step-by-step application of a migration plan.
//!
//! Each step runs against either a fresh transaction or, when the step
//! disables transactions, the driver itself. The bookkeeping row is
//! written or deleted through the same executor as the step's
//! statements, so a rollback takes the record with it.

use tracing::debug;

use crate::driver::{Driver, DriverTransaction};
use crate::error::{MigrateError, MigrateResult};
use crate::migration::{Direction, PlannedMigration, Record};

/// Apply every step of the plan in order. Returns the number of steps
/// applied; on failure the error carries that count along with the
/// failing step's ID.
pub async fn execute(driver: &dyn Driver, plan: &[PlannedMigration]) -> MigrateResult<usize> {
    run(driver, plan, true).await
}

/// Walk the plan writing only the bookkeeping rows, without running any
/// statement. This marks migrations as applied so an existing schema can
/// be adopted.
pub async fn skip(driver: &dyn Driver, plan: &[PlannedMigration]) -> MigrateResult<usize> {
    run(driver, plan, false).await
}

async fn run(
    driver: &dyn Driver,
    plan: &[PlannedMigration],
    run_queries: bool,
) -> MigrateResult<usize> {
    let mut applied = 0;
    for step in plan {
        let mut executor = if step.disable_transaction {
            StepExecutor::Direct(driver)
        } else {
            match driver.begin().await {
                Ok(tx) => StepExecutor::Transaction(tx),
                Err(e) => return Err(MigrateError::tx(step.id(), applied, e)),
            }
        };

        let result = apply_step(&mut executor, step, run_queries).await;
        if let Err(e) = executor.finish(result).await {
            return Err(MigrateError::tx(step.id(), applied, e));
        }

        applied += 1;
        debug!(
            id = step.id(),
            direction = step.direction.label(),
            "applied migration step"
        );
    }
    Ok(applied)
}

async fn apply_step(
    executor: &mut StepExecutor<'_>,
    step: &PlannedMigration,
    run_queries: bool,
) -> MigrateResult<()> {
    if run_queries {
        for statement in &step.queries {
            executor.exec(statement).await?;
        }
    }
    match step.direction {
        Direction::Up => {
            executor
                .insert_record(&Record::applied_now(step.id()))
                .await
        }
        Direction::Down => executor.delete_record(step.id()).await,
    }
}

/// The statement surface one step runs against: either the driver
/// directly (a transaction that cannot roll back) or an open
/// transaction.
enum StepExecutor<'a> {
    Direct(&'a dyn Driver),
    Transaction(Box<dyn DriverTransaction>),
}

impl StepExecutor<'_> {
    async fn exec(&mut self, sql: &str) -> MigrateResult<()> {
        match self {
            Self::Direct(driver) => driver.exec(sql).await,
            Self::Transaction(tx) => tx.exec(sql).await,
        }
    }

    async fn insert_record(&mut self, record: &Record) -> MigrateResult<()> {
        match self {
            Self::Direct(driver) => driver.insert_record(record).await,
            Self::Transaction(tx) => tx.insert_record(record).await,
        }
    }

    async fn delete_record(&mut self, id: &str) -> MigrateResult<()> {
        match self {
            Self::Direct(driver) => driver.delete_record(id).await,
            Self::Transaction(tx) => tx.delete_record(id).await,
        }
    }

    /// Resolve the step: commit on success, roll back best-effort on
    /// failure. Direct steps pass the result through; their effects are
    /// already durable, partial or not.
    async fn finish(self, result: MigrateResult<()>) -> MigrateResult<()> {
        match self {
            Self::Direct(_) => result,
            Self::Transaction(tx) => match result {
                Ok(()) => tx.commit().await,
                Err(e) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        debug!(error = %rollback_err, "rollback after failed step also failed");
                    }
                    Err(e)
                }
            },
        }
    }
}

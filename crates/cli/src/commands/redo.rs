//! `redo`: roll back the last migration and apply it again.

use strata::{Direction, FileSource, MigrateResult, Migrator, PlannedMigration};

use crate::config::Environment;

use super::common;

pub async fn redo(env: &Environment, dryrun: bool) -> MigrateResult<()> {
    let migrator = common::open_migrator(env).await?;
    let result = run(&migrator, &common::source(env), dryrun).await;
    migrator.close().await;
    result
}

async fn run(migrator: &Migrator, source: &FileSource, dryrun: bool) -> MigrateResult<()> {
    let plan = migrator.plan(source, Direction::Down, 1).await?;
    // catch-up steps may precede the step being redone
    let Some(step) = plan.last() else {
        println!("Nothing to do!");
        return Ok(());
    };

    if dryrun {
        for planned in &plan {
            common::print_planned(planned);
        }
        common::print_planned(&PlannedMigration::forward(&step.migration));
        return Ok(());
    }

    let id = step.id().to_string();
    migrator.exec_max(source, Direction::Down, 1).await?;
    migrator.exec_max(source, Direction::Up, 1).await?;
    println!("Reapplied migration {id}.");
    Ok(())
}

//! Shared plumbing for the migration subcommands.

use colored::Colorize;
use strata::{
    Direction, DriverRegistry, FileSource, MigrateResult, Migrator, PlannedMigration,
};

use crate::config::Environment;

/// Connect to the environment's database with the bookkeeping table
/// ready.
pub async fn open_migrator(env: &Environment) -> MigrateResult<Migrator> {
    let registry = DriverRegistry::with_default_drivers();
    Migrator::open(&registry, &env.dialect, &env.datasource, &env.table).await
}

/// The environment's migration directory as a source.
pub fn source(env: &Environment) -> FileSource {
    FileSource::new(&env.dir)
}

/// `up` and `down`: apply (or preview) at most `limit` migrations.
pub async fn apply(
    env: &Environment,
    direction: Direction,
    limit: usize,
    dryrun: bool,
) -> MigrateResult<()> {
    let migrator = open_migrator(env).await?;
    let result = run(&migrator, env, direction, limit, dryrun).await;
    migrator.close().await;
    result
}

async fn run(
    migrator: &Migrator,
    env: &Environment,
    direction: Direction,
    limit: usize,
    dryrun: bool,
) -> MigrateResult<()> {
    let source = source(env);

    if dryrun {
        for step in migrator.plan(&source, direction, limit).await? {
            print_planned(&step);
        }
        return Ok(());
    }

    let applied = migrator.exec_max(&source, direction, limit).await?;
    if applied == 1 {
        println!("Applied 1 migration");
    } else {
        println!("Applied {applied} migrations");
    }
    Ok(())
}

/// Dry-run rendering of one planned step.
pub fn print_planned(step: &PlannedMigration) {
    println!(
        "{} Would apply migration {} ({})",
        "==>".cyan().bold(),
        step.id(),
        step.direction.label()
    );
    for query in &step.queries {
        println!("{query}");
    }
}

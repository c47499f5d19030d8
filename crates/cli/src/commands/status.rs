//! `status`: declared migrations against the recorded history.

use std::collections::{HashMap, HashSet};

use colored::Colorize;
use strata::{MigrateResult, Migrator, Record, Source};

use crate::config::Environment;

use super::common;

pub async fn status(env: &Environment) -> MigrateResult<()> {
    let migrator = common::open_migrator(env).await?;
    let result = run(&migrator, env).await;
    migrator.close().await;
    result
}

async fn run(migrator: &Migrator, env: &Environment) -> MigrateResult<()> {
    let migrations = common::source(env).find()?;
    let records = migrator.records().await?;

    let known: HashSet<&str> = migrations.iter().map(|m| m.id.as_str()).collect();
    for record in &records {
        if !known.contains(record.id.as_str()) {
            eprintln!(
                "{} could not find migration file: {}",
                "warning:".yellow().bold(),
                record.id
            );
        }
    }

    let applied: HashMap<&str, &Record> =
        records.iter().map(|r| (r.id.as_str(), r)).collect();

    let width = migrations
        .iter()
        .map(|m| m.id.len())
        .chain(["MIGRATION".len()])
        .max()
        .unwrap_or_default();

    println!("{:<width$}  APPLIED", "MIGRATION");
    for migration in &migrations {
        match applied.get(migration.id.as_str()) {
            Some(record) => println!(
                "{:<width$}  {}",
                migration.id,
                record.applied_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            None => println!("{:<width$}  no", migration.id),
        }
    }
    Ok(())
}

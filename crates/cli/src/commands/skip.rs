//! `skip`: record pending migrations as applied without running them.

use strata::{Direction, MigrateResult};

use crate::config::Environment;

use super::common;

pub async fn skip(env: &Environment, limit: usize) -> MigrateResult<()> {
    let migrator = common::open_migrator(env).await?;
    let result = migrator
        .skip_max(&common::source(env), Direction::Up, limit)
        .await;
    migrator.close().await;

    let skipped = result?;
    if skipped == 1 {
        println!("Skipped 1 migration");
    } else {
        println!("Skipped {skipped} migrations");
    }
    Ok(())
}

//! `new`: scaffold a migration file in the environment's directory.

use std::fs;
use std::path::Path;

use chrono::Utc;
use strata::{MigrateError, MigrateResult};

use crate::config::Environment;

const TEMPLATE: &str = "\n-- +migrate Up\n\n-- +migrate Down\n";

pub fn new_migration(env: &Environment, name: &str) -> MigrateResult<()> {
    let dir = Path::new(&env.dir);
    fs::create_dir_all(dir)
        .map_err(|e| MigrateError::config(format!("could not create {}: {e}", env.dir)))?;

    let slug = name
        .trim()
        .replace(|c: char| c.is_whitespace(), "_")
        .to_lowercase();
    let file_name = format!("{}-{}.sql", Utc::now().format("%Y%m%d%H%M%S"), slug);
    let path = dir.join(&file_name);

    fs::write(&path, TEMPLATE)
        .map_err(|e| MigrateError::config(format!("could not write {}: {e}", path.display())))?;

    println!("Created migration {}", path.display());
    Ok(())
}

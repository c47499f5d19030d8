//! Migration sources: where declared migrations come from.
//!
//! A source enumerates the migrations available to the planner, sorted by
//! the canonical ID order. Calling [`Source::find`] repeatedly is safe;
//! every call returns a freshly sorted list and never mutates shared
//! state.

use std::fs;
use std::path::PathBuf;

use crate::error::{MigrateError, MigrateResult};
use crate::migration::Migration;
use crate::parser::parse_migration;

/// Produces the ordered list of declared migrations.
pub trait Source {
    /// Find the migrations, sorted by ID.
    fn find(&self) -> MigrateResult<Vec<Migration>>;
}

/// A hardcoded set of migrations, in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    pub migrations: Vec<Migration>,
}

impl MemorySource {
    pub fn new(migrations: Vec<Migration>) -> Self {
        Self { migrations }
    }
}

impl Source for MemorySource {
    fn find(&self) -> MigrateResult<Vec<Migration>> {
        // Sort a copy so the source stays safe for repeated use.
        let mut migrations = self.migrations.clone();
        migrations.sort();
        Ok(migrations)
    }
}

/// Migrations loaded from `*.sql` files in a single directory.
///
/// The scan is non-recursive and the file name, extension included, is the
/// migration ID.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub dir: PathBuf,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Source for FileSource {
    fn find(&self) -> MigrateResult<Vec<Migration>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| MigrateError::Source {
            name: self.dir.display().to_string(),
            source: e,
        })?;

        let mut migrations = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MigrateError::Source {
                name: self.dir.display().to_string(),
                source: e,
            })?;

            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".sql") {
                continue;
            }

            let content = fs::read_to_string(entry.path()).map_err(|e| MigrateError::Source {
                name: name.clone(),
                source: e,
            })?;
            let parsed = parse_migration(&content).map_err(|e| MigrateError::Parse {
                id: name.clone(),
                source: e,
            })?;

            migrations.push(Migration {
                id: name,
                up: parsed.up_statements,
                down: parsed.down_statements,
                disable_transaction_up: parsed.disable_transaction_up,
                disable_transaction_down: parsed.disable_transaction_down,
            });
        }

        migrations.sort();
        Ok(migrations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use tempfile::TempDir;

    fn write_migration(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn memory_source_returns_sorted_copies() {
        let source = MemorySource::new(vec![
            Migration::new("10_last.sql"),
            Migration::new("2_second.sql"),
            Migration::new("1_first.sql"),
        ]);

        let found = source.find().unwrap();
        let ids: Vec<_> = found.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1_first.sql", "2_second.sql", "10_last.sql"]);

        // the source itself stays untouched
        assert_eq!(source.migrations[0].id, "10_last.sql");
    }

    #[test]
    fn file_source_reads_and_parses_sql_files() {
        let dir = TempDir::new().unwrap();
        write_migration(
            &dir,
            "1_create.sql",
            "-- +migrate Up\nCREATE TABLE people (id int);\n-- +migrate Down\nDROP TABLE people;\n",
        );
        write_migration(
            &dir,
            "2_alter.sql",
            "-- +migrate Up\nALTER TABLE people ADD COLUMN first_name text;\n-- +migrate Down\nSELECT 0;\n",
        );
        write_migration(&dir, "notes.txt", "not a migration");

        let found = FileSource::new(dir.path()).find().unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, "1_create.sql");
        assert_eq!(found[0].up, vec!["CREATE TABLE people (id int);"]);
        assert_eq!(found[1].id, "2_alter.sql");
    }

    #[test]
    fn file_source_sorts_by_numeric_prefix() {
        let dir = TempDir::new().unwrap();
        for name in ["10_c.sql", "2_b.sql", "1_a.sql"] {
            write_migration(&dir, name, "-- +migrate Up\nSELECT 1;\n");
        }

        let found = FileSource::new(dir.path()).find().unwrap();
        let ids: Vec<_> = found.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1_a.sql", "2_b.sql", "10_c.sql"]);
    }

    #[test]
    fn missing_directory_is_a_source_error() {
        let err = FileSource::new("/definitely/not/here").find().unwrap_err();
        assert!(matches!(err, MigrateError::Source { .. }));
    }

    #[test]
    fn parse_failures_name_the_file() {
        let dir = TempDir::new().unwrap();
        write_migration(&dir, "1_broken.sql", "CREATE TABLE people (id int);\n");

        let err = FileSource::new(dir.path()).find().unwrap_err();
        match err {
            MigrateError::Parse { id, .. } => assert_eq!(id, "1_broken.sql"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}

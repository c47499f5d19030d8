//! # strata: versioned SQL schema migrations
//!
//! Strata applies ordered, reversible schema changes to a relational
//! database and records which changes have been applied, so a database
//! can be brought forward and backward to any point in its history.
//!
//! - `parser` - splits one migration file into forward and reverse
//!   statement lists, honoring direction markers, transaction hints and
//!   SQL-aware statement boundaries
//! - `source` - enumerates declared migrations from a directory or from
//!   memory, sorted by the canonical ID order
//! - `driver` - the database capability contract, a registry keyed by
//!   dialect name, and drivers for postgres, sqlite3 and mysql
//! - `planner` - computes the ordered plan, including catch-up for
//!   histories reordered by merges
//! - `executor` - applies a plan step by step with per-step
//!   transactional discipline
//!
//! ```no_run
//! use strata::{Direction, DriverRegistry, FileSource, Migrator};
//!
//! # async fn demo() -> strata::MigrateResult<()> {
//! let registry = DriverRegistry::with_default_drivers();
//! let migrator = Migrator::open(&registry, "sqlite3", "app.sqlite3", "migration").await?;
//! let applied = migrator.exec(&FileSource::new("migrations"), Direction::Up).await?;
//! println!("applied {applied} migrations");
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod error;
pub mod executor;
pub mod migration;
pub mod migrator;
pub mod parser;
pub mod planner;
pub mod source;

// Error handling
pub use error::{MigrateError, MigrateResult};

// Data model and ordering
pub use migration::{compare_ids, Direction, Migration, PlannedMigration, Record};

// Parsing
pub use parser::{parse_migration, ParseError, ParsedMigration};

// Sources
pub use source::{FileSource, MemorySource, Source};

// Drivers
pub use driver::{
    Driver, DriverFactory, DriverRegistry, DriverTransaction, MySqlDriver, PostgresDriver,
    SqliteDriver,
};

// Planning and execution
pub use migrator::Migrator;
pub use planner::plan;

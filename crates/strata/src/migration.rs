//! Migration data model and the canonical ordering over migration IDs.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

/// One declared schema change: a named pair of forward and reverse SQL
/// statement lists, plus per-direction transaction opt-outs.
///
/// Migrations are immutable once parsed; sources hand out fresh copies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Migration {
    /// Unique identifier within a source. For file-backed sources this is
    /// the file name including its `.sql` extension.
    pub id: String,

    /// Forward statements, in execution order.
    pub up: Vec<String>,
    /// Reverse statements, in execution order.
    pub down: Vec<String>,

    /// Run the forward statements outside a transaction.
    pub disable_transaction_up: bool,
    /// Run the reverse statements outside a transaction.
    pub disable_transaction_down: bool,
}

impl Migration {
    /// Create a migration with the given ID and no statements.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

impl PartialOrd for Migration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Migration {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_ids(&self.id, &other.id)
    }
}

/// The leading decimal digit run of an ID, parsed as an integer.
fn numeric_prefix(id: &str) -> Option<u64> {
    let digits = &id[..id.bytes().take_while(u8::is_ascii_digit).count()];
    digits.parse().ok()
}

/// The canonical total order over migration IDs.
///
/// IDs with a leading numeric prefix compare by the prefix value first;
/// a numeric-prefixed ID sorts before one without a prefix; ties and
/// non-numeric IDs fall back to byte order of the full ID. This makes
/// `2_add` sort before `10_drop` even though byte order disagrees.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (numeric_prefix(a), numeric_prefix(b)) {
        (Some(na), Some(nb)) if na != nb => na.cmp(&nb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => a.cmp(b),
    }
}

/// One bookkeeping row: asserts that the named migration has been
/// forward-applied and not yet reversed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub applied_at: DateTime<Utc>,
}

impl Record {
    /// Create a record stamped with the current time.
    pub fn applied_now(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            applied_at: Utc::now(),
        }
    }
}

/// Which way a plan moves the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Lowercase label used in log and plan output.
    pub fn label(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

/// One step of a computed plan: a migration together with the statement
/// list and transaction flag chosen for the step's direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMigration {
    pub migration: Migration,
    pub queries: Vec<String>,
    pub disable_transaction: bool,
    pub direction: Direction,
}

impl PlannedMigration {
    /// Plan the migration's forward statements.
    pub fn forward(migration: &Migration) -> Self {
        Self {
            queries: migration.up.clone(),
            disable_transaction: migration.disable_transaction_up,
            direction: Direction::Up,
            migration: migration.clone(),
        }
    }

    /// Plan the migration's reverse statements.
    pub fn reverse(migration: &Migration) -> Self {
        Self {
            queries: migration.down.clone(),
            disable_transaction: migration.disable_transaction_down,
            direction: Direction::Down,
            migration: migration.clone(),
        }
    }

    /// The planned migration's ID.
    pub fn id(&self) -> &str {
        &self.migration.id
    }
}

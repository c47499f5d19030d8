//! Plan computation: which migrations run, in which order.
//!
//! The planner reconciles the declared set (from a source) with the
//! recorded set (from the database) and produces a totally ordered list
//! of steps. Histories reordered by merges are repaired by a catch-up
//! phase: declared-but-unrecorded migrations whose ID sorts below the
//! last recorded one are applied forward first, whatever direction was
//! requested.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::error::{MigrateError, MigrateResult};
use crate::migration::{compare_ids, Direction, Migration, PlannedMigration, Record};

/// Compute the ordered plan for `direction`, applying at most `limit`
/// primary steps. A `limit` of 0 means no limit; catch-up steps never
/// count against it.
///
/// `declared` must already be sorted by the canonical ID order, as every
/// [`crate::source::Source`] guarantees.
pub fn plan(
    declared: &[Migration],
    records: &[Record],
    direction: Direction,
    limit: usize,
) -> MigrateResult<Vec<PlannedMigration>> {
    for pair in declared.windows(2) {
        if pair[0].id == pair[1].id {
            return Err(MigrateError::plan(&pair[0].id, "duplicate migration id"));
        }
    }

    let declared_ids: HashSet<&str> = declared.iter().map(|m| m.id.as_str()).collect();

    // Every recorded migration must still be declared; migrating either
    // way over an unknown record would corrupt the history.
    let mut recorded: Vec<&Record> = records.iter().collect();
    recorded.sort_by(|a, b| compare_ids(&a.id, &b.id));
    for record in &recorded {
        if !declared_ids.contains(record.id.as_str()) {
            return Err(MigrateError::plan(&record.id, "unknown migration in database"));
        }
    }

    let recorded_ids: HashSet<&str> = recorded.iter().map(|r| r.id.as_str()).collect();
    let last = recorded.last().map(|r| r.id.as_str());

    let mut steps = Vec::new();

    // Catch-up: forward-apply declared migrations that sort below the
    // last recorded one but were never recorded themselves.
    if let Some(last) = last {
        for migration in declared {
            if !recorded_ids.contains(migration.id.as_str())
                && compare_ids(&migration.id, last) == Ordering::Less
            {
                steps.push(PlannedMigration::forward(migration));
            }
        }
    }

    let primary: Vec<&Migration> = match direction {
        Direction::Up => match last {
            Some(last) => declared
                .iter()
                .filter(|m| compare_ids(&m.id, last) == Ordering::Greater)
                .collect(),
            None => declared.iter().collect(),
        },
        Direction::Down => match last.and_then(|last| declared.iter().position(|m| m.id == last)) {
            Some(index) => declared[..=index].iter().rev().collect(),
            None => Vec::new(),
        },
    };

    let take = if limit > 0 && limit < primary.len() {
        limit
    } else {
        primary.len()
    };
    for migration in &primary[..take] {
        steps.push(match direction {
            Direction::Up => PlannedMigration::forward(migration),
            Direction::Down => PlannedMigration::reverse(migration),
        });
    }

    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;

    fn migration(id: &str) -> Migration {
        Migration {
            id: id.to_string(),
            up: vec!["SELECT 0;".to_string()],
            down: vec!["SELECT 1;".to_string()],
            ..Migration::default()
        }
    }

    fn record(id: &str) -> Record {
        Record {
            id: id.to_string(),
            applied_at: Utc::now(),
        }
    }

    fn ids(plan: &[PlannedMigration]) -> Vec<(&str, Direction)> {
        plan.iter().map(|p| (p.id(), p.direction)).collect()
    }

    #[test]
    fn fresh_database_applies_everything() {
        let declared = vec![migration("1"), migration("2")];
        let plan = plan(&declared, &[], Direction::Up, 0).unwrap();
        assert_eq!(
            ids(&plan),
            vec![("1", Direction::Up), ("2", Direction::Up)]
        );
    }

    #[test]
    fn up_applies_only_pending() {
        let declared = vec![migration("1"), migration("2"), migration("3")];
        let records = vec![record("1")];
        let plan = plan(&declared, &records, Direction::Up, 0).unwrap();
        assert_eq!(
            ids(&plan),
            vec![("2", Direction::Up), ("3", Direction::Up)]
        );
    }

    #[test]
    fn down_reverses_the_applied_prefix() {
        let declared = vec![migration("1"), migration("2"), migration("3")];
        let records = vec![record("1"), record("2"), record("3")];
        let plan = plan(&declared, &records, Direction::Down, 0).unwrap();
        assert_eq!(
            ids(&plan),
            vec![
                ("3", Direction::Down),
                ("2", Direction::Down),
                ("1", Direction::Down)
            ]
        );
    }

    #[test]
    fn down_on_empty_database_is_a_no_op() {
        let declared = vec![migration("1")];
        let plan = plan(&declared, &[], Direction::Down, 0).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn limit_truncates_the_primary_phase() {
        let declared = vec![migration("1"), migration("2"), migration("3")];
        let plan = plan(&declared, &[], Direction::Up, 2).unwrap();
        assert_eq!(
            ids(&plan),
            vec![("1", Direction::Up), ("2", Direction::Up)]
        );
    }

    #[test]
    fn holes_are_caught_up_before_the_primary_phase() {
        // 1 and 3 ran, then 2, 4 and 5 were merged in.
        let declared = vec![
            migration("1"),
            migration("2"),
            migration("3"),
            migration("4"),
            migration("5"),
        ];
        let records = vec![record("1"), record("3")];

        let up = plan(&declared, &records, Direction::Up, 0).unwrap();
        assert_eq!(
            ids(&up),
            vec![("2", Direction::Up), ("4", Direction::Up), ("5", Direction::Up)]
        );

        // catch-up precedes the reverse steps and is not counted against
        // the limit
        let down = plan(&declared, &records, Direction::Down, 1).unwrap();
        assert_eq!(
            ids(&down),
            vec![("2", Direction::Up), ("3", Direction::Down)]
        );

        let down2 = plan(&declared, &records, Direction::Down, 2).unwrap();
        assert_eq!(
            ids(&down2),
            vec![
                ("2", Direction::Up),
                ("3", Direction::Down),
                ("2", Direction::Down)
            ]
        );
    }

    #[test]
    fn catch_up_uses_forward_queries_and_flags() {
        let mut two = migration("2");
        two.disable_transaction_up = true;
        let declared = vec![migration("1"), two, migration("3")];
        let records = vec![record("1"), record("3")];

        let down = plan(&declared, &records, Direction::Down, 1).unwrap();
        assert_eq!(down[0].id(), "2");
        assert_eq!(down[0].queries, vec!["SELECT 0;"]);
        assert!(down[0].disable_transaction);
    }

    #[test]
    fn unknown_recorded_migration_fails_both_directions() {
        let declared = vec![migration("1_create.sql"), migration("2_alter.sql")];
        let records = vec![record("1_create.sql"), record("10_last.sql")];

        for direction in [Direction::Up, Direction::Down] {
            let err = plan(&declared, &records, direction, 0).unwrap_err();
            match err {
                MigrateError::Plan { id, message } => {
                    assert_eq!(id, "10_last.sql");
                    assert_eq!(message, "unknown migration in database");
                }
                other => panic!("expected plan error, got {other:?}"),
            }
        }
    }

    #[test]
    fn duplicate_declared_ids_fail() {
        let declared = vec![migration("1"), migration("1")];
        let err = plan(&declared, &[], Direction::Up, 0).unwrap_err();
        assert!(matches!(err, MigrateError::Plan { .. }));
    }

    #[test]
    fn ids_compare_numerically_when_planning() {
        // 10 sorts after 2, so only 10 is pending
        let declared = vec![migration("2_a"), migration("10_b")];
        let records = vec![record("2_a")];
        let plan = plan(&declared, &records, Direction::Up, 0).unwrap();
        assert_eq!(ids(&plan), vec![("10_b", Direction::Up)]);
    }
}

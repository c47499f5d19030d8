//! End-to-end tests against in-memory SQLite databases.

use std::fs;

use sqlx::SqlitePool;
use tempfile::TempDir;

use strata::{
    Direction, Driver, FileSource, MemorySource, MigrateError, Migration, Migrator, SqliteDriver,
};

fn base_migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "123".to_string(),
            up: vec!["CREATE TABLE people (id int)".to_string()],
            down: vec!["DROP TABLE people".to_string()],
            ..Migration::default()
        },
        Migration {
            id: "124".to_string(),
            up: vec!["ALTER TABLE people ADD COLUMN first_name text".to_string()],
            down: vec!["SELECT 0".to_string()],
            ..Migration::default()
        },
    ]
}

async fn memory_migrator(table: &str) -> (Migrator, SqlitePool) {
    let driver = SqliteDriver::connect(":memory:", table).await.unwrap();
    driver.ensure_record_table().await.unwrap();
    let pool = driver.pool().clone();
    (Migrator::new(Box::new(driver)), pool)
}

async fn count(pool: &SqlitePool, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(pool).await.unwrap()
}

fn write_test_migrations(dir: &TempDir) {
    fs::write(
        dir.path().join("1_initial.sql"),
        "-- +migrate Up\nCREATE TABLE people (id int);\n\n-- +migrate Down\nDROP TABLE people;\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("2_record.sql"),
        "-- +migrate Up\nINSERT INTO people (id) VALUES (1);\n\n-- +migrate Down\nDELETE FROM people;\n",
    )
    .unwrap();
}

#[tokio::test]
async fn applies_a_single_migration_once() {
    let (migrator, pool) = memory_migrator("migration").await;
    let source = MemorySource::new(base_migrations()[..1].to_vec());

    let applied = migrator.exec(&source, Direction::Up).await.unwrap();
    assert_eq!(applied, 1);

    // the table exists now
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM people").await, 0);

    // a second run has nothing to do
    let applied = migrator.exec(&source, Direction::Up).await.unwrap();
    assert_eq!(applied, 0);
}

#[tokio::test]
async fn bookkeeping_table_name_is_escaped() {
    let (migrator, _pool) = memory_migrator("my migrations").await;
    let source = MemorySource::new(base_migrations()[..1].to_vec());

    let applied = migrator.exec(&source, Direction::Up).await.unwrap();
    assert_eq!(applied, 1);

    let records = migrator.records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "123");
}

#[tokio::test]
async fn applies_migrations_in_order() {
    let (migrator, pool) = memory_migrator("migration").await;
    let source = MemorySource::new(base_migrations());

    let applied = migrator.exec(&source, Direction::Up).await.unwrap();
    assert_eq!(applied, 2);

    // the column added by the second migration is usable
    assert_eq!(count(&pool, "SELECT COUNT(first_name) FROM people").await, 0);

    let ids: Vec<_> = migrator
        .records()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["123", "124"]);
}

#[tokio::test]
async fn applies_new_migrations_incrementally() {
    let (migrator, _pool) = memory_migrator("migration").await;

    let source = MemorySource::new(base_migrations()[..1].to_vec());
    assert_eq!(migrator.exec(&source, Direction::Up).await.unwrap(), 1);

    let source = MemorySource::new(base_migrations());
    assert_eq!(migrator.exec(&source, Direction::Up).await.unwrap(), 1);
}

#[tokio::test]
async fn file_source_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_test_migrations(&dir);

    let (migrator, pool) = memory_migrator("migration").await;
    let source = FileSource::new(dir.path());

    let applied = migrator.exec(&source, Direction::Up).await.unwrap();
    assert_eq!(applied, 2);

    let id: i64 = sqlx::query_scalar("SELECT id FROM people")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(id, 1);
}

#[tokio::test]
async fn limit_stops_after_n_migrations() {
    let dir = TempDir::new().unwrap();
    write_test_migrations(&dir);

    let (migrator, pool) = memory_migrator("migration").await;
    let source = FileSource::new(dir.path());

    let applied = migrator.exec_max(&source, Direction::Up, 1).await.unwrap();
    assert_eq!(applied, 1);

    // only the table was created, the seed row was not inserted
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM people").await, 0);
}

#[tokio::test]
async fn down_unwinds_step_by_step() {
    let dir = TempDir::new().unwrap();
    write_test_migrations(&dir);

    let (migrator, pool) = memory_migrator("migration").await;
    let source = FileSource::new(dir.path());

    assert_eq!(migrator.exec(&source, Direction::Up).await.unwrap(), 2);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM people").await, 1);

    // undo the seed row
    assert_eq!(
        migrator.exec_max(&source, Direction::Down, 1).await.unwrap(),
        1
    );
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM people").await, 0);

    // undo the table
    assert_eq!(
        migrator.exec_max(&source, Direction::Down, 1).await.unwrap(),
        1
    );
    assert!(sqlx::query("SELECT COUNT(*) FROM people")
        .fetch_one(&pool)
        .await
        .is_err());

    // nothing left to do
    assert_eq!(
        migrator.exec_max(&source, Direction::Down, 1).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn down_without_limit_unwinds_everything() {
    let dir = TempDir::new().unwrap();
    write_test_migrations(&dir);

    let (migrator, pool) = memory_migrator("migration").await;
    let source = FileSource::new(dir.path());

    assert_eq!(migrator.exec(&source, Direction::Up).await.unwrap(), 2);
    assert_eq!(migrator.exec(&source, Direction::Down).await.unwrap(), 2);

    assert!(sqlx::query("SELECT COUNT(*) FROM people")
        .fetch_one(&pool)
        .await
        .is_err());
    assert!(migrator.records().await.unwrap().is_empty());

    assert_eq!(migrator.exec(&source, Direction::Down).await.unwrap(), 0);
}

#[tokio::test]
async fn failing_step_rolls_back_and_reports_prior_count() {
    let (migrator, pool) = memory_migrator("migration").await;
    let mut migrations = base_migrations();
    migrations.push(Migration {
        id: "125".to_string(),
        up: vec![
            "INSERT INTO people (id, first_name) VALUES (1, 'Test')".to_string(),
            "SELECT fail".to_string(),
        ],
        down: vec![],
        ..Migration::default()
    });
    let source = MemorySource::new(migrations);

    let err = migrator.exec(&source, Direction::Up).await.unwrap_err();
    match err {
        MigrateError::Tx { id, applied, .. } => {
            assert_eq!(id, "125");
            assert_eq!(applied, 2);
        }
        other => panic!("expected tx error, got {other:?}"),
    }

    // the failing step's INSERT was rolled back
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM people").await, 0);
    assert_eq!(migrator.records().await.unwrap().len(), 2);
}

#[tokio::test]
async fn no_transaction_steps_leave_partial_effects() {
    let (migrator, pool) = memory_migrator("migration").await;
    let source = MemorySource::new(vec![Migration {
        id: "1_no_tx".to_string(),
        up: vec![
            "CREATE TABLE audit (id int)".to_string(),
            "SELECT fail".to_string(),
        ],
        down: vec![],
        disable_transaction_up: true,
        ..Migration::default()
    }]);

    let err = migrator.exec(&source, Direction::Up).await.unwrap_err();
    match err {
        MigrateError::Tx { applied, .. } => assert_eq!(applied, 0),
        other => panic!("expected tx error, got {other:?}"),
    }

    // the statement before the failure stuck; the caller opted out of
    // rollback
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM audit").await, 0);
    assert!(migrator.records().await.unwrap().is_empty());
}

#[tokio::test]
async fn skip_records_without_executing() {
    let (migrator, pool) = memory_migrator("migration").await;
    let source = MemorySource::new(vec![
        Migration {
            id: "1_create_table.sql".to_string(),
            up: vec!["CREATE TABLE people (id int)".to_string()],
            down: vec!["DROP TABLE people".to_string()],
            ..Migration::default()
        },
        Migration {
            id: "2_alter_table.sql".to_string(),
            up: vec!["ALTER TABLE people ADD COLUMN first_name text".to_string()],
            down: vec!["SELECT 0".to_string()],
            ..Migration::default()
        },
        Migration {
            id: "10_add_last_name.sql".to_string(),
            up: vec!["ALTER TABLE people ADD COLUMN last_name text".to_string()],
            down: vec!["ALTER TABLE people DROP COLUMN last_name".to_string()],
            ..Migration::default()
        },
    ]);

    let skipped = migrator.skip_max(&source, Direction::Up, 0).await.unwrap();
    assert_eq!(skipped, 3);

    // nothing actually ran
    assert!(sqlx::query("SELECT COUNT(*) FROM people")
        .fetch_one(&pool)
        .await
        .is_err());

    // but the database level is pegged
    assert_eq!(migrator.exec(&source, Direction::Up).await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_recorded_migration_refuses_to_run() {
    let (migrator, pool) = memory_migrator("migration").await;

    let source = MemorySource::new(base_migrations());
    assert_eq!(migrator.exec(&source, Direction::Up).await.unwrap(), 2);

    // redeclare with 124 replaced; the recorded 124 is now unknown
    let source = MemorySource::new(vec![
        base_migrations()[0].clone(),
        Migration {
            id: "124_other".to_string(),
            up: vec!["ALTER TABLE people ADD COLUMN middle_name text".to_string()],
            down: vec!["ALTER TABLE people DROP COLUMN middle_name".to_string()],
            ..Migration::default()
        },
        Migration {
            id: "125".to_string(),
            up: vec!["ALTER TABLE people ADD COLUMN age int".to_string()],
            down: vec!["ALTER TABLE people DROP COLUMN age".to_string()],
            ..Migration::default()
        },
    ]);

    for direction in [Direction::Up, Direction::Down] {
        let err = migrator.exec(&source, direction).await.unwrap_err();
        match err {
            MigrateError::Plan { id, message } => {
                assert_eq!(id, "124");
                assert_eq!(message, "unknown migration in database");
            }
            other => panic!("expected plan error, got {other:?}"),
        }
    }

    // nothing was applied
    assert!(sqlx::query("SELECT middle_name FROM people")
        .fetch_one(&pool)
        .await
        .is_err());
    assert!(sqlx::query("SELECT age FROM people")
        .fetch_one(&pool)
        .await
        .is_err());
}

#[tokio::test]
async fn merge_holes_are_caught_up_on_the_way_up() {
    let (migrator, _pool) = memory_migrator("migration").await;

    let select = |sql: &str| vec![sql.to_string()];
    let mig = |id: &str| Migration {
        id: id.to_string(),
        up: select("SELECT 0"),
        down: select("SELECT 1"),
        ..Migration::default()
    };

    let source = MemorySource::new(vec![mig("1"), mig("3")]);
    assert_eq!(migrator.exec(&source, Direction::Up).await.unwrap(), 2);

    let source = MemorySource::new(vec![mig("1"), mig("2"), mig("3"), mig("4"), mig("5")]);

    let plan = migrator.plan(&source, Direction::Up, 0).await.unwrap();
    let ids: Vec<_> = plan.iter().map(|p| p.id().to_string()).collect();
    assert_eq!(ids, vec!["2", "4", "5"]);

    let plan = migrator.plan(&source, Direction::Down, 1).await.unwrap();
    let steps: Vec<_> = plan
        .iter()
        .map(|p| (p.id().to_string(), p.direction))
        .collect();
    assert_eq!(
        steps,
        vec![
            ("2".to_string(), Direction::Up),
            ("3".to_string(), Direction::Down)
        ]
    );

    assert_eq!(migrator.exec(&source, Direction::Up).await.unwrap(), 3);
    let ids: Vec<_> = migrator
        .records()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
}

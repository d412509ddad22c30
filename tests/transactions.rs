use std::sync::Arc;

use sql_template::prelude::*;
use sql_template::testing::{FaultPlan, OpLog, RecordedOp, SpyDataSource};

type SpyTemplate = SqlTemplate<SpyDataSource<SqliteDataSource>>;

fn setup(name: &str) -> (SpyTemplate, OpLog, Arc<FaultPlan>) {
    let ds = SqliteDataSource::new(SqliteOptions::in_memory(name)).unwrap();
    let conn = ds.connection().unwrap();
    conn.prepare(
        "CREATE TABLE ledger (id INTEGER PRIMARY KEY AUTOINCREMENT, amount INTEGER)",
        None,
    )
    .unwrap()
    .execute_update()
    .unwrap();
    drop(conn);

    let spy = SpyDataSource::new(ds);
    let log = spy.log();
    let faults = spy.faults();
    (SqlTemplate::new(spy), log, faults)
}

fn deposit(tx: &Transaction<'_>, amount: i64) -> Result<(), SqlTemplateError> {
    tx.execute_insert("INSERT INTO ledger (amount) VALUES (:amount;)", |stmt| {
        stmt.set("amount", amount)
    })
}

fn balance(db: &SpyTemplate) -> i64 {
    db.fetch_single_record(
        "SELECT COALESCE(SUM(amount), 0) FROM ledger",
        |row, _| row.get(0),
        |_| Ok(()),
    )
    .unwrap()
    .and_then(|v| v.as_int())
    .unwrap()
}

#[test]
fn nested_scopes_share_one_connection_and_commit_once() {
    let (db, log, _faults) = setup("tx_nested_commit");
    let mut ctx = TransactionContext::new();

    db.with_transaction(&mut ctx, |tx| {
        deposit(tx, 1)?;
        tx.with_transaction(|tx| {
            deposit(tx, 2)?;
            tx.with_transaction(|tx| {
                assert_eq!(tx.depth(), 3);
                deposit(tx, 3)
            })
        })
    })
    .unwrap();

    assert_eq!(log.connects(), 1);
    assert_eq!(log.commits(), 1);
    assert_eq!(log.rollbacks(), 0);
    assert!(!ctx.in_transaction());
    assert_eq!(balance(&db), 6);
}

#[test]
fn inner_failure_rolls_back_the_whole_scope() {
    let (db, log, _faults) = setup("tx_rollback");
    let mut ctx = TransactionContext::new();

    let result: Result<(), _> = db.with_transaction(&mut ctx, |tx| {
        deposit(tx, 10)?;
        tx.with_transaction(|_tx| Err::<(), _>(SqlTemplateError::GeneratedKeyMissing))
    });

    assert!(matches!(
        result,
        Err(SqlTemplateError::Transaction {
            stage: TransactionStage::Commit,
            ..
        })
    ));
    assert_eq!(log.commits(), 0);
    assert_eq!(log.rollbacks(), 1);
    assert!(!ctx.in_transaction());
    assert_eq!(balance(&db), 0);
}

#[test]
fn autocommit_mode_is_restored_before_release() {
    let (db, log, _faults) = setup("tx_autocommit");
    let mut ctx = TransactionContext::new();
    db.with_transaction(&mut ctx, |tx| deposit(tx, 1)).unwrap();

    let tail: Vec<RecordedOp> = log
        .snapshot()
        .into_iter()
        .filter(|op| {
            !matches!(op, RecordedOp::Prepare { .. } | RecordedOp::Connect)
        })
        .collect();
    assert_eq!(
        tail,
        vec![
            RecordedOp::SetAutoCommit(false),
            RecordedOp::Commit,
            RecordedOp::SetAutoCommit(true),
            RecordedOp::Close,
        ]
    );
}

#[test]
fn scope_reads_its_own_uncommitted_writes() {
    let (db, _log, _faults) = setup("tx_read_own_writes");
    let mut ctx = TransactionContext::new();

    db.with_transaction(&mut ctx, |tx| {
        deposit(tx, 5)?;
        let seen = tx.fetch_single_record(
            "SELECT amount FROM ledger WHERE amount = :amount;",
            |row, _| row.get(0),
            |stmt| stmt.set("amount", 5i64),
        )?;
        assert_eq!(seen, Some(SqlValue::Int(5)));

        let affected = tx.execute_simple_update("UPDATE ledger SET amount = amount + 1")?;
        assert_eq!(affected, 1);
        Ok(())
    })
    .unwrap();

    assert_eq!(balance(&db), 6);
}

#[test]
fn failed_connection_acquisition_is_tagged() {
    let (db, _log, faults) = setup("tx_acquire_fail");
    faults.fail_connect();
    let mut ctx = TransactionContext::new();

    let result = db.with_transaction(&mut ctx, |tx| deposit(tx, 1));
    assert!(matches!(
        result,
        Err(SqlTemplateError::Transaction {
            stage: TransactionStage::Acquire,
            ..
        })
    ));
    assert!(!ctx.in_transaction());
}

#[test]
fn failed_commit_is_tagged() {
    let (db, _log, faults) = setup("tx_commit_fail");
    faults.fail_commit();
    let mut ctx = TransactionContext::new();

    let result = db.with_transaction(&mut ctx, |tx| deposit(tx, 1));
    assert!(matches!(
        result,
        Err(SqlTemplateError::Transaction {
            stage: TransactionStage::Commit,
            ..
        })
    ));
    assert!(!ctx.in_transaction());
}

#[test]
fn failed_rollback_supersedes_the_work_error() {
    let (db, _log, faults) = setup("tx_rollback_fail");
    faults.fail_rollback();
    let mut ctx = TransactionContext::new();

    let result: Result<(), _> = db.with_transaction(&mut ctx, |_tx| {
        Err(SqlTemplateError::GeneratedKeyMissing)
    });
    assert!(matches!(
        result,
        Err(SqlTemplateError::Transaction {
            stage: TransactionStage::Rollback,
            ..
        })
    ));
    assert!(!ctx.in_transaction());
}

#[test]
fn failed_release_supersedes_a_successful_commit() {
    let (db, _log, faults) = setup("tx_close_fail");
    faults.fail_close();
    let mut ctx = TransactionContext::new();

    let result = db.with_transaction(&mut ctx, |tx| deposit(tx, 1));
    assert!(matches!(
        result,
        Err(SqlTemplateError::Transaction {
            stage: TransactionStage::Close,
            ..
        })
    ));
    assert!(!ctx.in_transaction());
}

#[test]
fn work_errors_carry_the_commit_stage_code() {
    let (db, _log, _faults) = setup("tx_error_code");
    let mut ctx = TransactionContext::new();
    let err = db
        .with_transaction(&mut ctx, |_tx| {
            Err::<(), _>(SqlTemplateError::GeneratedKeyMissing)
        })
        .unwrap_err();
    assert!(err.to_string().contains("10006"));
}

#[test]
fn context_is_reusable_after_a_failed_scope() {
    let (db, log, _faults) = setup("tx_reuse");
    let mut ctx = TransactionContext::new();

    let _ = db.with_transaction(&mut ctx, |_tx| {
        Err::<(), _>(SqlTemplateError::GeneratedKeyMissing)
    });
    db.with_transaction(&mut ctx, |tx| deposit(tx, 4)).unwrap();

    assert_eq!(log.commits(), 1);
    assert_eq!(log.rollbacks(), 1);
    assert_eq!(balance(&db), 4);
}

#[test]
fn generated_keys_work_inside_a_scope() {
    let (db, _log, _faults) = setup("tx_keys");
    let mut ctx = TransactionContext::new();

    let id = db
        .with_transaction(&mut ctx, |tx| {
            tx.execute_insert_returning_id(
                "INSERT INTO ledger (amount) VALUES (:amount;)",
                |stmt| stmt.set("amount", 8i64),
                "id",
            )
        })
        .unwrap();
    assert_eq!(id, 1);
    assert_eq!(balance(&db), 8);
}

#[test]
fn batch_insert_inside_a_scope_commits_with_it() {
    let (db, log, _faults) = setup("tx_batch");
    let mut ctx = TransactionContext::new();

    let counts = db
        .with_transaction(&mut ctx, |tx| {
            tx.execute_batch_insert(
                "INSERT INTO ledger (amount) VALUES (:amount;)",
                |stmt| {
                    for amount in [1i64, 2, 3] {
                        stmt.set("amount", amount)?;
                        stmt.add_batch()?;
                    }
                    Ok(())
                },
            )
        })
        .unwrap();
    assert_eq!(counts, vec![1, 1, 1]);
    assert_eq!(log.commits(), 1);
    assert_eq!(balance(&db), 6);
}

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use myriad_mysql::{Database, Error, Pool, Result};

mod support;

use support::MockServer;

fn drive_to_completion(db: &mut Database) -> Result<()> {
    while !db.drive()? {
        thread::sleep(Duration::from_millis(2));
    }

    Ok(())
}

#[test]
fn select_one_row() {
    let server = MockServer::spawn();
    let pool = Pool::new(&server.url("")).unwrap();

    let mut db = pool.db().unwrap();
    let mut results = db.query("SELECT 1").unwrap();

    assert_eq!(results.column_names(), ["1"]);
    assert_eq!(results.rows(), 1);

    let row = results.array().unwrap();
    assert_eq!(row.get(0), Some("1"));
    assert!(results.array().is_none());
}

#[test]
fn insert_reports_terminal_metadata() {
    let server = MockServer::spawn();
    let pool = Pool::new(&server.url("")).unwrap();

    let mut db = pool.db().unwrap();
    let results = db.query("INSERT INTO t (name) VALUES ('x')").unwrap();

    assert_eq!(results.affected_rows(), 1);
    assert!(results.last_insert_id() > 0);
    assert_eq!(results.warnings_count(), 0);
}

#[test]
fn multi_statement_queries_produce_multiple_sets() {
    let server = MockServer::spawn();
    let pool = Pool::new(&server.url("?multi_statements=1")).unwrap();

    let mut db = pool.db().unwrap();
    let mut results = db.query("SELECT 1; SELECT 2").unwrap();

    assert_eq!(results.set_count(), 2);

    assert_eq!(results.column_names(), ["1"]);
    assert_eq!(results.array().unwrap().get(0), Some("1"));

    assert!(results.next_set());
    assert_eq!(results.column_names(), ["2"]);
    assert_eq!(results.array().unwrap().get(0), Some("2"));
}

#[test]
fn server_errors_leave_the_connection_usable() {
    let server = MockServer::spawn();
    let pool = Pool::new(&server.url("")).unwrap();

    let mut db = pool.db().unwrap();

    match db.query("SELECT * FROM nonexistent") {
        Err(Error::Server(error)) => {
            assert_eq!(error.sql_state, "42S02");
            assert!(!error.message.is_empty());
        }
        other => panic!("expected a server error, got {:?}", other),
    }

    // recoverable: the same connection answers the next query
    assert!(db.ping());
    let results = db.query("SELECT 1").unwrap();
    assert_eq!(results.rows(), 1);
}

#[test]
fn parameters_are_expanded_client_side() {
    let server = MockServer::spawn();
    let pool = Pool::new(&server.url("")).unwrap();

    let mut db = pool.db().unwrap();

    // the mock answers any INSERT; what matters is that expansion produced
    // well-formed SQL and the round trip completed
    let results = db
        .query_with("INSERT INTO t (name) VALUES (?)", &[Some("o'brien")])
        .unwrap();

    assert_eq!(results.affected_rows(), 1);
}

#[test]
fn callback_queries_complete_in_submission_order() {
    let server = MockServer::spawn();
    let pool = Pool::new(&server.url("")).unwrap();

    let mut db = pool.db().unwrap();
    let finished: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

    let order = Rc::clone(&finished);
    db.query_callback("SELECT SLEEP(0.15)", &[], move |error, _| {
        assert!(error.is_none());
        order.borrow_mut().push("first");
    })
    .unwrap();

    let order = Rc::clone(&finished);
    db.query_callback("SELECT SLEEP(0.15)", &[], move |error, _| {
        assert!(error.is_none());
        order.borrow_mut().push("second");
    })
    .unwrap();

    assert_eq!(db.backlog(), 1);

    let started = Instant::now();
    drive_to_completion(&mut db).unwrap();

    // the second query only starts once the first completed
    assert_eq!(*finished.borrow(), ["first", "second"]);
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[test]
fn databases_from_one_pool_run_concurrently() {
    let server = MockServer::spawn();
    let pool = Pool::new(&server.url("")).unwrap();

    let mut first = pool.db().unwrap();
    let mut second = pool.db().unwrap();

    let completed = Rc::new(RefCell::new(0));

    let count = Rc::clone(&completed);
    first
        .query_callback("SELECT SLEEP(0.3)", &[], move |error, _| {
            assert!(error.is_none());
            *count.borrow_mut() += 1;
        })
        .unwrap();

    let count = Rc::clone(&completed);
    second
        .query_callback("SELECT SLEEP(0.3)", &[], move |error, _| {
            assert!(error.is_none());
            *count.borrow_mut() += 1;
        })
        .unwrap();

    let started = Instant::now();
    let mut first_done = false;
    let mut second_done = false;

    while !(first_done && second_done) {
        first_done = first.drive().unwrap();
        second_done = second.drive().unwrap();
        thread::sleep(Duration::from_millis(2));
    }

    // both slept for 300ms in roughly overlapping wall-clock intervals
    assert_eq!(*completed.borrow(), 2);
    assert!(started.elapsed() < Duration::from_millis(550));
}

#[test]
fn dropped_databases_return_their_connection_to_the_pool() {
    let server = MockServer::spawn();
    let pool = Pool::new(&server.url("")).unwrap();

    let mut db = pool.db().unwrap();
    db.query("SELECT 1").unwrap();
    let first_id = db.connection_id();
    drop(db);

    assert_eq!(pool.idle_count(), 1);

    let mut db = pool.db().unwrap();
    db.query("SELECT 2").unwrap();

    assert_eq!(db.connection_id(), first_id);
    assert_eq!(server.connection_count(), 1);
}

#[test]
fn disconnect_surfaces_a_network_error_to_callbacks() {
    let server = MockServer::spawn();
    let pool = Pool::new(&server.url("")).unwrap();

    let mut db = pool.db().unwrap();

    let failed = Rc::new(RefCell::new(false));
    let seen = Rc::clone(&failed);

    db.query_callback("SELECT SLEEP(5)", &[], move |error, _| {
        assert!(matches!(error, Some(Error::Network(_))));
        *seen.borrow_mut() = true;
    })
    .unwrap();

    db.disconnect();

    assert!(*failed.borrow());
}

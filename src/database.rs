use std::collections::VecDeque;
use std::fmt::{self, Debug, Formatter};
use std::mem;
use std::sync::{Mutex, Weak};

use crate::connection::{Connection, ProtocolEvent};
use crate::error::{Error, Result};
use crate::pool::{self, PoolInner};
use crate::protocol::Status;
use crate::results::Results;
use crate::sql;
use crate::transaction::Transaction;

type QueryCallback = Box<dyn FnOnce(Option<Error>, Results) + 'static>;

/// One queued query and everything accumulated for it so far.
struct PendingQuery {
    sql: String,
    callback: Option<QueryCallback>,
    started: bool,
    results: Results,
}

/// A database handle: exclusive owner of one [`Connection`] for its
/// lifetime, serializing queries through a FIFO waiting list.
///
/// Blocking submission ([`query`]) drives the connection to the terminal
/// event before returning. Callback submission ([`query_callback`]) returns
/// immediately; queued queries are advanced by [`drive`], invoked from
/// whatever readiness loop watches the socket, and their callbacks fire in
/// submission order.
///
/// Dropping the handle returns a healthy connection to its [`Pool`].
///
/// [`query`]: Database::query
/// [`query_callback`]: Database::query_callback
/// [`drive`]: Database::drive
/// [`Pool`]: crate::Pool
pub struct Database {
    connection: Option<Connection>,
    pool: Weak<Mutex<PoolInner>>,
    waiting: VecDeque<PendingQuery>,
}

impl Debug for Database {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("connection", &self.connection)
            .field("waiting", &self.waiting.len())
            .finish()
    }
}

impl Database {
    pub(crate) fn new(connection: Connection, pool: Weak<Mutex<PoolInner>>) -> Self {
        Self { connection: Some(connection), pool, waiting: VecDeque::new() }
    }

    /// Execute a statement, blocking until its results are complete.
    pub fn query(&mut self, sql: &str) -> Result<Results> {
        self.query_with(sql, &[])
    }

    /// Execute a statement with `?` placeholders substituted by position.
    ///
    /// A `None` argument becomes SQL `NULL`. Fails with [`Error::Busy`]
    /// while callback queries are pending, and with [`Error::Server`] when
    /// the server rejects the statement.
    pub fn query_with(&mut self, sql: &str, args: &[Option<&str>]) -> Result<Results> {
        let sql = sql::expand_sql(sql, args)?;

        if !self.waiting.is_empty() {
            return Err(Error::Busy);
        }

        let connection = match self.connection.as_mut() {
            Some(connection) => connection,
            None => return Err(Error::closed()),
        };

        connection.query(&sql)?;
        let driven = connection.drive_blocking();

        let mut results = Results::new();
        while let Some(event) = connection.poll_event() {
            results.apply(event);
        }

        driven?;

        if let Some(error) = results.take_error() {
            return Err(Error::Server(error));
        }

        Ok(results)
    }

    /// Queue a statement; `callback` fires with `(error, results)` once the
    /// query completes. Queued queries run strictly in submission order.
    ///
    /// On failure the callback's `results` still carries the server's error
    /// fields.
    pub fn query_callback<F>(&mut self, sql: &str, args: &[Option<&str>], callback: F) -> Result<()>
    where
        F: FnOnce(Option<Error>, Results) + 'static,
    {
        let sql = sql::expand_sql(sql, args)?;

        if self.connection.is_none() {
            return Err(Error::closed());
        }

        self.waiting.push_back(PendingQuery {
            sql,
            callback: Some(Box::new(callback)),
            started: false,
            results: Results::new(),
        });

        // idle queue: this query starts immediately
        if self.waiting.len() == 1 {
            self.start_next();
        }

        Ok(())
    }

    /// Pump the connection without blocking: interpret whatever packets are
    /// ready, fill in the head query's results, and dispatch completed
    /// callbacks. Returns `Ok(true)` once the waiting list is empty.
    pub fn drive(&mut self) -> Result<bool> {
        if self.waiting.is_empty() {
            return Ok(true);
        }

        let connection = match self.connection.as_mut() {
            Some(connection) => connection,
            None => {
                self.fail_all(Error::closed());
                return Err(Error::closed());
            }
        };

        let step = connection.drive();
        self.dispatch_events();

        match step {
            Ok(_) => Ok(self.waiting.is_empty()),

            Err(error) => {
                self.fail_all(error);
                Err(Error::closed())
            }
        }
    }

    /// Route queued connection events into the head descriptor, completing
    /// it (and starting the next) on a terminal event.
    fn dispatch_events(&mut self) {
        loop {
            let event = match self.connection.as_mut().and_then(Connection::poll_event) {
                Some(event) => event,
                None => return,
            };

            let terminal = match &event {
                ProtocolEvent::End(end) => !end.status.contains(Status::MORE_RESULTS_EXISTS),
                ProtocolEvent::ServerError(_) => true,
                _ => false,
            };

            if let Some(head) = self.waiting.front_mut() {
                head.results.apply(event);
            }

            if terminal {
                self.complete_head();
            }
        }
    }

    fn complete_head(&mut self) {
        if let Some(mut head) = self.waiting.pop_front() {
            let error = head.results.server_error().cloned().map(Error::Server);
            let results = mem::take(&mut head.results);

            if let Some(callback) = head.callback.take() {
                callback(error, results);
            }
        }

        self.start_next();
    }

    /// Mark the head as started and send its statement. A send failure
    /// completes that query with the error and tries the next.
    fn start_next(&mut self) {
        loop {
            let (sent, error) = {
                let head = match self.waiting.front_mut() {
                    Some(head) => head,
                    None => return,
                };

                head.started = true;

                let connection = match self.connection.as_mut() {
                    Some(connection) => connection,
                    None => return,
                };

                match connection.query(&head.sql) {
                    Ok(()) => (true, None),
                    Err(error) => (false, Some(error)),
                }
            };

            if sent {
                return;
            }

            if let Some(mut head) = self.waiting.pop_front() {
                let results = mem::take(&mut head.results);

                if let Some(callback) = head.callback.take() {
                    callback(error, results);
                }
            }
        }
    }

    /// Complete every queued query with a failure; the first gets `error`,
    /// the rest a closed-connection error.
    fn fail_all(&mut self, error: Error) {
        let mut error = Some(error);

        while let Some(mut head) = self.waiting.pop_front() {
            let results = mem::take(&mut head.results);

            if let Some(callback) = head.callback.take() {
                callback(Some(error.take().unwrap_or_else(Error::closed)), results);
            }
        }
    }

    /// Queries queued behind the one currently executing.
    pub fn backlog(&self) -> usize {
        self.waiting.iter().filter(|pending| !pending.started).count()
    }

    /// Open a transaction: `START TRANSACTION` followed by
    /// `SET autocommit=0`.
    ///
    /// The returned [`Transaction`] is a marker over this handle; the
    /// caller resolves the transaction by issuing `COMMIT` or `ROLLBACK`
    /// (and restoring `autocommit=1`) through [`query`].
    ///
    /// Fails with [`Error::State`] when a transaction is already active.
    ///
    /// [`query`]: Database::query
    pub fn begin(&mut self) -> Result<Transaction<'_>> {
        let connection = match self.connection.as_ref() {
            Some(connection) => connection,
            None => return Err(Error::closed()),
        };

        if connection.status().contains(Status::IN_TRANS) {
            return Err(Error::State("a transaction is already active on this connection"));
        }

        self.query("START TRANSACTION")?;
        self.query("SET autocommit=0")?;

        Ok(Transaction::new(self))
    }

    /// Check connection liveness with COM_PING.
    pub fn ping(&mut self) -> bool {
        self.connection.as_mut().map_or(false, Connection::ping)
    }

    /// Terminate the connection. Any in-flight or queued callback query
    /// completes with a network error.
    pub fn disconnect(&mut self) {
        self.fail_all(Error::closed());

        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
    }

    /// Thread id of this session on the server.
    pub fn connection_id(&self) -> u32 {
        self.connection.as_ref().map_or(0, Connection::connection_id)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.fail_all(Error::closed());

        if let Some(mut connection) = self.connection.take() {
            if let Some(inner) = self.pool.upgrade() {
                if connection.ping() {
                    pool::enqueue(&inner, connection);
                    return;
                }
            }

            connection.close();
        }
    }
}

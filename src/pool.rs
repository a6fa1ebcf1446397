use std::collections::VecDeque;
use std::fmt::{self, Debug, Formatter};
use std::process;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::connection::Connection;
use crate::database::Database;
use crate::error::Result;
use crate::options::ConnectOptions;

type ConnectionHook = Box<dyn Fn(&mut Connection) + Send + 'static>;

pub(crate) struct PoolInner {
    pub(crate) options: ConnectOptions,
    pub(crate) owner_pid: u32,
    pub(crate) idle: VecDeque<Connection>,
    pub(crate) max_connections: usize,
    pub(crate) on_connection: Option<ConnectionHook>,
}

/// A per-process cache of idle [`Connection`]s, and the entry point of the
/// crate.
///
/// [`db`] hands out [`Database`] handles backed by a recycled connection
/// when a healthy one is cached, or a freshly established one otherwise.
/// Dropping a `Database` returns its connection here, capped at
/// [`max_connections`]; unhealthy connections are discarded instead.
///
/// The cache is keyed to the process that filled it: after a fork the child
/// observes the foreign process id and clears the inherited entries without
/// sending COM_QUIT (the parent still owns those sockets).
///
/// [`db`]: Pool::db
/// [`max_connections`]: Pool::max_connections
#[derive(Clone)]
pub struct Pool {
    inner: Arc<Mutex<PoolInner>>,
}

impl Debug for Pool {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);

        f.debug_struct("Pool")
            .field("idle", &inner.idle.len())
            .field("max_connections", &inner.max_connections)
            .finish_non_exhaustive()
    }
}

fn lock(inner: &Mutex<PoolInner>) -> MutexGuard<'_, PoolInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Pool {
    /// Build a pool from a connection URL. No connection is opened until
    /// [`db`] is first called.
    ///
    /// [`db`]: Pool::db
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self::with_options(ConnectOptions::parse(url)?))
    }

    pub fn with_options(options: ConnectOptions) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolInner {
                options,
                owner_pid: process::id(),
                idle: VecDeque::new(),
                max_connections: 5,
                on_connection: None,
            })),
        }
    }

    /// Lease a connection as a [`Database`] handle.
    ///
    /// Cached connections are health-checked with a ping before reuse; dead
    /// ones are discarded silently.
    pub fn db(&self) -> Result<Database> {
        let (options, recycled) = {
            let mut inner = lock(&self.inner);

            reset_if_forked(&mut inner);

            let mut recycled = None;
            while let Some(mut connection) = inner.idle.pop_front() {
                if connection.ping() {
                    recycled = Some(connection);
                    break;
                }

                log::debug!("conn={} dropped from cache: ping failed", connection.connection_id());
            }

            (inner.options.clone(), recycled)
        };

        let connection = match recycled {
            Some(connection) => connection,

            None => {
                // connect without holding the cache lock
                let mut connection = Connection::connect(&options)?;

                if let Some(hook) = &lock(&self.inner).on_connection {
                    hook(&mut connection);
                }

                connection
            }
        };

        Ok(Database::new(connection, Arc::downgrade(&self.inner)))
    }

    /// Cache cap; connections returned beyond it evict the oldest cached
    /// entry. Zero disables caching entirely. Defaults to 5.
    pub fn max_connections(&self) -> usize {
        lock(&self.inner).max_connections
    }

    pub fn set_max_connections(&self, max: usize) {
        lock(&self.inner).max_connections = max;
    }

    /// Run `hook` on every newly established connection, before it is handed
    /// out; useful for per-session setup.
    pub fn on_connection<F>(&self, hook: F)
    where
        F: Fn(&mut Connection) + Send + 'static,
    {
        lock(&self.inner).on_connection = Some(Box::new(hook));
    }

    /// Number of connections currently cached.
    pub fn idle_count(&self) -> usize {
        lock(&self.inner).idle.len()
    }
}

/// A fork happened if the recorded owner differs from the current process:
/// drop inherited connections without COM_QUIT, their sockets are shared
/// with the parent.
fn reset_if_forked(inner: &mut PoolInner) {
    let pid = process::id();

    if inner.owner_pid != pid {
        log::debug!("process id changed ({} -> {}); clearing connection cache", inner.owner_pid, pid);

        for connection in inner.idle.drain(..) {
            connection.abandon();
        }

        inner.owner_pid = pid;
    }
}

/// Return a connection to the cache, evicting the oldest past the cap.
pub(crate) fn enqueue(inner: &Mutex<PoolInner>, connection: Connection) {
    let mut inner = lock(inner);

    reset_if_forked(&mut inner);

    inner.idle.push_back(connection);

    while inner.idle.len() > inner.max_connections {
        if let Some(mut oldest) = inner.idle.pop_front() {
            oldest.close();
        }
    }
}

use std::ops::{Deref, DerefMut};

use crate::database::Database;

/// Marker for a transaction opened with [`Database::begin`].
///
/// While the marker is held, the connection is inside `START TRANSACTION`
/// with autocommit off, and the database handle is only reachable through
/// it. Completing the transaction is the caller's business: issue `COMMIT`
/// or `ROLLBACK` (and restore `autocommit=1`) through [`Database::query`].
/// Dropping the marker only releases the borrow; the transaction itself
/// stays open on the connection, and [`Database::begin`] will refuse a new
/// one until it is resolved.
#[must_use = "the transaction stays open until COMMIT or ROLLBACK is issued"]
pub struct Transaction<'d> {
    db: &'d mut Database,
}

impl<'d> Transaction<'d> {
    pub(crate) fn new(db: &'d mut Database) -> Self {
        Self { db }
    }
}

impl Deref for Transaction<'_> {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        self.db
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.db
    }
}

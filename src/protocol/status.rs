// https://dev.mysql.com/doc/internals/en/status-flags.html#packet-Protocol::StatusFlags
// https://mariadb.com/kb/en/library/mariadb-connectorc-types-and-definitions/#server-status
bitflags::bitflags! {
    /// Server status flags, updated from every OK and EOF packet.
    pub struct Status: u16 {
        /// A multi-statement transaction has been started.
        const IN_TRANS = 0x0001;

        /// Autocommit mode is set.
        const AUTOCOMMIT = 0x0002;

        /// Multi query - next query exists.
        const MORE_RESULTS_EXISTS = 0x0008;

        const NO_GOOD_INDEX_USED = 0x0010;
        const NO_INDEX_USED = 0x0020;

        /// A database has been dropped.
        const DB_DROPPED = 0x0100;

        /// Current escape mode is "no backslash escape".
        const NO_BACKSLASH_ESCAPES = 0x0200;

        /// Last statement took more than `long_query_time`.
        const QUERY_WAS_SLOW = 0x0800;

        /// Current transaction is a read-only transaction.
        const IN_TRANS_READONLY = 0x2000;

        /// Server state has changed because of the last statement.
        const SESSION_STATE_CHANGED = 0x4000;
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::empty()
    }
}

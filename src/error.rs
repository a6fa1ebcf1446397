use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::io;

/// A specialized `Result` type for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All the ways a connection, query, or helper can fail.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Socket-level failure. Fatal to the connection.
    Network(io::Error),

    /// Unexpected packet shape or sequence. Fatal to the connection.
    Protocol(String),

    /// The server rejected our credentials during the handshake. Fatal.
    Auth(ServerError),

    /// A well-formed ERR packet mid-session. The connection returns to idle
    /// and may be reused.
    Server(ServerError),

    /// Exceeded `connect_timeout` or `query_timeout`. Fatal to the connection.
    Timeout(&'static str),

    /// A blocking `query` was invoked while callback queries are queued.
    Busy,

    /// Placeholder count differs from argument count in [`sql::expand_sql`].
    ///
    /// [`sql::expand_sql`]: crate::sql::expand_sql
    ArityMismatch { expected: usize, provided: usize },

    /// An operation is invalid in the current state, e.g. `begin()` while a
    /// transaction is already open.
    State(&'static str),

    /// Malformed connection URL or option value.
    Configuration(String),
}

/// Error information from an ERR packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub code: u16,
    pub sql_state: String,
    pub message: String,
}

impl Display for ServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.sql_state, self.message)
    }
}

impl StdError for ServerError {}

impl Error {
    pub(crate) fn closed() -> Self {
        Error::Network(io::ErrorKind::NotConnected.into())
    }

    /// `true` for kinds that leave the connection unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Protocol(_) | Error::Auth(_) | Error::Timeout(_)
        )
    }

    /// The server-reported error, if this is a [`Error::Server`] or
    /// [`Error::Auth`] variant.
    pub fn as_server_error(&self) -> Option<&ServerError> {
        match self {
            Error::Server(error) | Error::Auth(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::Network(source) => write!(f, "network: {}", source),

            Error::Protocol(message) => write!(f, "protocol: {}", message),

            Error::Auth(error) => write!(f, "authentication failed: {}", error),

            Error::Server(error) => write!(f, "server: {}", error),

            Error::Timeout(during) => write!(f, "timed out during {}", during),

            Error::Busy => f.write_str("a callback query is still in flight on this database"),

            Error::ArityMismatch { expected, provided } => write!(
                f,
                "statement has {} placeholders but {} arguments were provided",
                expected, provided
            ),

            Error::State(message) => write!(f, "invalid state: {}", message),

            Error::Configuration(message) => write!(f, "configuration: {}", message),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Network(source) => Some(source),
            Error::Auth(error) | Error::Server(error) => Some(error),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Network(error)
    }
}

macro_rules! err_protocol {
    ($($args:tt)*) => {
        $crate::error::Error::Protocol(format!($($args)*))
    };
}

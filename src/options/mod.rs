use std::path::PathBuf;
use std::time::Duration;

mod parse;

/// Options for connecting to a MySQL server, usually parsed from a
/// connection URL:
///
/// ```text
/// mysql://[user[:password]@]host-or-socket[:port]/database?opt=val&...
/// ```
///
/// A host whose URL-decoded form contains `/` is treated as the path of a
/// Unix domain socket, as is an explicit `socket` query parameter.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) socket: Option<PathBuf>,
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) database: Option<String>,
    pub(crate) found_rows: bool,
    pub(crate) multi_statements: bool,
    pub(crate) utf8: bool,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) query_timeout: Option<Duration>,
    pub(crate) print_error: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self {
            host: "localhost".into(),
            port: 3306,
            socket: None,
            username: "root".into(),
            password: String::new(),
            database: None,
            found_rows: true,
            multi_statements: false,
            utf8: true,
            connect_timeout: Some(Duration::from_secs(10)),
            query_timeout: None,
            print_error: false,
        }
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Connect through a Unix domain socket instead of TCP.
    pub fn socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket = Some(path.into());
        self
    }

    pub fn username(mut self, username: &str) -> Self {
        self.username = username.into();
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = password.into();
        self
    }

    pub fn database(mut self, database: &str) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Report matched rather than changed rows for UPDATE statements.
    /// Enabled by default.
    pub fn found_rows(mut self, on: bool) -> Self {
        self.found_rows = on;
        self
    }

    /// Allow `;`-separated statements in a single query.
    pub fn multi_statements(mut self, on: bool) -> Self {
        self.multi_statements = on;
        self
    }

    /// Issue `SET NAMES utf8` after connecting. Enabled by default.
    pub fn utf8(mut self, on: bool) -> Self {
        self.utf8 = on;
        self
    }

    /// Bound on the connect phase, including the handshake. `None` waits
    /// indefinitely.
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bound on any socket read while a command is in flight. `None` waits
    /// indefinitely.
    pub fn query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Additionally log server errors as they arrive. Disabled by default.
    pub fn print_error(mut self, on: bool) -> Self {
        self.print_error = on;
        self
    }
}

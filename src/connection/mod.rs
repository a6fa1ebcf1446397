use std::collections::VecDeque;
use std::fmt::{self, Debug, Formatter};
use std::time::{Duration, Instant};

use crate::error::{Error, Result, ServerError};
use crate::options::ConnectOptions;
use crate::protocol::{Column, ComPing, ComQuery, ComQuit, Row, Status};

mod establish;
mod executor;
mod socket;
mod stream;

use stream::Stream;

/// Where the connection is in the protocol exchange. Transitions are driven
/// solely by packets received or commands initiated; at most one command is
/// ever outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    HandshakeWait,
    AuthSent,
    Idle,
    CommandSent,
    ReadColumns,
    ReadRows,
    Closed,
}

/// Terminal metadata from an OK (or legacy EOF) packet.
#[derive(Debug, Clone)]
pub struct QueryEnd {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub warnings: u16,
    pub status: Status,
}

/// A structured event produced while a command is in flight.
///
/// Per statement the order is `Columns` (absent for statements without a
/// result set), then `Row` repeated, then a terminal `End` or `ServerError`;
/// with multi-statements the pattern repeats within one command.
#[derive(Debug)]
pub enum ProtocolEvent {
    Columns(Vec<Column>),
    Row(Row),
    End(QueryEnd),
    ServerError(ServerError),
}

/// A single connection to a MySQL server: socket lifecycle plus the
/// packet-level state machine.
///
/// Events are consumed from a queue with [`poll_event`]; the machine is
/// advanced either with non-blocking [`drive`] calls from an ambient
/// readiness loop, or with [`drive_blocking`] which runs the same machine
/// against blocking reads until the in-flight command terminates.
///
/// [`poll_event`]: Connection::poll_event
/// [`drive`]: Connection::drive
/// [`drive_blocking`]: Connection::drive_blocking
pub struct Connection {
    stream: Stream,
    phase: Phase,
    options: ConnectOptions,
    server_version: String,
    connection_id: u32,
    status: Status,

    // column metadata for the result set currently being read
    pending_columns: u64,
    columns: Vec<Column>,
    column_count: usize,

    events: VecDeque<ProtocolEvent>,
    deadline: Option<Instant>,
}

impl Debug for Connection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("phase", &self.phase)
            .field("connection_id", &self.connection_id)
            .field("server_version", &self.server_version)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Send a statement using the text protocol.
    ///
    /// The connection must be idle. Events for the command are read with
    /// [`drive`]/[`drive_blocking`] and consumed with [`poll_event`].
    ///
    /// [`drive`]: Connection::drive
    /// [`drive_blocking`]: Connection::drive_blocking
    /// [`poll_event`]: Connection::poll_event
    pub fn query(&mut self, sql: &str) -> Result<()> {
        if self.phase != Phase::Idle {
            return Err(if self.phase == Phase::Closed {
                Error::closed()
            } else {
                Error::State("connection is not idle")
            });
        }

        log::debug!("conn={} query: {}", self.connection_id, sql);

        if let Err(error) = self.stream.send_packet(&ComQuery { sql }) {
            return Err(self.fatal(error));
        }

        self.phase = Phase::CommandSent;
        self.deadline = self.options.query_timeout.map(|timeout| Instant::now() + timeout);

        Ok(())
    }

    /// Drain whatever the socket has ready without blocking, interpreting
    /// whole packets and queueing events.
    ///
    /// Returns `Ok(true)` once the in-flight command has reached its
    /// terminal event (or when no command is in flight).
    pub fn drive(&mut self) -> Result<bool> {
        match self.phase {
            Phase::CommandSent | Phase::ReadColumns | Phase::ReadRows => {}
            Phase::Idle => return Ok(true),
            _ => return Err(Error::closed()),
        }

        if let Err(error) = self.stream.set_nonblocking(true) {
            return Err(self.fatal(error));
        }

        loop {
            if self.deadline_expired() {
                return Err(self.synthesize_timeout());
            }

            match self.stream.try_recv_packet() {
                Ok(Some(payload)) => {
                    if let Err(error) = self.handle_packet(payload) {
                        return Err(self.fatal(error));
                    }

                    if self.phase == Phase::Idle {
                        return Ok(true);
                    }
                }

                Ok(None) => return Ok(false),

                Err(error) => return Err(self.fatal(error)),
            }
        }
    }

    /// Run the state machine against blocking reads until the in-flight
    /// command terminates.
    pub fn drive_blocking(&mut self) -> Result<()> {
        if let Err(error) = self
            .stream
            .set_nonblocking(false)
            .and_then(|_| self.stream.set_read_timeout(self.options.query_timeout))
        {
            return Err(self.fatal(error));
        }

        while matches!(self.phase, Phase::CommandSent | Phase::ReadColumns | Phase::ReadRows) {
            match self.stream.recv_packet() {
                Ok(payload) => {
                    if let Err(error) = self.handle_packet(payload) {
                        return Err(self.fatal(error));
                    }
                }

                Err(Error::Timeout(_)) => return Err(self.synthesize_timeout()),

                Err(error) => return Err(self.fatal(error)),
            }
        }

        self.stream.set_read_timeout(None).map_err(|error| self.fatal(error))
    }

    /// Consume the next queued event.
    pub fn poll_event(&mut self) -> Option<ProtocolEvent> {
        self.events.pop_front()
    }

    /// Issue COM_PING; `false` when the connection is unhealthy.
    pub fn ping(&mut self) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }

        let result = (|| -> Result<()> {
            self.stream.set_nonblocking(false)?;
            self.stream.set_read_timeout(Some(Duration::from_secs(10)))?;
            self.stream.send_packet(&ComPing)?;

            // the reply is OK, or ERR from a particularly unhappy server;
            // either way the link is alive
            self.stream.recv_packet()?;
            self.stream.set_read_timeout(None)?;

            Ok(())
        })();

        match result {
            Ok(()) => true,

            Err(error) => {
                log::debug!("conn={} ping failed: {}", self.connection_id, error);
                let _ = self.fatal(error);
                false
            }
        }
    }

    /// Send COM_QUIT (best-effort) and close the socket.
    pub fn close(&mut self) {
        if !matches!(self.phase, Phase::Closed | Phase::Disconnected) {
            let _ = self.stream.set_nonblocking(false);
            let _ = self.stream.send_packet(&ComQuit);
        }

        self.stream.shutdown();
        self.phase = Phase::Closed;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Server status flags from the most recent OK, EOF, or handshake packet.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Thread id of this session on the server.
    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    fn deadline_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// The query deadline passed: queue a synthesized server error so any
    /// accumulated results carry it, then tear the connection down.
    fn synthesize_timeout(&mut self) -> Error {
        self.events.push_back(ProtocolEvent::ServerError(ServerError {
            code: 3024,
            sql_state: "HY000".into(),
            message: "query execution was interrupted, maximum statement execution time exceeded"
                .into(),
        }));

        self.fatal(Error::Timeout("query"))
    }

    /// Release the socket without the COM_QUIT farewell. Used for inherited
    /// connections after a fork, where the session (and the socket's write
    /// side) still belongs to the parent process.
    pub(crate) fn abandon(mut self) {
        self.phase = Phase::Closed;
    }

    /// Record an unrecoverable failure: close the socket and park the
    /// connection in `Closed` so a pool return discards it.
    fn fatal(&mut self, error: Error) -> Error {
        self.stream.shutdown();
        self.phase = Phase::Closed;
        self.deadline = None;

        error
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if !matches!(self.phase, Phase::Closed | Phase::Disconnected) {
            self.close();
        }
    }
}

#[cfg(test)]
impl Connection {
    /// An idle connection over a scripted socket; `script` is the raw bytes
    /// the "server" will answer with.
    pub(crate) fn mock(capabilities: crate::protocol::Capabilities, script: Vec<u8>) -> Self {
        use crate::connection::socket::{MockStream, Socket};

        let options = ConnectOptions::new();
        let socket = Socket::Mock(MockStream {
            input: std::io::Cursor::new(script),
            written: Vec::new(),
        });

        let mut stream = Stream::with_socket(socket, &options);
        stream.capabilities = capabilities;

        Self {
            stream,
            phase: Phase::Idle,
            options,
            server_version: "5.7.30".into(),
            connection_id: 1,
            status: Status::AUTOCOMMIT,
            pending_columns: 0,
            columns: Vec::new(),
            column_count: 0,
            events: VecDeque::new(),
            deadline: None,
        }
    }
}

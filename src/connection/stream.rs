use std::io::{self, Read, Write};
use std::time::Duration;

use bytes::{Bytes, BytesMut};

use crate::connection::socket::Socket;
use crate::error::{Error, Result};
use crate::io::ProtocolEncode;
use crate::options::ConnectOptions;
use crate::protocol::{packet, Capabilities};

/// The connection's socket plus packet framing state: an unbounded read
/// buffer, the write buffer, the packet sequence counter, and the negotiated
/// capability flags.
pub(crate) struct Stream {
    socket: Socket,
    rbuf: BytesMut,
    wbuf: Vec<u8>,
    pub(crate) sequence_id: u8,
    pub(crate) capabilities: Capabilities,
    nonblocking: bool,
}

impl Stream {
    pub(crate) fn with_socket(socket: Socket, options: &ConnectOptions) -> Self {
        let mut capabilities = Capabilities::PROTOCOL_41
            | Capabilities::LONG_PASSWORD
            | Capabilities::TRANSACTIONS
            | Capabilities::SECURE_CONNECTION
            | Capabilities::IGNORE_SPACE
            | Capabilities::PLUGIN_AUTH
            | Capabilities::MULTI_RESULTS
            | Capabilities::DEPRECATE_EOF;

        if options.found_rows {
            capabilities |= Capabilities::FOUND_ROWS;
        }

        if options.multi_statements {
            capabilities |= Capabilities::MULTI_STATEMENTS;
        }

        if options.database.is_some() {
            capabilities |= Capabilities::CONNECT_WITH_DB;
        }

        Self {
            socket,
            rbuf: BytesMut::with_capacity(8 * 1024),
            wbuf: Vec::with_capacity(1024),
            sequence_id: 0,
            capabilities,
            nonblocking: false,
        }
    }

    /// Frame a packet into the write buffer, continuing the current command
    /// sequence.
    pub(crate) fn write_packet<T>(&mut self, payload: &T) -> Result<()>
    where
        T: ProtocolEncode<Capabilities>,
    {
        let mut encoded = Vec::new();
        payload.encode_with(&mut encoded, self.capabilities)?;

        log::trace!("write > {:02x?}", &encoded[..encoded.len().min(32)]);

        packet::write_packet(&mut self.wbuf, &mut self.sequence_id, &encoded);

        Ok(())
    }

    /// Frame a raw payload (possibly empty), continuing the current command
    /// sequence.
    pub(crate) fn write_raw(&mut self, payload: &[u8]) {
        log::trace!("write > {:02x?}", &payload[..payload.len().min(32)]);

        packet::write_packet(&mut self.wbuf, &mut self.sequence_id, payload);
    }

    /// Begin a fresh command: reset the sequence counter, frame the packet,
    /// and send it.
    pub(crate) fn send_packet<T>(&mut self, payload: &T) -> Result<()>
    where
        T: ProtocolEncode<Capabilities>,
    {
        self.sequence_id = 0;
        self.write_packet(payload)?;
        self.flush()
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        if self.wbuf.is_empty() {
            return Ok(());
        }

        // writes always happen in blocking mode; only reads go non-blocking
        if self.nonblocking {
            self.socket.set_nonblocking(false)?;
        }

        let result = self.socket.write_all(&self.wbuf).and_then(|_| self.socket.flush());

        if self.nonblocking {
            self.socket.set_nonblocking(true)?;
        }

        self.wbuf.clear();

        result.map_err(Error::Network)
    }

    pub(crate) fn set_nonblocking(&mut self, on: bool) -> Result<()> {
        if self.nonblocking != on {
            self.socket.set_nonblocking(on)?;
            self.nonblocking = on;
        }

        Ok(())
    }

    pub(crate) fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_read_timeout(timeout)
    }

    /// Receive the next packet, blocking until it is complete.
    pub(crate) fn recv_packet(&mut self) -> Result<Bytes> {
        loop {
            if let Some((sequence_id, payload)) = packet::read_packet(&mut self.rbuf)? {
                self.sequence_id = sequence_id.wrapping_add(1);

                log::trace!("read  < {:02x?}", &payload[..payload.len().min(32)]);

                return Ok(payload);
            }

            self.fill_blocking()?;
        }
    }

    /// Receive the next packet if it can be assembled without blocking.
    pub(crate) fn try_recv_packet(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some((sequence_id, payload)) = packet::read_packet(&mut self.rbuf)? {
                self.sequence_id = sequence_id.wrapping_add(1);

                log::trace!("read  < {:02x?}", &payload[..payload.len().min(32)]);

                return Ok(Some(payload));
            }

            let mut chunk = [0_u8; 8 * 1024];
            match self.socket.read(&mut chunk) {
                Ok(0) => return Err(Error::Network(io::ErrorKind::UnexpectedEof.into())),

                Ok(n) => self.rbuf.extend_from_slice(&chunk[..n]),

                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(None),

                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,

                Err(error) => return Err(Error::Network(error)),
            }
        }
    }

    fn fill_blocking(&mut self) -> Result<()> {
        let mut chunk = [0_u8; 8 * 1024];

        loop {
            return match self.socket.read(&mut chunk) {
                Ok(0) => Err(Error::Network(io::ErrorKind::UnexpectedEof.into())),

                Ok(n) => {
                    self.rbuf.extend_from_slice(&chunk[..n]);
                    Ok(())
                }

                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,

                Err(error)
                    if error.kind() == io::ErrorKind::WouldBlock
                        || error.kind() == io::ErrorKind::TimedOut =>
                {
                    Err(Error::Timeout("socket read"))
                }

                Err(error) => Err(Error::Network(error)),
            };
        }
    }

    pub(crate) fn shutdown(&self) {
        self.socket.shutdown();
    }

    /// Everything written to the scripted socket, headers included.
    #[cfg(test)]
    pub(crate) fn mock_written(&self) -> &[u8] {
        match &self.socket {
            Socket::Mock(mock) => &mock.written,
            _ => panic!("not a mock socket"),
        }
    }
}

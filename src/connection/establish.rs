use std::collections::VecDeque;

use bytes::{Buf, Bytes};

use crate::connection::socket::Socket;
use crate::connection::stream::Stream;
use crate::connection::{Connection, Phase, ProtocolEvent};
use crate::error::{Error, Result};
use crate::io::{BufExt, ProtocolDecode};
use crate::options::ConnectOptions;
use crate::protocol::{
    native_password, Capabilities, ErrPacket, Handshake, HandshakeResponse, OkPacket, Status,
};

// https://dev.mysql.com/doc/internals/en/connection-phase.html

// the connection phase performs these tasks:
//  - exchange the capabilities of client and server
//  - authenticate the client against the server
// the server may immediately send an ERR packet and hang up instead

const COLLATE_UTF8MB4_UNICODE_CI: u8 = 224;
const MAX_PACKET_SIZE: u32 = 16_777_215;

impl Connection {
    /// Open a socket to the server and perform the handshake, leaving the
    /// connection idle and ready for queries.
    ///
    /// The whole phase is bounded by `connect_timeout`.
    pub fn connect(options: &ConnectOptions) -> Result<Self> {
        let socket = Socket::connect(options)?;
        socket.set_read_timeout(options.connect_timeout)?;

        let stream = Stream::with_socket(socket, options);

        let mut conn = Self {
            stream,
            phase: Phase::HandshakeWait,
            options: options.clone(),
            server_version: String::new(),
            connection_id: 0,
            status: Status::empty(),
            pending_columns: 0,
            columns: Vec::new(),
            column_count: 0,
            events: VecDeque::new(),
            deadline: None,
        };

        match conn.establish() {
            Ok(()) => {
                log::debug!(
                    "conn={} connected to {} ({})",
                    conn.connection_id,
                    conn.options.host,
                    conn.server_version
                );

                Ok(conn)
            }

            Err(error) => {
                conn.stream.shutdown();
                conn.phase = Phase::Closed;

                Err(match error {
                    Error::Timeout(_) => Error::Timeout("connect"),
                    error => error,
                })
            }
        }
    }

    fn establish(&mut self) -> Result<()> {
        let payload = self.stream.recv_packet()?;

        if payload.first() == Some(&0xff) {
            let err = ErrPacket::decode_with(payload, self.stream.capabilities)?;
            return Err(Error::Auth(err.into_server_error()));
        }

        let handshake = Handshake::decode_with(payload, ())?;

        if !handshake
            .server_capabilities
            .contains(Capabilities::PROTOCOL_41 | Capabilities::SECURE_CONNECTION)
        {
            return Err(err_protocol!(
                "server {:?} does not support the 4.1 protocol with native authentication",
                handshake.server_version
            ));
        }

        // keep only what both sides support
        self.stream.capabilities &= handshake.server_capabilities;

        self.server_version = handshake.server_version;
        self.connection_id = handshake.connection_id;
        self.status = handshake.status;

        let auth_response =
            native_password(&handshake.auth_plugin_data, &self.options.password);

        self.phase = Phase::AuthSent;

        // the response continues the handshake's packet sequence
        self.stream.write_packet(&HandshakeResponse {
            max_packet_size: MAX_PACKET_SIZE,
            collation: if self.options.utf8 {
                COLLATE_UTF8MB4_UNICODE_CI
            } else {
                handshake.charset
            },
            username: &self.options.username,
            database: self.options.database.as_deref(),
            auth_response: &auth_response,
            auth_plugin_name: Some("mysql_native_password"),
        })?;
        self.stream.flush()?;

        loop {
            let payload = self.stream.recv_packet()?;

            match payload.first() {
                Some(&0x00) => {
                    let ok = OkPacket::decode_with(payload, self.stream.capabilities)?;
                    self.status = ok.status;
                    break;
                }

                Some(&0xff) => {
                    let err = ErrPacket::decode_with(payload, self.stream.capabilities)?;
                    return Err(Error::Auth(err.into_server_error()));
                }

                Some(&0xfe) => self.auth_switch(payload)?,

                _ => return Err(err_protocol!("unexpected packet during authentication")),
            }
        }

        self.phase = Phase::Idle;

        if self.options.utf8 {
            self.session_setup("SET NAMES utf8")?;
        }

        self.stream.set_read_timeout(None)?;

        Ok(())
    }

    /// The server asked us to re-authenticate with a different plugin and a
    /// fresh nonce.
    fn auth_switch(&mut self, mut payload: Bytes) -> Result<()> {
        payload.advance(1); // 0xfe tag

        let plugin = payload.get_str_nul()?;

        if plugin != "mysql_native_password" {
            return Err(err_protocol!("unsupported authentication plugin {:?}", plugin));
        }

        let mut nonce = payload.to_vec();
        if nonce.last() == Some(&0) {
            nonce.pop();
        }

        let response = native_password(&nonce, &self.options.password);

        // continues the sequence of the switch request
        self.stream.write_raw(&response);
        self.stream.flush()
    }

    /// Run a session-setup statement during connect, before the connection
    /// is handed to a caller. Reads stay bounded by `connect_timeout`.
    fn session_setup(&mut self, sql: &str) -> Result<()> {
        self.query(sql)?;

        while matches!(self.phase, Phase::CommandSent | Phase::ReadColumns | Phase::ReadRows) {
            let payload = self.stream.recv_packet()?;

            if let Err(error) = self.handle_packet(payload) {
                return Err(self.fatal(error));
            }
        }

        while let Some(event) = self.poll_event() {
            if let ProtocolEvent::ServerError(error) = event {
                return Err(Error::Server(error));
            }
        }

        Ok(())
    }
}

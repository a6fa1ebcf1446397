use bytes::{Buf, Bytes};

use crate::error::Result;
use crate::io::{BufExt, ProtocolDecode};
use crate::protocol::Capabilities;
use crate::protocol::Status;

// https://dev.mysql.com/doc/internals/en/connection-phase-packets.html#packet-Protocol::Handshake
// https://mariadb.com/kb/en/connection/#initial-handshake-packet

/// The initial handshake packet the server sends on connect.
#[derive(Debug)]
pub(crate) struct Handshake {
    pub(crate) protocol_version: u8,
    pub(crate) server_version: String,
    pub(crate) connection_id: u32,
    pub(crate) server_capabilities: Capabilities,
    pub(crate) charset: u8,
    pub(crate) status: Status,
    pub(crate) auth_plugin_data: Vec<u8>,
    pub(crate) auth_plugin_name: Option<String>,
}

impl ProtocolDecode for Handshake {
    fn decode_with(mut buf: Bytes, _: ()) -> Result<Self> {
        if buf.is_empty() {
            return Err(err_protocol!("empty handshake packet"));
        }

        let protocol_version = buf.get_u8();
        if protocol_version != 10 {
            return Err(err_protocol!(
                "unsupported protocol version {}; expected 10",
                protocol_version
            ));
        }

        let server_version = buf.get_str_nul()?;

        if buf.remaining() < 4 + 8 + 1 + 2 {
            return Err(err_protocol!("handshake packet too short"));
        }

        let connection_id = buf.get_u32_le();

        // the 20-byte scramble arrives in two parts, 8 bytes here and
        // (usually) 12 more after the fixed fields
        let mut auth_plugin_data = buf.split_to(8).to_vec();

        buf.advance(1); // filler

        let capabilities_lower = buf.get_u16_le();

        let (charset, status, capabilities_upper, auth_data_len) = if buf.remaining() >= 5 {
            let charset = buf.get_u8();
            let status = Status::from_bits_truncate(buf.get_u16_le());
            let upper = buf.get_u16_le();

            let auth_data_len = if buf.remaining() >= 1 { buf.get_u8() } else { 0 };

            (charset, status, upper, auth_data_len)
        } else {
            (0, Status::empty(), 0, 0)
        };

        let server_capabilities = Capabilities::from_bits_truncate(
            u64::from(capabilities_lower) | (u64::from(capabilities_upper) << 16),
        );

        if buf.remaining() >= 10 {
            buf.advance(10); // reserved
        }

        if server_capabilities.contains(Capabilities::SECURE_CONNECTION) {
            // max(13, auth_data_len - 8) bytes; the trailing NUL is not part
            // of the scramble
            let len = usize::from(auth_data_len.max(8 + 13) - 8).min(buf.remaining());
            let mut part2 = buf.split_to(len).to_vec();

            if part2.last() == Some(&0) {
                part2.pop();
            }

            auth_plugin_data.extend_from_slice(&part2);
        }

        let auth_plugin_name = if server_capabilities.contains(Capabilities::PLUGIN_AUTH) {
            // some servers omit the trailing NUL here
            Some(if buf.contains(&0) { buf.get_str_nul()? } else { buf.get_str_eof() })
        } else {
            None
        };

        Ok(Self {
            protocol_version,
            server_version,
            connection_id,
            server_capabilities,
            charset,
            status,
            auth_plugin_data,
            auth_plugin_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::{Capabilities, Handshake};
    use crate::io::ProtocolDecode;

    // captured from a MySQL 5.7 server
    const HANDSHAKE: &[u8] = b"\x0a5.7.30\x00\x19\x00\x00\x00\x01\x08\x0b\x0c\x0d\x0e\x0f\x10\x00\xff\xf7\x2d\x02\x00\xff\x81\x15\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x11\x12\x13\x14\x15\x16\x17\x18\x19\x1a\x1b\x1c\x00mysql_native_password\x00";

    #[test]
    fn decodes_handshake() {
        let handshake = Handshake::decode_with(Bytes::from_static(HANDSHAKE), ()).unwrap();

        assert_eq!(handshake.protocol_version, 10);
        assert_eq!(handshake.server_version, "5.7.30");
        assert_eq!(handshake.connection_id, 25);
        assert_eq!(handshake.charset, 45);
        assert_eq!(handshake.auth_plugin_name.as_deref(), Some("mysql_native_password"));

        // 8 + 12 byte scramble, trailing NUL stripped
        assert_eq!(
            handshake.auth_plugin_data,
            [
                0x01, 0x08, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15,
                0x16, 0x17, 0x18, 0x19, 0x1a, 0x1b, 0x1c,
            ]
        );

        assert!(handshake.server_capabilities.contains(Capabilities::PROTOCOL_41));
        assert!(handshake.server_capabilities.contains(Capabilities::SECURE_CONNECTION));
        assert!(handshake.server_capabilities.contains(Capabilities::PLUGIN_AUTH));
    }

    #[test]
    fn rejects_wrong_protocol_version() {
        let buf = Bytes::from_static(b"\x09ancient\x00");
        assert!(Handshake::decode_with(buf, ()).is_err());
    }
}

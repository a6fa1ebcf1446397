use bytes::{Buf, Bytes};

use crate::error::{Result, ServerError};
use crate::io::{BufExt, ProtocolDecode};
use crate::protocol::Capabilities;

// https://dev.mysql.com/doc/internals/en/packet-ERR_Packet.html
// https://mariadb.com/kb/en/err_packet/

#[derive(Debug)]
pub(crate) struct ErrPacket {
    pub(crate) error_code: u16,
    pub(crate) sql_state: String,
    pub(crate) error_message: String,
}

impl ErrPacket {
    pub(crate) fn into_server_error(self) -> ServerError {
        ServerError {
            code: self.error_code,
            sql_state: self.sql_state,
            message: self.error_message,
        }
    }
}

impl ProtocolDecode<Capabilities> for ErrPacket {
    fn decode_with(mut buf: Bytes, capabilities: Capabilities) -> Result<Self> {
        if buf.is_empty() {
            return Err(err_protocol!("empty ERR packet"));
        }

        let tag = buf.get_u8();
        if tag != 0xff {
            return Err(err_protocol!("expected ERR packet (0xff), got 0x{:02x}", tag));
        }

        if buf.remaining() < 2 {
            return Err(err_protocol!("ERR packet too short"));
        }

        let error_code = buf.get_u16_le();

        // if the next byte is '#' the 5-byte ASCII SQL state follows
        let sql_state = if capabilities.contains(Capabilities::PROTOCOL_41)
            && buf.first() == Some(&b'#')
        {
            buf.advance(1);
            buf.get_str(5)?
        } else {
            String::new()
        };

        let error_message = buf.get_str_eof();

        Ok(Self { error_code, sql_state, error_message })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::ErrPacket;
    use crate::io::ProtocolDecode;
    use crate::protocol::Capabilities;

    #[test]
    fn decodes_err_without_sql_state() {
        const DATA: &[u8] = b"\xff\x84\x04Got packets out of order";

        let err =
            ErrPacket::decode_with(Bytes::from_static(DATA), Capabilities::PROTOCOL_41).unwrap();

        assert_eq!(err.error_code, 1156);
        assert_eq!(err.sql_state, "");
        assert_eq!(err.error_message, "Got packets out of order");
    }

    #[test]
    fn decodes_err_with_sql_state() {
        const DATA: &[u8] = b"\xff\x19\x04#42000Unknown database 'unknown'";

        let err =
            ErrPacket::decode_with(Bytes::from_static(DATA), Capabilities::PROTOCOL_41).unwrap();

        assert_eq!(err.error_code, 1049);
        assert_eq!(err.sql_state, "42000");
        assert_eq!(err.error_message, "Unknown database 'unknown'");
    }

    #[test]
    fn rejects_non_err_tag() {
        const DATA: &[u8] = b"\x00\x00\x00";
        assert!(ErrPacket::decode_with(Bytes::from_static(DATA), Capabilities::PROTOCOL_41).is_err());
    }
}

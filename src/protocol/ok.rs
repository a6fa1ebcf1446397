use bytes::{Buf, Bytes};

use crate::error::Result;
use crate::io::{BufExt, ProtocolDecode};
use crate::protocol::{Capabilities, Status};

// https://dev.mysql.com/doc/internals/en/packet-OK_Packet.html
// https://mariadb.com/kb/en/ok_packet/

/// Signals successful completion of a command. As of MySQL 5.7.5, OK packets
/// also replace EOF packets when `DEPRECATE_EOF` was negotiated.
#[derive(Debug)]
pub(crate) struct OkPacket {
    pub(crate) affected_rows: u64,
    pub(crate) last_insert_id: u64,
    pub(crate) status: Status,
    pub(crate) warnings: u16,
}

impl ProtocolDecode<Capabilities> for OkPacket {
    fn decode_with(mut buf: Bytes, capabilities: Capabilities) -> Result<Self> {
        if buf.is_empty() {
            return Err(err_protocol!("empty OK packet"));
        }

        let tag = buf.get_u8();
        if tag != 0x00 && tag != 0xfe {
            return Err(err_protocol!("expected OK packet (0x00 or 0xfe), got 0x{:02x}", tag));
        }

        let affected_rows = buf.get_uint_lenenc()?;
        let last_insert_id = buf.get_uint_lenenc()?;

        let status = if capabilities
            .intersects(Capabilities::PROTOCOL_41 | Capabilities::TRANSACTIONS)
        {
            if buf.remaining() < 2 {
                return Err(err_protocol!("OK packet too short for status flags"));
            }
            Status::from_bits_truncate(buf.get_u16_le())
        } else {
            Status::empty()
        };

        let warnings = if capabilities.contains(Capabilities::PROTOCOL_41) {
            if buf.remaining() < 2 {
                return Err(err_protocol!("OK packet too short for warning count"));
            }
            buf.get_u16_le()
        } else {
            0
        };

        // the rest is human-readable status information; ignored

        Ok(Self { affected_rows, last_insert_id, status, warnings })
    }
}

/// `true` when a packet in a response stream is OK-shaped rather than a row.
pub(crate) fn is_ok_packet(payload: &[u8], capabilities: Capabilities) -> bool {
    if payload.is_empty() {
        return false;
    }

    match payload[0] {
        0x00 => true,
        // under DEPRECATE_EOF the terminator is a 0xfe-tagged OK packet; in
        // the legacy protocol 0xfe with a short payload is an EOF packet
        0xfe if capabilities.contains(Capabilities::DEPRECATE_EOF) => {
            payload.len() < crate::protocol::packet::MAX_PAYLOAD
        }
        0xfe => payload.len() < 9,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::{is_ok_packet, OkPacket};
    use crate::io::ProtocolDecode;
    use crate::protocol::{Capabilities, Status};

    #[test]
    fn decodes_empty_ok_packet() {
        const DATA: &[u8] = b"\x00\x00\x00\x02@\x00\x00";

        let capabilities = Capabilities::PROTOCOL_41 | Capabilities::TRANSACTIONS;
        let ok = OkPacket::decode_with(Bytes::from_static(DATA), capabilities).unwrap();

        assert_eq!(ok.affected_rows, 0);
        assert_eq!(ok.last_insert_id, 0);
        assert_eq!(ok.warnings, 0);
        assert_eq!(ok.status, Status::AUTOCOMMIT | Status::SESSION_STATE_CHANGED);
    }

    #[test]
    fn decodes_insert_ok_packet() {
        // affected_rows=1, last_insert_id=42, autocommit, no warnings
        const DATA: &[u8] = b"\x00\x01\x2a\x02\x00\x00\x00";

        let capabilities = Capabilities::PROTOCOL_41;
        let ok = OkPacket::decode_with(Bytes::from_static(DATA), capabilities).unwrap();

        assert_eq!(ok.affected_rows, 1);
        assert_eq!(ok.last_insert_id, 42);
        assert_eq!(ok.status, Status::AUTOCOMMIT);
        assert_eq!(ok.warnings, 0);
    }

    #[test]
    fn rejects_err_tag() {
        const DATA: &[u8] = b"\xff\x15\x04";
        assert!(OkPacket::decode_with(Bytes::from_static(DATA), Capabilities::PROTOCOL_41).is_err());
    }

    #[test]
    fn classifies_ok_shapes() {
        let caps = Capabilities::PROTOCOL_41;

        assert!(is_ok_packet(b"\x00\x00\x00\x02\x00\x00\x00", caps));
        assert!(is_ok_packet(b"\xfe\x00\x00\x02\x00", caps));
        assert!(!is_ok_packet(b"\xff\x15\x04", caps));
        assert!(!is_ok_packet(b"\x03", caps));

        // long 0xfe payload is a row under the legacy protocol...
        let mut long = vec![0xfe];
        long.extend_from_slice(&[b'x'; 16]);
        assert!(!is_ok_packet(&long, caps));

        // ...but an OK-shaped terminator once EOF packets are deprecated
        assert!(is_ok_packet(&long, caps | Capabilities::DEPRECATE_EOF));
    }
}

use bytes::{Buf, Bytes};

use crate::error::Result;
use crate::io::ProtocolDecode;
use crate::protocol::{Capabilities, Status};

// https://dev.mysql.com/doc/internals/en/packet-EOF_Packet.html

/// Legacy terminator between the column-definition and row phases and at the
/// end of rows; replaced by OK packets once `DEPRECATE_EOF` is negotiated.
#[derive(Debug)]
pub(crate) struct EofPacket {
    pub(crate) status: Status,
    pub(crate) warnings: u16,
}

impl ProtocolDecode<Capabilities> for EofPacket {
    fn decode_with(mut buf: Bytes, capabilities: Capabilities) -> Result<Self> {
        if buf.is_empty() {
            return Err(err_protocol!("empty EOF packet"));
        }

        let tag = buf.get_u8();
        if tag != 0xfe {
            return Err(err_protocol!("expected EOF packet (0xfe), got 0x{:02x}", tag));
        }

        let (warnings, status) = if capabilities.contains(Capabilities::PROTOCOL_41) {
            if buf.remaining() < 4 {
                return Err(err_protocol!("EOF packet too short"));
            }

            (buf.get_u16_le(), Status::from_bits_truncate(buf.get_u16_le()))
        } else {
            (0, Status::empty())
        };

        Ok(Self { status, warnings })
    }
}

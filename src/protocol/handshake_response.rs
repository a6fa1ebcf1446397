use crate::error::Result;
use crate::io::{BufMutExt, ProtocolEncode};
use crate::protocol::Capabilities;

// https://dev.mysql.com/doc/internals/en/connection-phase-packets.html#packet-Protocol::HandshakeResponse
// https://mariadb.com/kb/en/connection/#client-handshake-response

#[derive(Debug)]
pub(crate) struct HandshakeResponse<'a> {
    /// Max size of a command packet the client intends to send.
    pub(crate) max_packet_size: u32,

    /// Default collation for the connection.
    pub(crate) collation: u8,

    pub(crate) username: &'a str,

    pub(crate) database: Option<&'a str>,

    /// Scrambled password, or empty for an empty password.
    pub(crate) auth_response: &'a [u8],

    pub(crate) auth_plugin_name: Option<&'a str>,
}

impl ProtocolEncode<Capabilities> for HandshakeResponse<'_> {
    fn encode_with(&self, buf: &mut Vec<u8>, context: Capabilities) -> Result<()> {
        #[allow(clippy::cast_possible_truncation)]
        buf.extend(&(context.bits() as u32).to_le_bytes());
        buf.extend(&self.max_packet_size.to_le_bytes());
        buf.push(self.collation);
        buf.extend(&[0_u8; 23]);

        buf.put_str_nul(self.username);

        if context.contains(Capabilities::PLUGIN_AUTH_LENENC_DATA) {
            buf.put_bytes_lenenc(self.auth_response);
        } else if context.contains(Capabilities::SECURE_CONNECTION) {
            let len = u8::try_from(self.auth_response.len())
                .map_err(|_| err_protocol!("auth response too long: {}", self.auth_response.len()))?;

            buf.push(len);
            buf.extend(self.auth_response);
        } else {
            buf.push(0);
        }

        if context.contains(Capabilities::CONNECT_WITH_DB) {
            if let Some(database) = self.database {
                buf.put_str_nul(database);
            } else {
                buf.push(0);
            }
        }

        if context.contains(Capabilities::PLUGIN_AUTH) {
            buf.put_str_nul(self.auth_plugin_name.unwrap_or("mysql_native_password"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::HandshakeResponse;
    use crate::io::ProtocolEncode;
    use crate::protocol::Capabilities;

    #[test]
    fn encodes_response() {
        let response = HandshakeResponse {
            max_packet_size: 16_777_215,
            collation: 224,
            username: "root",
            database: Some("test"),
            auth_response: &[0xaa; 20],
            auth_plugin_name: Some("mysql_native_password"),
        };

        let context = Capabilities::PROTOCOL_41
            | Capabilities::SECURE_CONNECTION
            | Capabilities::CONNECT_WITH_DB
            | Capabilities::PLUGIN_AUTH;

        let mut buf = Vec::new();
        response.encode_with(&mut buf, context).unwrap();

        // capability flags, max packet size, collation
        #[allow(clippy::cast_possible_truncation)]
        let flags = (context.bits() as u32).to_le_bytes();
        assert_eq!(&buf[..4], &flags);
        assert_eq!(&buf[4..8], &[0xff, 0xff, 0xff, 0x00]);
        assert_eq!(buf[8], 224);

        // 23 bytes of filler, then the NUL-terminated username
        assert!(buf[9..32].iter().all(|&b| b == 0));
        assert_eq!(&buf[32..37], b"root\0");

        // length-prefixed auth response
        assert_eq!(buf[37], 20);
        assert_eq!(&buf[38..58], &[0xaa; 20]);

        assert_eq!(&buf[58..63], b"test\0");
        assert_eq!(&buf[63..], b"mysql_native_password\0");
    }
}

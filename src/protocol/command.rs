use crate::error::Result;
use crate::io::ProtocolEncode;
use crate::protocol::Capabilities;

// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_command_phase.html

/// Execute a statement using the text protocol.
#[derive(Debug)]
pub(crate) struct ComQuery<'a> {
    pub(crate) sql: &'a str,
}

impl ProtocolEncode<Capabilities> for ComQuery<'_> {
    fn encode_with(&self, buf: &mut Vec<u8>, _: Capabilities) -> Result<()> {
        buf.push(0x03); // COM_QUERY
        buf.extend(self.sql.as_bytes());

        Ok(())
    }
}

/// Liveness check.
#[derive(Debug)]
pub(crate) struct ComPing;

impl ProtocolEncode<Capabilities> for ComPing {
    fn encode_with(&self, buf: &mut Vec<u8>, _: Capabilities) -> Result<()> {
        buf.push(0x0e); // COM_PING

        Ok(())
    }
}

/// Tell the server we are hanging up.
#[derive(Debug)]
pub(crate) struct ComQuit;

impl ProtocolEncode<Capabilities> for ComQuit {
    fn encode_with(&self, buf: &mut Vec<u8>, _: Capabilities) -> Result<()> {
        buf.push(0x01); // COM_QUIT

        Ok(())
    }
}

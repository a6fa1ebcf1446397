use bytes::Bytes;

use crate::error::Result;

mod buf;
mod buf_mut;

pub(crate) use buf::BufExt;
pub(crate) use buf_mut::BufMutExt;

/// Decode a packet payload, given some context (usually the negotiated
/// capability flags).
pub(crate) trait ProtocolDecode<Context = ()>: Sized {
    fn decode_with(buf: Bytes, context: Context) -> Result<Self>;
}

/// Encode a packet payload, given some context.
pub(crate) trait ProtocolEncode<Context = ()> {
    fn encode_with(&self, buf: &mut Vec<u8>, context: Context) -> Result<()>;
}

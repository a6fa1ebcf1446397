mod auth;
mod capabilities;
mod column;
mod command;
mod eof;
mod err;
mod handshake;
mod handshake_response;
mod ok;
pub(crate) mod packet;
mod row;
mod status;

pub(crate) use auth::native_password;
pub(crate) use capabilities::Capabilities;
pub use column::{Column, ColumnFlags};
pub(crate) use command::{ComPing, ComQuery, ComQuit};
pub(crate) use eof::EofPacket;
pub(crate) use err::ErrPacket;
pub(crate) use handshake::Handshake;
pub(crate) use handshake_response::HandshakeResponse;
pub(crate) use ok::{is_ok_packet, OkPacket};
pub use row::Row;
pub use status::Status;

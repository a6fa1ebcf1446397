use bytes::{Buf, Bytes};

use crate::error::Result;
use crate::io::{BufExt, ProtocolDecode};

// https://dev.mysql.com/doc/internals/en/com-query-response.html#packet-Protocol::ColumnDefinition
// https://mariadb.com/kb/en/result-set-packets/#column-definition-packet

bitflags::bitflags! {
    /// Flags from a column definition packet.
    pub struct ColumnFlags: u16 {
        const NOT_NULL = 0x0001;
        const PRIMARY_KEY = 0x0002;
        const UNIQUE_KEY = 0x0004;
        const MULTIPLE_KEY = 0x0008;
        const BLOB = 0x0010;
        const UNSIGNED = 0x0020;
        const ZEROFILL = 0x0040;
        const BINARY = 0x0080;
        const ENUM = 0x0100;
        const AUTO_INCREMENT = 0x0200;
        const TIMESTAMP = 0x0400;
        const SET = 0x0800;
        const NO_DEFAULT_VALUE = 0x1000;
        const ON_UPDATE_NOW = 0x2000;
        const NUM = 0x8000;
    }
}

/// Describes one column of a result set.
#[derive(Debug, Clone)]
pub struct Column {
    pub catalog: String,
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    pub character_set: u16,
    pub column_length: u32,
    pub type_id: u8,
    pub flags: ColumnFlags,
    pub decimals: u8,
}

impl ProtocolDecode for Column {
    fn decode_with(mut buf: Bytes, _: ()) -> Result<Self> {
        let catalog = buf.get_str_lenenc()?;
        let schema = buf.get_str_lenenc()?;
        let table = buf.get_str_lenenc()?;
        let org_table = buf.get_str_lenenc()?;
        let name = buf.get_str_lenenc()?;
        let org_name = buf.get_str_lenenc()?;

        // length of the fixed-size fields below; always 0x0c
        let fixed_len = buf.get_uint_lenenc()?;
        if fixed_len != 0x0c {
            return Err(err_protocol!(
                "malformed column definition; fixed-length field block is {}",
                fixed_len
            ));
        }

        if buf.remaining() < 0x0c {
            return Err(err_protocol!("column definition packet too short"));
        }

        let character_set = buf.get_u16_le();
        let column_length = buf.get_u32_le();
        let type_id = buf.get_u8();
        let flags = ColumnFlags::from_bits_truncate(buf.get_u16_le());
        let decimals = buf.get_u8();

        Ok(Self {
            catalog,
            schema,
            table,
            org_table,
            name,
            org_name,
            character_set,
            column_length,
            type_id,
            flags,
            decimals,
        })
    }
}

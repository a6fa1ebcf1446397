use bytes::{Buf, Bytes};

use crate::error::Result;
use crate::io::{BufExt, ProtocolDecode};

// https://dev.mysql.com/doc/internals/en/com-query-response.html#packet-ProtocolText::ResultsetRow

/// One row of a result set, in the text protocol: every value arrives as a
/// length-encoded string or the NULL marker (`0xfb`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    values: Vec<Option<String>>,
}

impl Row {
    /// Value at `index`; `None` is SQL `NULL`, distinct from the empty string.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|value| value.as_deref())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Option<String>> {
        self.values
    }
}

impl ProtocolDecode<usize> for Row {
    fn decode_with(mut buf: Bytes, columns: usize) -> Result<Self> {
        let mut values = Vec::with_capacity(columns);

        for _ in 0..columns {
            if buf.is_empty() {
                return Err(err_protocol!("row packet ended before all columns were read"));
            }

            if buf[0] == 0xfb {
                // NULL is sent as 0xfb
                buf.advance(1);
                values.push(None);
            } else {
                values.push(Some(buf.get_str_lenenc()?));
            }
        }

        if !buf.is_empty() {
            return Err(err_protocol!("{} trailing bytes in row packet", buf.remaining()));
        }

        Ok(Self { values })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::Row;
    use crate::io::ProtocolDecode;

    #[test]
    fn decodes_text_row() {
        let buf = Bytes::from_static(b"\x011\x05alice\xfb");
        let row = Row::decode_with(buf, 3).unwrap();

        assert_eq!(row.get(0), Some("1"));
        assert_eq!(row.get(1), Some("alice"));
        assert_eq!(row.get(2), None);
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn all_nulls() {
        let buf = Bytes::from_static(b"\xfb\xfb\xfb\xfb");
        let row = Row::decode_with(buf, 4).unwrap();

        assert_eq!(row.values(), &[None, None, None, None]);
    }

    #[test]
    fn empty_string_is_not_null() {
        let buf = Bytes::from_static(b"\x00");
        let row = Row::decode_with(buf, 1).unwrap();

        assert_eq!(row.get(0), Some(""));
    }

    #[test]
    fn truncated_row_is_an_error() {
        let buf = Bytes::from_static(b"\x011");
        assert!(Row::decode_with(buf, 2).is_err());
    }
}

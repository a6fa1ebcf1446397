use bytes::{Buf, Bytes};
use memchr::memchr;

use crate::error::Result;

// <https://dev.mysql.com/doc/internals/en/integer.html#packet-Protocol::LengthEncodedInteger>
// <https://dev.mysql.com/doc/internals/en/string.html>

pub(crate) trait BufExt: Buf {
    // Read a length-encoded integer.
    // NOTE: 0xfb is only expected in a row to indicate NULL; it is the
    //       caller's responsibility to check for it before calling this.
    fn get_uint_lenenc(&mut self) -> Result<u64>;

    // Read a length-encoded byte sequence.
    fn get_bytes_lenenc(&mut self) -> Result<Bytes>;

    // Read a length-encoded string.
    fn get_str_lenenc(&mut self) -> Result<String>;

    // Read a NUL-terminated string, consuming the terminator.
    fn get_str_nul(&mut self) -> Result<String>;

    // Read a string of exactly `n` bytes.
    fn get_str(&mut self, n: usize) -> Result<String>;

    // Read the rest of the packet as a string.
    fn get_str_eof(&mut self) -> String;
}

impl BufExt for Bytes {
    fn get_uint_lenenc(&mut self) -> Result<u64> {
        if self.is_empty() {
            return Err(err_protocol!("unexpected end of packet in length-encoded integer"));
        }

        let (need, value) = match self.get_u8() {
            0xfc => (2, None),
            0xfd => (3, None),
            0xfe => (8, None),
            v => (0, Some(u64::from(v))),
        };

        if let Some(value) = value {
            return Ok(value);
        }

        if self.remaining() < need {
            return Err(err_protocol!("unexpected end of packet in length-encoded integer"));
        }

        Ok(match need {
            2 => u64::from(self.get_u16_le()),
            3 => self.get_uint_le(3),
            _ => self.get_u64_le(),
        })
    }

    fn get_bytes_lenenc(&mut self) -> Result<Bytes> {
        let size = self.get_uint_lenenc()?;
        let size = usize::try_from(size)
            .map_err(|_| err_protocol!("string length overflows usize: {}", size))?;

        if self.remaining() < size {
            return Err(err_protocol!(
                "length-encoded string of {} bytes but only {} remain",
                size,
                self.remaining()
            ));
        }

        Ok(self.split_to(size))
    }

    fn get_str_lenenc(&mut self) -> Result<String> {
        let bytes = self.get_bytes_lenenc()?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn get_str_nul(&mut self) -> Result<String> {
        let nul = memchr(b'\0', &self[..])
            .ok_or_else(|| err_protocol!("expected NUL-terminated string in packet"))?;

        let s = String::from_utf8_lossy(&self[..nul]).into_owned();
        self.advance(nul + 1);

        Ok(s)
    }

    fn get_str(&mut self, n: usize) -> Result<String> {
        if self.remaining() < n {
            return Err(err_protocol!("expected {} more bytes in packet", n));
        }

        let s = String::from_utf8_lossy(&self[..n]).into_owned();
        self.advance(n);

        Ok(s)
    }

    fn get_str_eof(&mut self) -> String {
        let s = String::from_utf8_lossy(self).into_owned();
        self.advance(self.remaining());

        s
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::BufExt;

    #[test]
    fn get_uint_lenenc() {
        let mut buf = Bytes::from_static(&[0xfa]);
        assert_eq!(buf.get_uint_lenenc().unwrap(), 250);

        let mut buf = Bytes::from_static(&[0xfc, 0xfb, 0x00]);
        assert_eq!(buf.get_uint_lenenc().unwrap(), 251);

        let mut buf = Bytes::from_static(&[0xfc, 0xff, 0xff]);
        assert_eq!(buf.get_uint_lenenc().unwrap(), 65535);

        let mut buf = Bytes::from_static(&[0xfd, 0x00, 0x00, 0x01]);
        assert_eq!(buf.get_uint_lenenc().unwrap(), 65536);

        let mut buf = Bytes::from_static(&[0xfd, 0xff, 0xff, 0xff]);
        assert_eq!(buf.get_uint_lenenc().unwrap(), 0xff_ff_ff);

        let mut buf =
            Bytes::from_static(&[0xfe, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(buf.get_uint_lenenc().unwrap(), u64::MAX);
    }

    #[test]
    fn get_uint_lenenc_truncated() {
        let mut buf = Bytes::from_static(&[0xfc, 0x01]);
        assert!(buf.get_uint_lenenc().is_err());

        let mut buf = Bytes::from_static(&[]);
        assert!(buf.get_uint_lenenc().is_err());
    }

    #[test]
    fn get_str_lenenc() {
        let mut buf = Bytes::from_static(b"\x05hello world");
        assert_eq!(buf.get_str_lenenc().unwrap(), "hello");
        assert_eq!(&buf[..], b" world");
    }

    #[test]
    fn get_str_nul() {
        let mut buf = Bytes::from_static(b"5.7.30\0rest");
        assert_eq!(buf.get_str_nul().unwrap(), "5.7.30");
        assert_eq!(&buf[..], b"rest");

        let mut buf = Bytes::from_static(b"no terminator");
        assert!(buf.get_str_nul().is_err());
    }

    #[test]
    fn get_str_eof() {
        let mut buf = Bytes::from_static(b"rest of packet");
        assert_eq!(buf.get_str_eof(), "rest of packet");
        assert!(buf.is_empty());
    }
}

use bytes::BufMut;

pub(crate) trait BufMutExt: BufMut {
    fn put_uint_lenenc(&mut self, value: u64);

    fn put_str_nul(&mut self, value: &str);

    fn put_bytes_lenenc(&mut self, value: &[u8]);

    fn put_str_lenenc(&mut self, value: &str);
}

impl BufMutExt for Vec<u8> {
    fn put_uint_lenenc(&mut self, value: u64) {
        // https://dev.mysql.com/doc/internals/en/integer.html
        // https://mariadb.com/kb/en/library/protocol-data-types/#length-encoded-integers

        if value < 0xfb {
            #[allow(clippy::cast_possible_truncation)]
            self.push(value as u8);
        } else if value <= u64::from(u16::MAX) {
            self.push(0xfc);
            #[allow(clippy::cast_possible_truncation)]
            self.extend(&(value as u16).to_le_bytes());
        } else if value <= 0xff_ff_ff {
            self.push(0xfd);
            #[allow(clippy::cast_possible_truncation)]
            self.extend(&(value as u32).to_le_bytes()[..3]);
        } else {
            self.push(0xfe);
            self.extend(&value.to_le_bytes());
        }
    }

    fn put_str_nul(&mut self, value: &str) {
        self.extend(value.as_bytes());
        self.push(0);
    }

    fn put_bytes_lenenc(&mut self, value: &[u8]) {
        self.put_uint_lenenc(value.len() as u64);
        self.extend(value);
    }

    fn put_str_lenenc(&mut self, value: &str) {
        self.put_bytes_lenenc(value.as_bytes());
    }
}

use bytes::{Buf, Bytes, BytesMut};

use crate::error::Result;

// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_basic_packets.html
// https://mariadb.com/kb/en/library/0-packet/#standard-packet

/// Payloads at least this large are split across packets.
pub(crate) const MAX_PAYLOAD: usize = 0xff_ff_ff;

/// Deframe the next logical packet from `buf`.
///
/// Returns `Ok(None)` until the packet (including every continuation chunk of
/// an oversized payload) is fully buffered; no bytes are consumed in that
/// case. On success returns the sequence number of the last chunk and the
/// joined payload.
pub(crate) fn read_packet(buf: &mut BytesMut) -> Result<Option<(u8, Bytes)>> {
    // Scan chunk headers first so an incomplete packet consumes nothing.
    let mut offset = 0;
    let mut chunks = Vec::new();
    let mut sequence_id;

    loop {
        if buf.len() < offset + 4 {
            return Ok(None);
        }

        let len = usize::from(buf[offset])
            | usize::from(buf[offset + 1]) << 8
            | usize::from(buf[offset + 2]) << 16;

        sequence_id = buf[offset + 3];

        if buf.len() < offset + 4 + len {
            return Ok(None);
        }

        chunks.push((offset + 4, len));
        offset += 4 + len;

        if len < MAX_PAYLOAD {
            break;
        }
    }

    let payload = if chunks.len() == 1 {
        let (start, len) = chunks[0];
        buf.advance(start);
        buf.split_to(len).freeze()
    } else {
        let mut joined = BytesMut::with_capacity(chunks.iter().map(|(_, len)| len).sum());
        for (start, len) in chunks {
            joined.extend_from_slice(&buf[start..start + len]);
        }
        buf.advance(offset);
        joined.freeze()
    };

    Ok(Some((sequence_id, payload)))
}

/// Frame `payload` into `buf`, splitting at the maximum packet size.
///
/// When the final chunk exactly fills a packet the server expects a trailing
/// zero-length packet to mark the end of the payload.
pub(crate) fn write_packet(buf: &mut Vec<u8>, sequence_id: &mut u8, payload: &[u8]) {
    let mut rest = payload;

    loop {
        let len = rest.len().min(MAX_PAYLOAD);

        #[allow(clippy::cast_possible_truncation)]
        buf.extend(&(len as u32).to_le_bytes()[..3]);
        buf.push(*sequence_id);
        buf.extend(&rest[..len]);

        *sequence_id = sequence_id.wrapping_add(1);
        rest = &rest[len..];

        if len < MAX_PAYLOAD {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::{read_packet, write_packet, MAX_PAYLOAD};

    #[test]
    fn round_trip() {
        let mut framed = Vec::new();
        let mut seq = 0;
        write_packet(&mut framed, &mut seq, b"\x03SELECT 1");

        assert_eq!(seq, 1);
        assert_eq!(&framed[..4], &[9, 0, 0, 0]);

        let mut buf = BytesMut::from(&framed[..]);
        let (sequence_id, payload) = read_packet(&mut buf).unwrap().unwrap();

        assert_eq!(sequence_id, 0);
        assert_eq!(&payload[..], b"\x03SELECT 1");
        assert!(buf.is_empty());
    }

    #[test]
    fn need_more() {
        let mut buf = BytesMut::from(&[5, 0, 0][..]);
        assert!(read_packet(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 3);

        let mut buf = BytesMut::from(&[5, 0, 0, 0, b'h', b'i'][..]);
        assert!(read_packet(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn empty_payload() {
        let mut framed = Vec::new();
        let mut seq = 3;
        write_packet(&mut framed, &mut seq, b"");

        assert_eq!(framed, vec![0, 0, 0, 3]);

        let mut buf = BytesMut::from(&framed[..]);
        let (sequence_id, payload) = read_packet(&mut buf).unwrap().unwrap();
        assert_eq!(sequence_id, 3);
        assert!(payload.is_empty());
    }

    #[test]
    fn split_at_max_payload() {
        // A payload of exactly the maximum size must be followed by an empty
        // terminator packet.
        let payload = vec![0xaa; MAX_PAYLOAD];
        let mut framed = Vec::new();
        let mut seq = 0;
        write_packet(&mut framed, &mut seq, &payload);

        assert_eq!(seq, 2);
        assert_eq!(framed.len(), 4 + MAX_PAYLOAD + 4);
        assert_eq!(&framed[..4], &[0xff, 0xff, 0xff, 0]);
        assert_eq!(&framed[4 + MAX_PAYLOAD..], &[0, 0, 0, 1]);

        let mut buf = BytesMut::from(&framed[..]);
        let (sequence_id, joined) = read_packet(&mut buf).unwrap().unwrap();
        assert_eq!(sequence_id, 1);
        assert_eq!(joined.len(), MAX_PAYLOAD);
        assert!(buf.is_empty());
    }

    #[test]
    fn joins_continuation_chunks() {
        let payload = vec![0x5a; MAX_PAYLOAD + 17];
        let mut framed = Vec::new();
        let mut seq = 0;
        write_packet(&mut framed, &mut seq, &payload);

        assert_eq!(seq, 2);

        // Incomplete continuation: nothing is consumed.
        let mut buf = BytesMut::from(&framed[..framed.len() - 1]);
        assert!(read_packet(&mut buf).unwrap().is_none());

        let mut buf = BytesMut::from(&framed[..]);
        let (sequence_id, joined) = read_packet(&mut buf).unwrap().unwrap();
        assert_eq!(sequence_id, 1);
        assert_eq!(joined.len(), MAX_PAYLOAD + 17);
        assert!(joined.iter().all(|&b| b == 0x5a));
    }
}

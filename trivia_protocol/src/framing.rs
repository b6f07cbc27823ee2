// Newline-delimited message framing over TCP.
//
// Every message is one JSON object followed by a `\n` delimiter. The caller
// handles JSON serialization separately — `write_frame` and `read_frame`
// operate on raw `&[u8]` / `Vec<u8>`, keeping this module format-agnostic.
//
// A frame may be split across TCP segments, so `read_frame` accumulates
// bytes from the underlying `BufRead` until it sees the delimiter. A
// `MAX_FRAME_SIZE` constant bounds the accumulation so a peer that never
// sends a newline cannot force unbounded allocation.

use std::io::{self, BufRead, Write};

/// Maximum allowed frame size (64 KB). Session snapshots with a full player
/// roster are the largest expected messages; 64 KB is generous headroom.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Write one newline-delimited frame: payload bytes, then `\n`.
///
/// Returns `InvalidInput` if the payload exceeds `MAX_FRAME_SIZE` or
/// contains a raw newline (which would split it into two frames on the
/// wire). serde_json never emits raw newlines, so the latter only trips on
/// misuse.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame too large: {} bytes (max {MAX_FRAME_SIZE})", payload.len()),
        ));
    }
    if payload.contains(&b'\n') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "frame payload contains a raw newline",
        ));
    }
    writer.write_all(payload)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Read one newline-delimited frame, reassembling it across however many
/// reads the transport needs. The returned bytes exclude the delimiter.
///
/// Returns `UnexpectedEof` if the stream closes before a delimiter arrives
/// (including a clean close mid-frame). Returns `InvalidData` once the
/// accumulated frame exceeds `MAX_FRAME_SIZE`.
pub fn read_frame<R: BufRead>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut frame = Vec::new();
    loop {
        let (done, used) = {
            let available = reader.fill_buf()?;
            if available.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream closed before frame delimiter",
                ));
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    frame.extend_from_slice(&available[..pos]);
                    (true, pos + 1)
                }
                None => {
                    frame.extend_from_slice(available);
                    (false, available.len())
                }
            }
        };
        reader.consume(used);
        if frame.len() > MAX_FRAME_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame too large: {} bytes (max {MAX_FRAME_SIZE})", frame.len()),
            ));
        }
        if done {
            return Ok(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Cursor, Read};

    use super::*;

    #[test]
    fn roundtrip_simple_frame() {
        let original = br#"{"type":"ping","data":{}}"#;
        let mut buf = Vec::new();
        write_frame(&mut buf, original).unwrap();

        let mut reader = Cursor::new(&buf);
        let recovered = read_frame(&mut reader).unwrap();
        assert_eq!(recovered, original);
    }

    #[test]
    fn roundtrip_empty_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"").unwrap();

        let mut reader = Cursor::new(&buf);
        let recovered = read_frame(&mut reader).unwrap();
        assert!(recovered.is_empty());
    }

    #[test]
    fn multiple_frames_in_sequence() {
        let frames: Vec<&[u8]> = vec![b"first", b"second", b"third"];
        let mut buf = Vec::new();
        for frame in &frames {
            write_frame(&mut buf, frame).unwrap();
        }

        let mut reader = Cursor::new(&buf);
        for expected in &frames {
            let recovered = read_frame(&mut reader).unwrap();
            assert_eq!(recovered, *expected);
        }
    }

    #[test]
    fn rejects_oversized_write() {
        let big = vec![b'x'; MAX_FRAME_SIZE + 1];
        let mut buf = Vec::new();
        let err = write_frame(&mut buf, &big).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn rejects_embedded_newline() {
        let mut buf = Vec::new();
        let err = write_frame(&mut buf, b"two\nframes").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn rejects_oversized_read() {
        // A stream that never sends a delimiter.
        let mut data = vec![b'x'; MAX_FRAME_SIZE + 16];
        data.push(b'\n');
        let mut reader = Cursor::new(data);
        let err = read_frame(&mut reader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn eof_mid_frame() {
        let mut reader = Cursor::new(b"partial frame without delimiter".to_vec());
        let err = read_frame(&mut reader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    /// A reader that yields at most `chunk` bytes per `read()` call,
    /// simulating TCP segmentation splitting frames at arbitrary points.
    struct ChunkedReader {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let remaining = &self.data[self.pos..];
            let n = remaining.len().min(self.chunk).min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn reassembles_frames_split_across_reads() {
        let frames: Vec<Vec<u8>> = (0..8)
            .map(|i| format!(r#"{{"type":"ping","seq":{i}}}"#).into_bytes())
            .collect();
        let mut wire = Vec::new();
        for frame in &frames {
            write_frame(&mut wire, frame).unwrap();
        }

        // Exercise several pathological chunk sizes, including 1 byte.
        for chunk in [1, 2, 3, 7, 16] {
            let inner = ChunkedReader {
                data: wire.clone(),
                pos: 0,
                chunk,
            };
            let mut reader = BufReader::with_capacity(4, inner);
            for expected in &frames {
                let recovered = read_frame(&mut reader).unwrap();
                assert_eq!(&recovered, expected, "chunk size {chunk}");
            }
            assert_eq!(
                read_frame(&mut reader).unwrap_err().kind(),
                io::ErrorKind::UnexpectedEof
            );
        }
    }
}

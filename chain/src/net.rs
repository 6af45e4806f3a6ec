//! Newline-delimited JSON framing over blocking TCP sockets (spec §4.2
//! "Message framer").
//!
//! Every inter-process message on the peer-server socket and the tracker
//! socket is a single JSON object terminated by `\n`. This mirrors the
//! line-oriented RPC framing `stratumserver.rs` uses over a
//! `BufReader`-wrapped `TcpStream` in the pack, generalized to any
//! `Read`/`Write` pair so the same helpers serve both the tracker and
//! peer binaries.

use std::io::{self, BufRead, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Reads the next non-empty line from `reader` and decodes it as JSON.
///
/// Returns `Ok(None)` on a clean EOF (the peer hung up). Empty lines are
/// skipped per spec §4.2. Malformed JSON is a protocol violation; the
/// caller is expected to close the connection on `Err`.
pub fn read_json_line<R, T>(reader: &mut R) -> io::Result<Option<T>>
where
    R: BufRead,
    T: DeserializeOwned,
{
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            continue;
        }
        let value = serde_json::from_str(trimmed)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        return Ok(Some(value));
    }
}

/// Encodes `value` as compact JSON followed by `\n` and writes+flushes it
/// to `writer`.
pub fn write_json_line<W, T>(writer: &mut W, value: &T) -> io::Result<()>
where
    W: Write,
    T: Serialize,
{
    let mut encoded =
        serde_json::to_vec(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    encoded.push(b'\n');
    writer.write_all(&encoded)?;
    writer.flush()
}

/// Opens a short-lived TCP connection to `addr`, writes a single
/// newline-terminated JSON message, and closes the connection
/// unconditionally (spec §4.2/§5 `_send_once`) — whether the send
/// succeeds or fails, the socket is not kept open.
pub fn send_once<A, T>(addr: A, value: &T) -> io::Result<()>
where
    A: ToSocketAddrs,
    T: Serialize,
{
    let mut stream = TcpStream::connect(addr)?;
    stream.set_write_timeout(Some(Duration::from_secs(5)))?;
    let result = write_json_line(&mut stream, value);
    let _ = stream.shutdown(std::net::Shutdown::Both);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    #[test]
    fn write_then_read_json_line_roundtrips() {
        let mut buf: Vec<u8> = Vec::new();
        write_json_line(&mut buf, &vec![1, 2, 3]).unwrap();
        assert_eq!(buf, b"[1,2,3]\n");

        let mut reader = BufReader::new(buf.as_slice());
        let decoded: Option<Vec<i32>> = read_json_line(&mut reader).unwrap();
        assert_eq!(decoded, Some(vec![1, 2, 3]));
    }

    #[test]
    fn read_json_line_skips_blank_lines() {
        let input = b"\n\n{\"a\":1}\n";
        let mut reader = BufReader::new(&input[..]);
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Payload {
            a: i32,
        }
        let decoded: Option<Payload> = read_json_line(&mut reader).unwrap();
        assert_eq!(decoded, Some(Payload { a: 1 }));
    }

    #[test]
    fn read_json_line_returns_none_on_eof() {
        let input: &[u8] = b"";
        let mut reader = BufReader::new(input);
        let decoded: Option<serde_json::Value> = read_json_line(&mut reader).unwrap();
        assert_eq!(decoded, None);
    }

    #[test]
    fn read_json_line_rejects_malformed_json() {
        let input = b"not json\n";
        let mut reader = BufReader::new(&input[..]);
        let result: io::Result<Option<serde_json::Value>> = read_json_line(&mut reader);
        assert!(result.is_err());
    }
}

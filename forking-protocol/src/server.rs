use crate::messages::{ControlResponse, ProtocolError};
use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

/// Longest request line the server is willing to buffer, newline included.
pub const MAX_REQUEST_LEN: u64 = 4096;

/// Upper bound on input thrown away after an oversized request.
const MAX_DISCARD_LEN: u64 = 64 * 1024;

/// Server side of one accepted control connection.
///
/// Lives for exactly one request: read a line, write a line, close.
pub struct ControlConnection {
    reader: BufReader<TcpStream>,
    peer: Option<SocketAddr>,
    unread_input: bool,
}

impl ControlConnection {
    /// Wraps an accepted stream.
    ///
    /// # Arguments
    ///
    /// * `stream` - The accepted connection. It is switched back to blocking mode.
    /// * `request_timeout` - Upper bound on waiting for the request line.
    pub fn new(stream: TcpStream, request_timeout: Duration) -> io::Result<Self> {
        stream.set_nonblocking(false)?;
        // A zero read timeout is rejected by the OS; treat it as "as short as possible".
        stream.set_read_timeout(Some(request_timeout.max(Duration::from_millis(1))))?;
        let peer = stream.peer_addr().ok();
        Ok(Self {
            reader: BufReader::new(stream),
            peer,
            unread_input: false,
        })
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Reads the request line, including its newline if one was sent.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Ok(line)))` when a line arrived.
    /// * `Ok(Some(Err(_)))` when bytes arrived that can never be a command:
    ///   more than [`MAX_REQUEST_LEN`] of them, or not UTF-8.
    /// * `Ok(None)` when the peer closed without sending anything.
    /// * `Err` on IO failure; see [`is_timeout`] for the timeout case.
    pub fn read_request(&mut self) -> io::Result<Option<Result<String, ProtocolError>>> {
        let mut line = Vec::new();
        let read = (&mut self.reader)
            .take(MAX_REQUEST_LEN + 1)
            .read_until(b'\n', &mut line)?;
        if read == 0 {
            return Ok(None);
        }
        if line.len() as u64 > MAX_REQUEST_LEN {
            self.unread_input = true;
            return Ok(Some(Err(ProtocolError::TooLong)));
        }
        Ok(Some(String::from_utf8(line).map_err(|_| ProtocolError::NotUtf8)))
    }

    /// Writes the response line and flushes it to the peer.
    pub fn send_response(&mut self, response: &ControlResponse) -> io::Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(response.to_line().as_bytes())?;
        stream.flush()
    }

    /// Closes both directions. Errors are ignored: the peer may already be gone.
    ///
    /// After an oversized request the rest of the peer's input is discarded
    /// first, bounded by the read timeout. Closing over unread data sends a
    /// reset, which may destroy the response before the peer reads it.
    pub fn close(mut self) {
        if self.unread_input {
            let _ = self.reader.get_ref().shutdown(Shutdown::Write);
            let mut rest = (&mut self.reader).take(MAX_DISCARD_LEN);
            let _ = io::copy(&mut rest, &mut io::sink());
        }
        let _ = self.reader.get_ref().shutdown(Shutdown::Both);
    }
}

/// Whether `err` is the read timeout firing rather than a real failure.
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (server, client)
    }

    #[test]
    fn test_one_request_one_response() {
        let (server, mut client) = pair();
        let mut conn = ControlConnection::new(server, Duration::from_secs(1)).unwrap();

        client.write_all(b"hello\n").unwrap();
        assert_eq!(conn.read_request().unwrap(), Some(Ok("hello\n".to_string())));

        conn.send_response(&ControlResponse::Alive).unwrap();
        conn.close();

        let mut answer = String::new();
        client.read_to_string(&mut answer).unwrap();
        assert_eq!(answer, "yep, still alive\n");
    }

    #[test]
    fn test_silent_peer_times_out() {
        let (server, _client) = pair();
        let mut conn = ControlConnection::new(server, Duration::from_millis(50)).unwrap();

        let err = conn.read_request().unwrap_err();
        assert!(is_timeout(&err), "unexpected error kind {:?}", err.kind());
    }

    #[test]
    fn test_closed_peer_reads_none() {
        let (server, client) = pair();
        drop(client);

        let mut conn = ControlConnection::new(server, Duration::from_secs(1)).unwrap();
        assert_eq!(conn.read_request().unwrap(), None);
    }

    #[test]
    fn test_oversized_request_is_rejected_whole() {
        let (server, mut client) = pair();
        let mut conn = ControlConnection::new(server, Duration::from_secs(1)).unwrap();

        let mut request = b"fork 2".to_vec();
        request.extend(std::iter::repeat(b' ').take(5000));
        request.extend(b"x\n");
        client.write_all(&request).unwrap();
        client.shutdown(Shutdown::Write).unwrap();

        assert_eq!(conn.read_request().unwrap(), Some(Err(ProtocolError::TooLong)));
        conn.send_response(&ControlResponse::failure(ProtocolError::TooLong))
            .unwrap();
        conn.close();

        let mut answer = String::new();
        client.read_to_string(&mut answer).unwrap();
        assert_eq!(answer, "FAILURE: request too long\n");
    }

    #[test]
    fn test_request_at_the_limit_is_accepted() {
        let (server, mut client) = pair();
        let mut conn = ControlConnection::new(server, Duration::from_secs(1)).unwrap();

        let mut request = vec![b'a'; MAX_REQUEST_LEN as usize - 1];
        request.push(b'\n');
        client.write_all(&request).unwrap();

        let line = conn.read_request().unwrap().unwrap().unwrap();
        assert_eq!(line.len() as u64, MAX_REQUEST_LEN);
    }

    #[test]
    fn test_binary_request_is_not_utf8() {
        let (server, mut client) = pair();
        let mut conn = ControlConnection::new(server, Duration::from_secs(1)).unwrap();

        client.write_all(b"\xff\xfe\n").unwrap();
        assert_eq!(conn.read_request().unwrap(), Some(Err(ProtocolError::NotUtf8)));
    }
}

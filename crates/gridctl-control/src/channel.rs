//! TCP request/reply transport channel.
//!
//! Strict alternation: each connection carries exactly one request frame
//! followed by exactly one reply frame. A server binds one long-lived
//! [`ControlListener`]; anyone forwarding a command opens a short-lived
//! connection with [`request_reply`].
//!
//! Frames are length-prefixed (4-byte LE length + payload). The payload is
//! opaque here; it is always a ciphertext produced by [`crate::protocol`].

use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, trace};

use gridctl_core::constants::{FRAME_HEADER_LEN, MAX_FRAME_SIZE};

/// Errors that can occur on the transport channel.
#[derive(Debug)]
pub enum ChannelError {
    /// I/O error.
    Io(std::io::Error),
    /// Framing error.
    Codec(String),
    /// An operation did not complete in time.
    Timeout(&'static str),
    /// Peer closed the connection before a full frame arrived.
    Closed,
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::Io(e) => write!(f, "I/O error: {}", e),
            ChannelError::Codec(msg) => write!(f, "codec error: {}", msg),
            ChannelError::Timeout(op) => write!(f, "{} timed out", op),
            ChannelError::Closed => write!(f, "connection closed by peer"),
        }
    }
}

impl std::error::Error for ChannelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChannelError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ChannelError {
    fn from(e: std::io::Error) -> Self {
        ChannelError::Io(e)
    }
}

impl From<ChannelError> for gridctl_core::Error {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::Io(io_err) => gridctl_core::Error::Io(io_err),
            ChannelError::Codec(msg) => gridctl_core::Error::Codec { message: msg },
            ChannelError::Timeout(_) => gridctl_core::Error::Timeout,
            ChannelError::Closed => gridctl_core::Error::Transport {
                message: "connection closed by peer".into(),
            },
        }
    }
}

/// Result type for channel operations.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

/// Frame a payload.
pub fn encode_frame(payload: &[u8]) -> ChannelResult<Bytes> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(ChannelError::Codec(format!(
            "frame too large: {} bytes (max {})",
            payload.len(),
            MAX_FRAME_SIZE
        )));
    }

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.put_u32_le(payload.len() as u32);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Try to take one complete frame off the front of `buf`.
pub fn try_decode_frame(buf: &mut BytesMut) -> ChannelResult<Option<Bytes>> {
    if buf.len() < FRAME_HEADER_LEN {
        return Ok(None);
    }

    let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

    if len > MAX_FRAME_SIZE {
        return Err(ChannelError::Codec(format!(
            "frame length {} exceeds maximum {}",
            len, MAX_FRAME_SIZE
        )));
    }

    if buf.len() < FRAME_HEADER_LEN + len {
        return Ok(None);
    }

    buf.advance(FRAME_HEADER_LEN);
    Ok(Some(buf.split_to(len).freeze()))
}

async fn read_frame<S: AsyncRead + Unpin>(stream: &mut S) -> ChannelResult<Bytes> {
    let mut buf = BytesMut::with_capacity(1024);
    loop {
        if let Some(frame) = try_decode_frame(&mut buf)? {
            return Ok(frame);
        }

        let n = stream.read_buf(&mut buf).await?;
        if n == 0 {
            return Err(ChannelError::Closed);
        }
    }
}

async fn write_frame<S: AsyncWrite + Unpin>(stream: &mut S, payload: &[u8]) -> ChannelResult<()> {
    let frame = encode_frame(payload)?;
    stream.write_all(&frame).await?;
    stream.flush().await?;
    Ok(())
}

async fn with_timeout<T, F>(op: &'static str, timeout: Duration, fut: F) -> ChannelResult<T>
where
    F: std::future::Future<Output = ChannelResult<T>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| ChannelError::Timeout(op))?
}

/// Long-lived receiving end of a server's control channel.
pub struct ControlListener {
    listener: TcpListener,
    timeout: Duration,
}

impl ControlListener {
    /// Bind on `addr`; `timeout` bounds reading a request and writing its reply.
    pub async fn bind(addr: &str, timeout: Duration) -> ChannelResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        debug!(addr = %listener.local_addr()?, "Control channel bound");
        Ok(Self { listener, timeout })
    }

    /// Adopt an already bound std listener.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_std(listener: std::net::TcpListener, timeout: Duration) -> ChannelResult<Self> {
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener: TcpListener::from_std(listener)?,
            timeout,
        })
    }

    pub fn local_addr(&self) -> ChannelResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait up to `wait` for the next request.
    ///
    /// Returns `Ok(None)` when no request arrived in time so the caller can
    /// re-check its own state and receive again.
    pub async fn recv(&self, wait: Duration) -> ChannelResult<Option<InboundRequest>> {
        let (mut stream, peer) = match tokio::time::timeout(wait, self.listener.accept()).await {
            Ok(accepted) => accepted?,
            Err(_) => return Ok(None),
        };

        no_linger_stream(&stream)?;
        let payload = with_timeout("receive", self.timeout, read_frame(&mut stream)).await?;
        trace!(%peer, len = payload.len(), "Control request received");

        Ok(Some(InboundRequest {
            stream,
            peer,
            payload,
            timeout: self.timeout,
        }))
    }
}

/// One received request, answered exactly once through [`InboundRequest::reply`].
pub struct InboundRequest {
    stream: TcpStream,
    peer: SocketAddr,
    payload: Bytes,
    timeout: Duration,
}

impl InboundRequest {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Send the reply and close the connection.
    pub async fn reply(mut self, payload: &[u8]) -> ChannelResult<()> {
        with_timeout("send", self.timeout, write_frame(&mut self.stream, payload)).await?;
        let _ = self.stream.shutdown().await;
        Ok(())
    }
}

/// One request/reply round trip on a short-lived connection.
///
/// Connect, send and receive are each bounded by `timeout`. The socket closes
/// without lingering once the reply is read.
pub async fn request_reply(addr: &str, payload: &[u8], timeout: Duration) -> ChannelResult<Bytes> {
    let mut stream = with_timeout("connect", timeout, connect(addr)).await?;
    with_timeout("send", timeout, write_frame(&mut stream, payload)).await?;
    let reply = with_timeout("receive", timeout, read_frame(&mut stream)).await?;
    trace!(addr, len = reply.len(), "Control reply received");
    Ok(reply)
}

/// Connect to the first address of `addr` that accepts, with linger disabled.
async fn connect(addr: &str) -> ChannelResult<TcpStream> {
    let mut last_err = None;
    for target in tokio::net::lookup_host(addr).await? {
        let socket = if target.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        no_linger_socket(&socket)?;
        match socket.connect(target).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                trace!(%target, error = %e, "Connect attempt failed");
                last_err = Some(e);
            }
        }
    }

    Err(ChannelError::Io(last_err.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no address for {}", addr),
        )
    })))
}

// Linger 0 resets the connection on close instead of blocking, which is the
// case tokio's deprecation of `set_linger` warns about.
#[allow(deprecated)]
fn no_linger_socket(socket: &TcpSocket) -> std::io::Result<()> {
    socket.set_linger(Some(Duration::ZERO))
}

#[allow(deprecated)]
fn no_linger_stream(stream: &TcpStream) -> std::io::Result<()> {
    stream.set_linger(Some(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn frame_roundtrip() {
        let frame = encode_frame(b"sealed").unwrap();
        assert_eq!(&frame[..4], &6u32.to_le_bytes());

        let mut buf = BytesMut::from(&frame[..]);
        let payload = try_decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(&payload[..], b"sealed");
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_frame_needs_more() {
        let frame = encode_frame(b"sealed").unwrap();
        let mut buf = BytesMut::from(&frame[..7]);
        assert!(try_decode_frame(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 7);
    }

    #[test]
    fn oversized_frame_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32_le((MAX_FRAME_SIZE + 1) as u32);
        assert!(matches!(
            try_decode_frame(&mut buf),
            Err(ChannelError::Codec(_))
        ));
        assert!(encode_frame(&vec![0u8; MAX_FRAME_SIZE + 1]).is_err());
    }

    #[test]
    fn empty_frame_is_valid() {
        let mut buf = BytesMut::from(&encode_frame(b"").unwrap()[..]);
        assert!(try_decode_frame(&mut buf).unwrap().unwrap().is_empty());
    }

    #[test]
    fn error_display() {
        assert_eq!(ChannelError::Timeout("connect").to_string(), "connect timed out");
        assert_eq!(ChannelError::Closed.to_string(), "connection closed by peer");
    }

    #[test]
    fn channel_error_into_core() {
        let err: gridctl_core::Error = ChannelError::Timeout("receive").into();
        assert!(matches!(err, gridctl_core::Error::Timeout));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn request_reply_over_loopback() {
        let listener = ControlListener::bind("127.0.0.1:0", TIMEOUT).await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let request = listener.recv(TIMEOUT).await.unwrap().unwrap();
            assert_eq!(request.payload(), b"ping");
            request.reply(b"pong").await.unwrap();
        });

        let reply = request_reply(&addr, b"ping", TIMEOUT).await.unwrap();
        assert_eq!(&reply[..], b"pong");
        server.await.unwrap();
    }

    #[tokio::test]
    #[allow(deprecated)]
    async fn both_ends_close_without_lingering() {
        let listener = ControlListener::bind("127.0.0.1:0", TIMEOUT).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = connect(&addr.to_string()).await.unwrap();
            assert_eq!(stream.linger().unwrap(), Some(Duration::ZERO));
            write_frame(&mut stream, b"ping").await.unwrap();
            read_frame(&mut stream).await.unwrap()
        });

        let request = listener.recv(TIMEOUT).await.unwrap().unwrap();
        assert_eq!(request.stream.linger().unwrap(), Some(Duration::ZERO));
        request.reply(b"pong").await.unwrap();

        assert_eq!(&client.await.unwrap()[..], b"pong");
    }

    #[tokio::test]
    async fn recv_times_out_without_request() {
        let listener = ControlListener::bind("127.0.0.1:0", TIMEOUT).await.unwrap();
        let got = listener.recv(Duration::from_millis(20)).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let addr = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().to_string()
        };
        assert!(request_reply(&addr, b"ping", TIMEOUT).await.is_err());
    }

    #[tokio::test]
    async fn peer_that_never_replies_times_out() {
        let listener = ControlListener::bind("127.0.0.1:0", TIMEOUT).await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let request = listener.recv(TIMEOUT).await.unwrap().unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            drop(request);
        });

        let err = request_reply(&addr, b"ping", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Timeout("receive")));
        server.await.unwrap();
    }
}

//! Connection infrastructure: the duplex channel to the desktop controller.
//!
//! The device connects out to the controller and writes the handshake. The
//! stream is then split: the read half feeds the control decoder and the
//! write half carries video frames.
//!
//! Architecture:
//! - `DesktopConnection` performs the handshake over any async byte stream.
//! - `ControlReader` implements `ControlSource` for the input dispatcher.
//! - `VideoSink` implements `FrameSink` for the video streamer; a mutex
//!   keeps each header and its payload together on the wire.
//! - `ConnectionCloser` tears the connection down once the session is over:
//!   outbound first so buffered frames reach the controller, then both
//!   directions of the socket.

use std::io;
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use tapcast_core::protocol::handshake::encode_handshake;
use tapcast_core::protocol::video::FrameHeader;
use tapcast_core::{ControlMessage, ControlMessageReader, Size};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::application::dispatch_input::{ChannelError, ControlSource};
use crate::application::stream_video::FrameSink;

/// Errors raised while opening the connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The controller could not be reached.
    #[error("failed to connect to controller at {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// The handshake could not be written.
    #[error("failed to send handshake: {0}")]
    Handshake(#[source] io::Error),
}

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A connection that has completed the handshake.
pub struct DesktopConnection {
    control: ControlReader,
    video: VideoSink,
    /// Second handle on the TCP socket, used only to shut it down.
    socket: Option<std::net::TcpStream>,
}

impl DesktopConnection {
    /// Connects to the controller listening on `addr` and sends the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the TCP connection or the handshake
    /// write fails.
    pub async fn connect(
        addr: SocketAddr,
        device_name: &str,
        video_size: Size,
    ) -> Result<Self, ConnectionError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ConnectionError::ConnectFailed { addr, source })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not disable Nagle's algorithm: {e}");
        }
        info!("connected to controller at {addr}");

        let (stream, socket) = duplicate_socket(stream)
            .map_err(|source| ConnectionError::ConnectFailed { addr, source })?;
        let mut connection = Self::open(stream, device_name, video_size).await?;
        connection.socket = Some(socket);
        Ok(connection)
    }

    /// Sends the handshake over an already established `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Handshake`] if the write fails.
    pub async fn open<S>(stream: S, device_name: &str, video_size: Size) -> Result<Self, ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read, mut write) = tokio::io::split(stream);
        let handshake = encode_handshake(device_name, video_size);
        write.write_all(&handshake).await.map_err(ConnectionError::Handshake)?;
        write.flush().await.map_err(ConnectionError::Handshake)?;
        debug!(device_name, %video_size, "handshake sent");

        Ok(Self {
            control: ControlReader::new(Box::new(read)),
            video: VideoSink::new(Box::new(write)),
            socket: None,
        })
    }

    /// Splits the connection into its control and video halves, plus the
    /// handle that shuts both down.
    pub fn split(self) -> (ControlReader, VideoSink, ConnectionCloser) {
        let closer = ConnectionCloser {
            video: self.video.clone(),
            socket: self.socket,
        };
        (self.control, self.video, closer)
    }
}

/// Returns `stream` together with a std handle on the same socket.
fn duplicate_socket(stream: TcpStream) -> io::Result<(TcpStream, std::net::TcpStream)> {
    let std_stream = stream.into_std()?;
    let socket = std_stream.try_clone()?;
    Ok((TcpStream::from_std(std_stream)?, socket))
}

// ── Teardown ──────────────────────────────────────────────────────────────────

/// Orderly teardown of a [`DesktopConnection`].
///
/// Call once the session has stopped using both halves. For a TCP
/// connection both directions are shut down even while the halves are still
/// alive; for other streams only the outbound direction is closed and the
/// inbound side goes away with its [`ControlReader`].
pub struct ConnectionCloser {
    video: VideoSink,
    socket: Option<std::net::TcpStream>,
}

impl ConnectionCloser {
    /// Half-closes the outbound direction, then shuts down both directions
    /// and releases the socket handle.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error hit. Shutting down a socket the
    /// controller already dropped is not an error.
    pub async fn shutdown(self) -> io::Result<()> {
        let outbound = match self.video.close().await {
            Err(e) if is_disconnect(&e) || e.kind() == io::ErrorKind::NotConnected => Ok(()),
            result => result,
        };
        if let Some(socket) = self.socket {
            match socket.shutdown(Shutdown::Both) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotConnected => {}
                Err(e) => return Err(e),
            }
        }
        debug!("controller connection shut down");
        outbound
    }
}

// ── Control half ──────────────────────────────────────────────────────────────

/// Reads control messages from the inbound byte stream.
pub struct ControlReader {
    read: BoxedReader,
    decoder: ControlMessageReader,
}

impl ControlReader {
    pub fn new(read: BoxedReader) -> Self {
        Self {
            read,
            decoder: ControlMessageReader::new(),
        }
    }
}

#[async_trait]
impl ControlSource for ControlReader {
    async fn next_message(&mut self) -> Result<Option<ControlMessage>, ChannelError> {
        loop {
            let before = self.decoder.buffered();
            if let Some(msg) = self.decoder.next_message() {
                return Ok(Some(msg));
            }
            if self.decoder.buffered() < before {
                // an unknown tag byte was dropped
                continue;
            }

            let spare = self.decoder.spare_capacity()?;
            let n = match self.read.read(spare).await {
                Ok(n) => n,
                Err(e) if is_disconnect(&e) => {
                    debug!("control channel reset: {e}");
                    0
                }
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                return Ok(None);
            }
            self.decoder.commit(n);
        }
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

// ── Video half ────────────────────────────────────────────────────────────────

/// Writes framed video packets to the outbound byte stream.
#[derive(Clone)]
pub struct VideoSink {
    write: Arc<Mutex<BoxedWriter>>,
}

impl VideoSink {
    pub fn new(write: BoxedWriter) -> Self {
        Self {
            write: Arc::new(Mutex::new(write)),
        }
    }

    /// Shuts down the outbound direction.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the shutdown fails.
    pub async fn close(&self) -> io::Result<()> {
        self.write.lock().await.shutdown().await
    }
}

#[async_trait]
impl FrameSink for VideoSink {
    async fn send_frame(&self, header: FrameHeader, payload: &[u8]) -> io::Result<()> {
        let mut write = self.write.lock().await;
        write.write_all(&header.encode()).await?;
        write.write_all(payload).await?;
        write.flush().await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tapcast_core::encode_control_message;
    use tapcast_core::protocol::messages::HANDSHAKE_LEN;
    use tokio::net::TcpListener;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_open_writes_exact_handshake() {
        // Arrange
        let expected = encode_handshake("Pixel", Size::new(1080, 2400));
        let mock = Builder::new().write(&expected).build();

        // Act / Assert – the mock panics on any unexpected byte
        let conn = DesktopConnection::open(mock, "Pixel", Size::new(1080, 2400)).await;
        assert!(conn.is_ok());
    }

    #[tokio::test]
    async fn test_control_reader_reassembles_split_messages_then_reports_close() {
        // Arrange
        let handshake = encode_handshake("d", Size::new(8, 8));
        let bytes = encode_control_message(&ControlMessage::StopStreaming)
            .into_iter()
            .chain([0xEE])
            .chain(encode_control_message(&ControlMessage::StopStreaming))
            .collect::<Vec<u8>>();
        let mock = Builder::new()
            .write(&handshake)
            .read(&bytes[..1])
            .read(&bytes[1..])
            .build();
        let (mut control, _video, _closer) = DesktopConnection::open(mock, "d", Size::new(8, 8))
            .await
            .unwrap()
            .split();

        // Act
        let first = control.next_message().await.unwrap();
        let second = control.next_message().await.unwrap();
        let end = control.next_message().await.unwrap();

        // Assert
        assert_eq!(first, Some(ControlMessage::StopStreaming));
        assert_eq!(second, Some(ControlMessage::StopStreaming));
        assert_eq!(end, None);
    }

    #[tokio::test]
    async fn test_connection_reset_is_treated_as_close() {
        let mock = Builder::new()
            .read_error(io::Error::from(io::ErrorKind::ConnectionReset))
            .build();
        let mut control = ControlReader::new(Box::new(mock));

        assert_eq!(control.next_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_other_read_errors_are_reported() {
        let mock = Builder::new()
            .read_error(io::Error::from(io::ErrorKind::PermissionDenied))
            .build();
        let mut control = ControlReader::new(Box::new(mock));

        let result = control.next_message().await;

        assert!(matches!(result, Err(ChannelError::Io(_))));
    }

    #[tokio::test]
    async fn test_video_sink_writes_header_then_payload() {
        // Arrange
        let (local, mut remote) = tokio::io::duplex(256);
        let sink = VideoSink::new(Box::new(local));

        // Act
        sink.send_frame(FrameHeader { pts: -1, len: 3 }, &[7, 8, 9]).await.unwrap();
        sink.close().await.unwrap();
        let mut received = Vec::new();
        remote.read_to_end(&mut received).await.unwrap();

        // Assert
        assert_eq!(&received[..8], &(-1i64).to_be_bytes());
        assert_eq!(&received[8..12], &3u32.to_be_bytes());
        assert_eq!(&received[12..], &[7, 8, 9]);
    }

    #[tokio::test]
    async fn test_connect_sends_handshake_over_tcp() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Act
        let (conn, accepted) = tokio::join!(
            DesktopConnection::connect(addr, "tablet", Size::new(720, 1280)),
            listener.accept()
        );
        let (mut peer, _) = accepted.unwrap();
        let mut handshake = [0u8; HANDSHAKE_LEN];
        peer.read_exact(&mut handshake).await.unwrap();

        // Assert
        assert!(conn.is_ok());
        assert_eq!(handshake, encode_handshake("tablet", Size::new(720, 1280)));
    }

    #[tokio::test]
    async fn test_shutdown_closes_both_directions_while_halves_are_alive() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (conn, accepted) = tokio::join!(
            DesktopConnection::connect(addr, "tablet", Size::new(720, 1280)),
            listener.accept()
        );
        let (mut peer, _) = accepted.unwrap();
        let (mut control, video, closer) = conn.unwrap().split();
        video.send_frame(FrameHeader { pts: -1, len: 2 }, &[5, 6]).await.unwrap();

        // Act
        closer.shutdown().await.unwrap();
        let mut received = Vec::new();
        let peer_read = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            peer.read_to_end(&mut received),
        )
        .await;
        let device_read = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            control.next_message(),
        )
        .await;

        // Assert: the controller sees the frame then EOF, the device reads EOF
        assert!(peer_read.unwrap().is_ok());
        assert_eq!(received.len(), HANDSHAKE_LEN + 12 + 2);
        assert_eq!(&received[HANDSHAKE_LEN + 12..], &[5, 6]);
        assert_eq!(device_read.unwrap().unwrap(), None);
    }

    #[tokio::test]
    async fn test_shutdown_of_in_memory_stream_closes_outbound() {
        // Arrange
        let (device_end, mut controller) = tokio::io::duplex(256);
        let (_control, _video, closer) = DesktopConnection::open(device_end, "d", Size::new(8, 8))
            .await
            .unwrap()
            .split();

        // Act
        closer.shutdown().await.unwrap();
        let mut received = Vec::new();
        controller.read_to_end(&mut received).await.unwrap();

        // Assert
        assert_eq!(received, encode_handshake("d", Size::new(8, 8)));
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = DesktopConnection::connect(addr, "x", Size::new(8, 8)).await;

        assert!(matches!(result, Err(ConnectionError::ConnectFailed { .. })));
    }
}

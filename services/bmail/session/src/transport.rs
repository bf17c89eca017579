//! TCP transport and frame I/O for bmail sessions.
//!
//! A frame is read as exactly [`HEADER_SIZE`] bytes, validated, then exactly
//! `payload_len` bytes. Short reads are accumulated by `read_exact`; a peer
//! that goes away mid-payload is a framing error. Writes send the header and
//! the payload as two writes.

use bmail_wire::{Frame, TransportHeader, WireError, HEADER_SIZE};
use bytes::Bytes;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tracing::trace;

use crate::error::SessionError;

/// Create a TCP listener bound to the given address
pub async fn listen_tcp(addr: SocketAddr) -> tokio::io::Result<TcpListener> {
    TcpListener::bind(addr).await
}

/// Connect to a TCP address, giving up at `deadline`
pub async fn connect_tcp(addr: SocketAddr, deadline: Option<Instant>) -> Result<TcpStream, SessionError> {
    let stream = with_deadline(deadline, async {
        TcpStream::connect(addr).await.map_err(SessionError::from)
    })
    .await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Run `fut`, failing with [`SessionError::Timeout`] once `deadline` passes
pub async fn with_deadline<T, F>(deadline: Option<Instant>, fut: F) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, SessionError>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| SessionError::Timeout)?,
        None => fut.await,
    }
}

/// Read one complete frame
pub async fn read_frame<R>(reader: &mut R, max_payload_size: usize) -> Result<Frame, SessionError>
where
    R: AsyncRead + Unpin,
{
    let mut head = [0u8; HEADER_SIZE];
    reader.read_exact(&mut head).await.map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => SessionError::Closed,
        _ => SessionError::Io(e),
    })?;
    let header = TransportHeader::decode(&mut &head[..])?;

    let payload_len = header.payload_len as usize;
    if payload_len > max_payload_size {
        return Err(WireError::Size(payload_len).into());
    }

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload).await.map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => SessionError::Wire(WireError::Incomplete),
        _ => SessionError::Io(e),
    })?;

    trace!("Read {:?} frame ({} bytes)", header.msg_type, payload_len);
    Ok(Frame {
        header,
        payload: Bytes::from(payload),
    })
}

/// Write one frame: header, then payload
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame.header.to_bytes()).await?;
    if !frame.payload.is_empty() {
        writer.write_all(&frame.payload).await?;
    }
    writer.flush().await?;
    trace!("Wrote {:?} frame ({} bytes)", frame.header.msg_type, frame.payload.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmail_wire::{Hello, MsgType, WireMessage, DEFAULT_MAX_PAYLOAD_SIZE};
    use std::time::Duration;

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let frame = Frame::new(MsgType::Stat, Bytes::from(vec![7u8; 500])).unwrap();

        let sent = frame.clone();
        let writer = tokio::spawn(async move { write_frame(&mut a, &sent).await });
        let got = read_frame(&mut b, DEFAULT_MAX_PAYLOAD_SIZE).await.unwrap();
        writer.await.unwrap().unwrap();
        assert_eq!(got, frame);
    }

    #[tokio::test]
    async fn test_partial_reads_are_accumulated() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let bytes = Frame::new(MsgType::Retr, Bytes::from(vec![1u8; 40]))
            .unwrap()
            .encode();

        tokio::spawn(async move {
            for chunk in bytes.chunks(3) {
                a.write_all(chunk).await.unwrap();
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });

        let frame = read_frame(&mut b, DEFAULT_MAX_PAYLOAD_SIZE).await.unwrap();
        assert_eq!(frame.payload.len(), 40);
    }

    #[tokio::test]
    async fn test_eof_before_header_is_closed() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        assert!(matches!(
            read_frame(&mut b, DEFAULT_MAX_PAYLOAD_SIZE).await,
            Err(SessionError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_eof_mid_payload_is_framing_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let header = TransportHeader::new(MsgType::Retr, 20);
        a.write_all(&header.to_bytes()).await.unwrap();
        a.write_all(&[0u8; 5]).await.unwrap();
        drop(a);

        let err = read_frame(&mut b, DEFAULT_MAX_PAYLOAD_SIZE).await.unwrap_err();
        assert!(matches!(err, SessionError::Wire(WireError::Incomplete)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_oversized_payload_is_rejected_before_reading() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let header = TransportHeader::new(MsgType::Retr, 1_000_000);
        a.write_all(&header.to_bytes()).await.unwrap();

        assert!(matches!(
            read_frame(&mut b, 1024).await,
            Err(SessionError::Wire(WireError::Size(1_000_000)))
        ));
    }

    #[tokio::test]
    async fn test_bad_type_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let mut head = Hello.to_frame().unwrap().header.to_bytes();
        head[5] = 0x63;
        a.write_all(&head).await.unwrap();

        assert!(matches!(
            read_frame(&mut b, 1024).await,
            Err(SessionError::Wire(WireError::Type(0x63)))
        ));
    }

    #[tokio::test]
    async fn test_deadline() {
        let (_a, mut b) = tokio::io::duplex(64);
        let deadline = Instant::now() + Duration::from_millis(20);
        let result = with_deadline(Some(deadline), read_frame(&mut b, 1024)).await;
        assert!(matches!(result, Err(SessionError::Timeout)));
    }
}

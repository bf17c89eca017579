//! HELLO handshake for bmail sessions.
//!
//! This module runs the HELLO / HELLO_ACK exchange that occurs immediately
//! after connection establishment and opens the serial-number chain.

use bmail_crypto::Address;
use bmail_wire::{Hello, HelloAck, WireMessage};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::error::SessionError;
use crate::protocol::{ClientSession, ServerSession};
use crate::transport::{read_frame, write_frame};

/// Send HELLO and wait for the server's first serial number.
///
/// Returns the server address every later ack must be signed by.
pub async fn client_handshake<S>(
    stream: &mut S,
    session: &mut ClientSession,
    trusted: &[Address],
    max_payload_size: usize,
) -> Result<Address, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let hello = session.hello()?;
    let exchange = async {
        write_frame(stream, &hello.to_frame()?).await?;
        debug!("Sent HELLO");
        let frame = read_frame(stream, max_payload_size).await?;
        Ok::<_, SessionError>(HelloAck::from_frame(&frame)?)
    };
    match exchange.await {
        Ok(ack) => session.on_hello_ack(&ack, trusted),
        Err(e) => {
            session.close();
            Err(e)
        }
    }
}

/// Wait for HELLO and answer with a fresh first serial number
pub async fn server_handshake<S>(
    stream: &mut S,
    session: &mut ServerSession,
    max_payload_size: usize,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = read_frame(stream, max_payload_size).await?;
    let hello = Hello::from_frame(&frame)?;
    let ack = session.on_hello(&hello)?;
    write_frame(stream, &ack.to_frame()?).await?;
    debug!("Answered HELLO with {:?}", ack.sn);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmail_crypto::Identity;
    use bmail_wire::{MsgType, DEFAULT_MAX_PAYLOAD_SIZE};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_handshake_over_pipe() {
        let (mut client_io, mut server_io) = tokio::io::duplex(1024);
        let server_id = Arc::new(Identity::generate());
        let expected = server_id.address();

        let server = tokio::spawn(async move {
            let mut session = ServerSession::new(server_id);
            server_handshake(&mut server_io, &mut session, DEFAULT_MAX_PAYLOAD_SIZE).await?;
            Ok::<_, SessionError>(session)
        });

        let mut client = ClientSession::new();
        let addr = client_handshake(&mut client_io, &mut client, &[expected], DEFAULT_MAX_PAYLOAD_SIZE)
            .await
            .unwrap();
        assert_eq!(addr, expected);
        assert!(client.is_ready());

        let session = server.await.unwrap().unwrap();
        let crate::protocol::ServerState::Ready(server_sn) = session.state().clone() else {
            panic!("server not ready");
        };
        assert_eq!(client.state(), &crate::protocol::ClientState::Ready(server_sn));
    }

    #[tokio::test]
    async fn test_server_rejects_non_hello() {
        let (mut client_io, mut server_io) = tokio::io::duplex(1024);
        let frame = bmail_wire::Frame::new(MsgType::Stat, bytes::Bytes::new()).unwrap();
        write_frame(&mut client_io, &frame).await.unwrap();

        let mut session = ServerSession::new(Arc::new(Identity::generate()));
        let err = server_handshake(&mut server_io, &mut session, DEFAULT_MAX_PAYLOAD_SIZE)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Wire(bmail_wire::WireError::UnexpectedType(MsgType::Stat))
        ));
    }

    #[tokio::test]
    async fn test_client_fails_when_server_hangs_up() {
        let (mut client_io, server_io) = tokio::io::duplex(1024);
        drop(server_io);

        let mut client = ClientSession::new();
        assert!(client_handshake(&mut client_io, &mut client, &[], DEFAULT_MAX_PAYLOAD_SIZE)
            .await
            .is_err());
        assert_eq!(client.state(), &crate::protocol::ClientState::Closed);
    }
}

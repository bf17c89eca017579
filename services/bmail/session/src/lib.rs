//! Sessions, sealing and clients for bmail.
//!
//! A bmail connection starts with HELLO / HELLO_ACK. The server hands out a
//! random serial number, the client signs it into its next request, and
//! every ack replaces it with a fresh one. Any deviation from that chain
//! closes the connection.
//!
//! - [`protocol`]: client and server state machines, no I/O
//! - [`transport`] / [`handshake`]: frame I/O over tokio streams
//! - [`seal`]: per-recipient envelope encryption
//! - [`client`]: [`Connection`] for one socket, [`MailClient`] for an account
//! - [`server`]: reference [`MailServer`] over a [`bmail_storage::MailStore`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod handshake;
pub mod protocol;
pub mod resolver;
pub mod seal;
pub mod server;
pub mod transport;

// Re-export main types
pub use client::{ClientConfig, Connection, MailClient};
pub use error::{ErrorKind, SessionError};
pub use handshake::{client_handshake, server_handshake};
pub use protocol::{ClientSession, ClientState, ServerSession, ServerState};
pub use resolver::{mail_domain, ServerRecord, ServerResolver, StaticResolver};
pub use seal::Sealer;
pub use server::{MailServer, MailServerConfig, Service, ACK_OVERHEAD};
pub use transport::{connect_tcp, listen_tcp, read_frame, with_deadline, write_frame};

//! Reference mail server.
//!
//! One accept loop per port. Each connection gets its own [`ServerSession`]
//! and is served strictly request by request. Protocol violations end the
//! connection; application failures are answered with an error code and the
//! chain continues.

use anyhow::Context;
use bmail_crypto::{Address, Identity};
use bmail_storage::{MailQuery, MailStore, StorageError};
use bmail_wire::{
    AckContent, Command, CommandAck, CommandSyn, CryptEnvelope, EnvelopeAck, EnvelopeSyn,
    ErrorCode, Message, Pack, WireMessage, DEFAULT_MAX_PAYLOAD_SIZE,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::SessionError;
use crate::handshake::server_handshake;
use crate::protocol::ServerSession;
use crate::transport::{read_frame, with_deadline, write_frame};

/// Room left in a reply frame for everything but the envelopes. An
/// envelope is only accepted if it fits a download reply on its own.
pub const ACK_OVERHEAD: usize = 4096;

/// Protocol spoken on a listening port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Envelope submission (BMTP)
    Transfer,
    /// Download, delete and state (BPOP)
    Retrieval,
}

impl Service {
    fn name(self) -> &'static str {
        match self {
            Service::Transfer => "serving transfer",
            Service::Retrieval => "serving retrieval",
        }
    }
}

/// Server limits
#[derive(Debug, Clone)]
pub struct MailServerConfig {
    /// Longest wait for the next frame of a connection
    pub idle_timeout: Duration,
    /// Largest request payload accepted, and the budget for replies
    pub max_payload_size: usize,
    /// Largest encrypted content (subject, body, attachments) accepted per
    /// envelope
    pub max_content_bytes: usize,
}

impl Default for MailServerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            max_content_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Mail server over a [`MailStore`]
pub struct MailServer<S: MailStore> {
    identity: Arc<Identity>,
    store: Arc<S>,
    config: MailServerConfig,
}

impl<S: MailStore + 'static> MailServer<S> {
    /// Create a server signing acks with `identity`
    pub fn new(identity: Arc<Identity>, store: Arc<S>, config: MailServerConfig) -> Self {
        Self {
            identity,
            store,
            config,
        }
    }

    /// Address clients must trust
    pub fn address(&self) -> Address {
        self.identity.address()
    }

    /// Accept connections until the listener fails
    pub async fn serve(self: Arc<Self>, listener: TcpListener, service: Service) -> anyhow::Result<()> {
        let local = listener.local_addr()?;
        info!("Listening for {:?} on {}", service, local);

        loop {
            let (stream, peer) = listener
                .accept()
                .await
                .with_context(|| format!("accept on {local} failed"))?;
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                match server.handle_connection(stream, peer, service).await {
                    Ok(()) => debug!("Connection from {} finished", peer),
                    Err(e) => warn!("Connection from {} closed: {:#}", peer, e),
                }
            });
        }
    }

    fn deadline(&self) -> Option<Instant> {
        Some(Instant::now() + self.config.idle_timeout)
    }

    /// Serve one connection until the client leaves or breaks the protocol
    pub async fn handle_connection(
        &self,
        mut stream: TcpStream,
        peer: SocketAddr,
        service: Service,
    ) -> anyhow::Result<()> {
        stream.set_nodelay(true)?;
        let max_payload_size = self.config.max_payload_size;
        let mut session = ServerSession::new(Arc::clone(&self.identity));

        with_deadline(
            self.deadline(),
            server_handshake(&mut stream, &mut session, max_payload_size),
        )
        .await
        .context("handshake failed")?;
        info!("Session opened with {} for {:?}", peer, service);

        loop {
            let frame = match with_deadline(self.deadline(), read_frame(&mut stream, max_payload_size)).await {
                Ok(frame) => frame,
                Err(SessionError::Closed) => return Ok(()),
                Err(e) => return Err(e).context("reading request"),
            };

            let reply = match (service, Message::from_frame(&frame)?) {
                (Service::Transfer, Message::EnvelopeSyn(syn)) => {
                    self.handle_envelope(&mut session, syn).await?.to_frame()?
                }
                (Service::Retrieval, Message::CommandSyn(syn)) => {
                    self.handle_command(&mut session, syn).await?.to_frame()?
                }
                (_, other) => {
                    return Err(SessionError::UnexpectedMessage {
                        state: service.name(),
                        got: other.msg_type(),
                    }
                    .into())
                }
            };

            with_deadline(self.deadline(), write_frame(&mut stream, &reply))
                .await
                .context("writing reply")?;
        }
    }

    async fn handle_envelope(
        &self,
        session: &mut ServerSession,
        syn: EnvelopeSyn,
    ) -> Result<EnvelopeAck, SessionError> {
        session.accept_envelope(&syn)?;
        let envelope = &syn.envelope;

        let error_code = if envelope.recipients.is_empty() {
            ErrorCode::AddressUnavailable
        } else if envelope.content_size() > self.config.max_content_bytes
            || !self.fits_reply(envelope)
        {
            warn!("Refusing oversized envelope {} from {}", envelope.eid, envelope.from_addr);
            ErrorCode::ContentTooLarge
        } else {
            match self.store.store(envelope).await {
                Ok(mailboxes) => {
                    info!(
                        "Accepted envelope {} from {} into {} mailboxes",
                        envelope.eid, envelope.from_addr, mailboxes
                    );
                    ErrorCode::Success
                }
                Err(StorageError::QuotaExceeded(owner)) => {
                    warn!("Mailbox {} is full, refusing {}", owner, envelope.eid);
                    ErrorCode::ContentTooLarge
                }
                Err(e) => {
                    error!("Failed to store envelope {}: {}", envelope.eid, e);
                    ErrorCode::Forbidden
                }
            }
        };

        session.envelope_ack(&syn, error_code)
    }

    async fn handle_command(
        &self,
        session: &mut ServerSession,
        syn: CommandSyn,
    ) -> Result<CommandAck, SessionError> {
        session.accept_command(&syn)?;
        let owner = *syn.command.owner();

        let result = match &syn.command {
            Command::Download(cmd) => {
                let query = MailQuery {
                    limit: cmd.page_size(),
                    direction: cmd.direction,
                    pivot: cmd.time_pivot,
                    pivot_eid: cmd.pivot_eid,
                };
                self.store.download(&owner, query).await.map(|envelopes| {
                    let page = self.fit_page(envelopes);
                    (page_code(&page), AckContent::Download(page))
                })
            }
            Command::List(cmd) => {
                let query = MailQuery {
                    limit: cmd.page_size(),
                    direction: cmd.direction,
                    pivot: cmd.time_pivot,
                    pivot_eid: cmd.pivot_eid,
                };
                self.store.list(&owner, query).await.map(|entries| {
                    let page = self.fit_page(entries);
                    (page_code(&page), AckContent::List(page))
                })
            }
            Command::Delete(cmd) => self
                .store
                .delete(&owner, &cmd.eids)
                .await
                .map(|outcomes| (ErrorCode::Success, AckContent::Delete(outcomes))),
            Command::State(cmd) => self
                .store
                .state(&owner, cmd.before_time)
                .await
                .map(|state| (ErrorCode::Success, AckContent::State(state))),
        };

        let (error_code, content) = result.unwrap_or_else(|e| {
            error!("{:?} for {} failed: {}", syn.command.msg_type(), owner, e);
            (ErrorCode::Forbidden, AckContent::empty_for(&syn.command))
        });
        session.command_ack(&syn, error_code, content)
    }

    fn reply_budget(&self) -> usize {
        self.config.max_payload_size.saturating_sub(ACK_OVERHEAD)
    }

    /// Whether a download reply can carry `envelope` on its own
    fn fits_reply(&self, envelope: &CryptEnvelope) -> bool {
        match envelope.packed() {
            Ok(bytes) => bytes.len() <= self.reply_budget(),
            Err(e) => {
                warn!("Cannot measure envelope {}: {}", envelope.eid, e);
                false
            }
        }
    }

    /// Drop trailing items that would push the reply past the payload
    /// limit; the client pages on from the last one it got. An item larger
    /// than the whole budget can never be sent and is skipped.
    fn fit_page<T: Pack>(&self, items: Vec<T>) -> Vec<T> {
        let budget = self.reply_budget();
        let mut used = 0usize;
        let mut page = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let size = match item.packed() {
                Ok(bytes) => bytes.len(),
                Err(e) => {
                    warn!("Skipping unencodable page item {}: {}", index, e);
                    continue;
                }
            };
            if size > budget {
                warn!("Skipping page item {} of {} bytes, over the reply budget", index, size);
                continue;
            }
            if used + size > budget {
                debug!("Page cut at {} items ({} bytes)", page.len(), used);
                break;
            }
            used += size;
            page.push(item);
        }
        page
    }
}

fn page_code<T>(page: &[T]) -> ErrorCode {
    if page.is_empty() {
        ErrorCode::NoMailAvailable
    } else {
        ErrorCode::Success
    }
}

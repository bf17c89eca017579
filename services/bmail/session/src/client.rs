//! Connection client.
//!
//! [`Connection`] drives one TCP connection through the handshake and any
//! number of sequential Syn/Ack rounds. Operations take `&mut self`, so a
//! connection can never have two requests in flight. [`MailClient`] wraps
//! resolution, sealing and one short-lived connection per operation.

use bmail_crypto::{Address, CryptoProvider, Identity, StandardProvider};
use bmail_wire::{
    AckContent, CmdDelete, CmdDownload, CmdList, CmdState, Command, CommandAck, CryptEnvelope,
    DeleteOutcome, Direction, Envelope, EnvelopeAck, ErrorCode, ListEntry, StateAck, WireMessage,
    BMTP_PORT, BPOP_PORT, DEFAULT_MAX_PAYLOAD_SIZE,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SessionError;
use crate::handshake::client_handshake;
use crate::protocol::ClientSession;
use crate::resolver::{mail_domain, ServerResolver};
use crate::seal::Sealer;
use crate::transport::{connect_tcp, read_frame, with_deadline, write_frame};

/// Client connection settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for a whole connection, from connect to close
    pub timeout: Duration,
    /// Envelope transfer port
    pub bmtp_port: u16,
    /// Retrieval port
    pub bpop_port: u16,
    /// Largest reply payload accepted
    pub max_payload_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            bmtp_port: BMTP_PORT,
            bpop_port: BPOP_PORT,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

/// One client connection and its serial-number chain
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    session: ClientSession,
    deadline: Option<Instant>,
    max_payload_size: usize,
}

impl Connection {
    /// Connect to `addr`; the whole connection must finish within
    /// `config.timeout` unless the deadline is reset
    pub async fn connect(addr: SocketAddr, config: &ClientConfig) -> Result<Self, SessionError> {
        let deadline = Some(Instant::now() + config.timeout);
        let stream = connect_tcp(addr, deadline).await?;
        debug!("Connected to {}", addr);
        Ok(Self {
            stream,
            peer: addr,
            session: ClientSession::new(),
            deadline,
            max_payload_size: config.max_payload_size,
        })
    }

    /// Replace the connection deadline; `None` disables it
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Remote socket address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Server address learned from the handshake
    pub fn server_address(&self) -> Option<&Address> {
        self.session.server()
    }

    /// Protocol state
    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    /// Run the HELLO exchange. A non-empty `trusted` set restricts the
    /// server addresses accepted.
    pub async fn handshake(&mut self, trusted: &[Address]) -> Result<Address, SessionError> {
        let result = with_deadline(
            self.deadline,
            client_handshake(&mut self.stream, &mut self.session, trusted, self.max_payload_size),
        )
        .await;
        match result {
            Ok(server) => {
                info!("Handshake with {} complete, server {}", self.peer, server);
                Ok(server)
            }
            Err(e) => {
                self.session.close();
                Err(e)
            }
        }
    }

    async fn round_trip<Q, A>(&mut self, request: &Q) -> Result<A, SessionError>
    where
        Q: WireMessage,
        A: WireMessage,
    {
        let max_payload_size = self.max_payload_size;
        let stream = &mut self.stream;
        let result = with_deadline(self.deadline, async {
            let frame = request.to_frame()?;
            write_frame(stream, &frame).await?;
            let reply = read_frame(stream, max_payload_size).await?;
            Ok(A::from_frame(&reply)?)
        })
        .await;
        if let Err(e) = &result {
            warn!("Round trip with {} failed: {}", self.peer, e);
            self.session.close();
        }
        result
    }

    /// Submit a sealed envelope signed by `identity`
    pub async fn send_envelope(
        &mut self,
        identity: &Identity,
        envelope: CryptEnvelope,
    ) -> Result<EnvelopeAck, SessionError> {
        let syn = self.session.envelope_syn(identity, envelope)?;
        let ack: EnvelopeAck = self.round_trip(&syn).await?;
        self.session.on_envelope_ack(&ack)?;
        debug!("Envelope {} acked with {}", syn.envelope.eid, ack.error_code);
        Ok(ack)
    }

    /// Run a retrieval command signed by `identity`
    pub async fn command(&mut self, identity: &Identity, command: Command) -> Result<CommandAck, SessionError> {
        let syn = self.session.command_syn(identity, command)?;
        let ack: CommandAck = self.round_trip(&syn).await?;
        self.session.on_command_ack(&ack)?;
        debug!("{:?} acked with {}", syn.command.msg_type(), ack.error_code);
        Ok(ack)
    }

    /// Fetch a page of received envelopes
    pub async fn download(
        &mut self,
        identity: &Identity,
        request: CmdDownload,
    ) -> Result<(ErrorCode, Vec<CryptEnvelope>), SessionError> {
        let ack = self.command(identity, Command::Download(request)).await?;
        match ack.content {
            AckContent::Download(envelopes) => Ok((ack.error_code, envelopes)),
            other => Err(SessionError::UnexpectedMessage {
                state: "downloading",
                got: other.msg_type(),
            }),
        }
    }

    /// List ids and sizes of a page of received envelopes
    pub async fn list(
        &mut self,
        identity: &Identity,
        request: CmdList,
    ) -> Result<(ErrorCode, Vec<ListEntry>), SessionError> {
        let ack = self.command(identity, Command::List(request)).await?;
        match ack.content {
            AckContent::List(entries) => Ok((ack.error_code, entries)),
            other => Err(SessionError::UnexpectedMessage {
                state: "listing",
                got: other.msg_type(),
            }),
        }
    }

    /// Delete envelopes by id
    pub async fn delete(
        &mut self,
        identity: &Identity,
        request: CmdDelete,
    ) -> Result<(ErrorCode, Vec<DeleteOutcome>), SessionError> {
        let ack = self.command(identity, Command::Delete(request)).await?;
        match ack.content {
            AckContent::Delete(outcomes) => Ok((ack.error_code, outcomes)),
            other => Err(SessionError::UnexpectedMessage {
                state: "deleting",
                got: other.msg_type(),
            }),
        }
    }

    /// Query mailbox usage
    pub async fn state(
        &mut self,
        identity: &Identity,
        request: CmdState,
    ) -> Result<(ErrorCode, StateAck), SessionError> {
        let ack = self.command(identity, Command::State(request)).await?;
        match ack.content {
            AckContent::State(state) => Ok((ack.error_code, state)),
            other => Err(SessionError::UnexpectedMessage {
                state: "querying state",
                got: other.msg_type(),
            }),
        }
    }

    /// Shut the connection down
    pub async fn close(mut self) {
        self.session.close();
        if let Err(e) = self.stream.shutdown().await {
            debug!("Shutdown of {} failed: {}", self.peer, e);
        }
    }
}

fn accept(error_code: ErrorCode) -> Result<(), SessionError> {
    if error_code.is_success() {
        Ok(())
    } else {
        Err(SessionError::Rejected(error_code))
    }
}

/// Mail account client bound to its home server
pub struct MailClient<P: CryptoProvider = StandardProvider> {
    identity: Arc<Identity>,
    mail_addr: String,
    server_ip: IpAddr,
    trusted: Vec<Address>,
    config: ClientConfig,
    sealer: Sealer<P>,
}

impl MailClient<StandardProvider> {
    /// Resolve the home server of `mail_addr` and build a client
    pub async fn new(
        identity: Arc<Identity>,
        mail_addr: impl Into<String>,
        resolver: &dyn ServerResolver,
        config: ClientConfig,
    ) -> Result<Self, SessionError> {
        Self::with_provider(identity, mail_addr, resolver, config, StandardProvider).await
    }
}

impl<P: CryptoProvider> MailClient<P> {
    /// Build a client sealing with `provider`
    pub async fn with_provider(
        identity: Arc<Identity>,
        mail_addr: impl Into<String>,
        resolver: &dyn ServerResolver,
        config: ClientConfig,
        provider: P,
    ) -> Result<Self, SessionError> {
        let mail_addr = mail_addr.into();
        let domain = mail_domain(&mail_addr).ok_or_else(|| SessionError::Resolve(mail_addr.clone()))?;
        let record = resolver.resolve(domain).await?;
        let server_ip = *record
            .ips
            .first()
            .ok_or_else(|| SessionError::Resolve(domain.to_string()))?;
        info!(
            "Mail client for {} using server {} ({} trusted identities)",
            mail_addr,
            server_ip,
            record.identities.len()
        );
        Ok(Self {
            identity,
            mail_addr,
            server_ip,
            trusted: record.identities,
            config,
            sealer: Sealer::new(provider),
        })
    }

    /// Account address
    pub fn address(&self) -> Address {
        self.identity.address()
    }

    /// Account mail name
    pub fn mail_addr(&self) -> &str {
        &self.mail_addr
    }

    /// New outgoing envelope from this account
    pub fn compose(&self, subject: impl Into<String>, body: impl Into<String>) -> Envelope {
        Envelope::new(self.mail_addr.clone(), self.address(), subject, body)
    }

    async fn open(&self, port: u16) -> Result<Connection, SessionError> {
        let mut conn = Connection::connect(SocketAddr::new(self.server_ip, port), &self.config).await?;
        conn.handshake(&self.trusted).await?;
        Ok(conn)
    }

    /// Seal `envelope` and submit it on the transfer port
    pub async fn send_mail(&self, envelope: &Envelope) -> Result<EnvelopeAck, SessionError> {
        let sealed = self.sealer.seal(&self.identity, envelope)?;
        let mut conn = self.open(self.config.bmtp_port).await?;
        let ack = conn.send_envelope(&self.identity, sealed).await?;
        conn.close().await;
        accept(ack.error_code)?;
        Ok(ack)
    }

    /// Fetch and unseal up to `mail_count` received envelopes past the
    /// cursor `(time_pivot, pivot_eid)` (a count of 0 means the server
    /// default). Pass the date and eid of the last envelope of a page to
    /// continue from it.
    pub async fn receive(
        &self,
        mail_count: u32,
        direction: Direction,
        time_pivot: i64,
        pivot_eid: Option<Uuid>,
    ) -> Result<Vec<Envelope>, SessionError> {
        let mut conn = self.open(self.config.bpop_port).await?;
        let request = CmdDownload {
            owner: self.address(),
            mail_addr: self.mail_addr.clone(),
            mail_count,
            direction,
            time_pivot,
            pivot_eid,
        };
        let (error_code, sealed) = conn.download(&self.identity, request).await?;
        conn.close().await;

        if error_code == ErrorCode::NoMailAvailable {
            return Ok(Vec::new());
        }
        accept(error_code)?;
        sealed
            .iter()
            .map(|envelope| self.sealer.unseal(&self.identity, envelope))
            .collect()
    }

    /// Ids, dates and sizes of received envelopes, paged like
    /// [`MailClient::receive`]
    pub async fn list(
        &self,
        mail_count: u32,
        direction: Direction,
        time_pivot: i64,
        pivot_eid: Option<Uuid>,
    ) -> Result<Vec<ListEntry>, SessionError> {
        let mut conn = self.open(self.config.bpop_port).await?;
        let request = CmdList {
            owner: self.address(),
            mail_addr: self.mail_addr.clone(),
            mail_count,
            direction,
            time_pivot,
            pivot_eid,
        };
        let (error_code, entries) = conn.list(&self.identity, request).await?;
        conn.close().await;

        if error_code == ErrorCode::NoMailAvailable {
            return Ok(Vec::new());
        }
        accept(error_code)?;
        Ok(entries)
    }

    /// Delete received envelopes by id
    pub async fn delete(&self, eids: &[Uuid]) -> Result<Vec<DeleteOutcome>, SessionError> {
        let mut conn = self.open(self.config.bpop_port).await?;
        let request = CmdDelete {
            owner: self.address(),
            mail_addr: self.mail_addr.clone(),
            eids: eids.to_vec(),
        };
        let (error_code, outcomes) = conn.delete(&self.identity, request).await?;
        conn.close().await;
        accept(error_code)?;
        Ok(outcomes)
    }

    /// Mailbox usage for envelopes dated before `before_time`
    pub async fn state(&self, before_time: i64) -> Result<StateAck, SessionError> {
        let mut conn = self.open(self.config.bpop_port).await?;
        let request = CmdState {
            owner: self.address(),
            mail_addr: self.mail_addr.clone(),
            before_time,
        };
        let (error_code, state) = conn.state(&self.identity, request).await?;
        conn.close().await;
        accept(error_code)?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::resolver::{ServerRecord, StaticResolver};
    use crate::transport::listen_tcp;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.bmtp_port, 1025);
        assert_eq!(config.bpop_port, 1110);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_handshake_times_out_on_silent_server() {
        let listener = listen_tcp("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold the socket without answering
        let holder = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let config = ClientConfig {
            timeout: Duration::from_millis(100),
            ..ClientConfig::default()
        };
        let mut conn = Connection::connect(addr, &config).await.unwrap();
        let err = conn.handshake(&[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(!conn.session().is_ready());
        holder.abort();
    }

    #[tokio::test]
    async fn test_unresolvable_account() {
        let resolver = StaticResolver::new().with_record(
            "example.bm",
            ServerRecord {
                ips: vec!["127.0.0.1".parse().unwrap()],
                identities: Vec::new(),
            },
        );
        let identity = Arc::new(Identity::generate());

        assert!(matches!(
            MailClient::new(identity.clone(), "nobody", &resolver, ClientConfig::default()).await,
            Err(SessionError::Resolve(_))
        ));
        assert!(matches!(
            MailClient::new(identity.clone(), "bob@other.bm", &resolver, ClientConfig::default()).await,
            Err(SessionError::Resolve(_))
        ));

        let client = MailClient::new(identity, "bob@example.bm", &resolver, ClientConfig::default())
            .await
            .unwrap();
        let draft = client.compose("hi", "there");
        assert_eq!(draft.from_name, "bob@example.bm");
        assert_eq!(draft.from_addr, client.address());
    }
}

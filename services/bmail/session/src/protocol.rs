//! Serial-number session state machines.
//!
//! Both sides are pure: they build and check messages but never touch a
//! socket. The server owns the current serial number, the client echoes
//! it signed, and every ack hands out the next one. Exactly one request is
//! in flight per session.
//!
//! ```text
//! client: Disconnected -> AwaitingHelloAck -> Ready(sn0) -> AwaitingResponse -> Ready(sn1) ...
//! server: AwaitingHello -> Ready(sn0) -> Processing(sn0) -> Ready(sn1) ...
//! ```
//!
//! Any check failure moves the session to `Closed`; a fresh connection and
//! HELLO are needed to start a new chain.

use bmail_crypto::{Address, Hash, Identity};
use bmail_wire::{
    AckContent, Command, CommandAck, CommandSyn, CryptEnvelope, EnvelopeAck, EnvelopeSyn,
    ErrorCode, Hello, HelloAck, SerialNumber,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::SessionError;

/// What the client is waiting for
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Envelope(Hash),
    Command(Command),
}

/// Client session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// No HELLO sent yet
    Disconnected,
    /// HELLO sent
    AwaitingHelloAck,
    /// Holding a serial number for the next request
    Ready(SerialNumber),
    /// Request sent with the given serial number
    AwaitingResponse(SerialNumber),
    /// Chain broken or connection finished
    Closed,
}

impl ClientState {
    fn describe(&self) -> &'static str {
        match self {
            ClientState::Disconnected => "disconnected",
            ClientState::AwaitingHelloAck => "awaiting hello ack",
            ClientState::Ready(_) => "ready",
            ClientState::AwaitingResponse(_) => "awaiting response",
            ClientState::Closed => "closed",
        }
    }
}

/// Client half of the serial-number protocol
#[derive(Debug)]
pub struct ClientSession {
    state: ClientState,
    server: Option<Address>,
    pending: Option<Pending>,
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientSession {
    /// Fresh session, nothing sent
    pub fn new() -> Self {
        Self {
            state: ClientState::Disconnected,
            server: None,
            pending: None,
        }
    }

    /// Current state
    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// Server address learned from the handshake
    pub fn server(&self) -> Option<&Address> {
        self.server.as_ref()
    }

    /// Whether a request can be built
    pub fn is_ready(&self) -> bool {
        matches!(self.state, ClientState::Ready(_))
    }

    /// Break the chain; used when the transport fails mid-round
    pub fn close(&mut self) {
        self.state = ClientState::Closed;
        self.pending = None;
    }

    /// Start the handshake
    pub fn hello(&mut self) -> Result<Hello, SessionError> {
        if self.state != ClientState::Disconnected {
            return Err(SessionError::InvalidState(self.state.describe()));
        }
        self.state = ClientState::AwaitingHelloAck;
        Ok(Hello)
    }

    /// Finish the handshake.
    ///
    /// The announced server address becomes the trust anchor for every ack
    /// signature on this connection. A non-empty `trusted` set restricts
    /// which addresses are acceptable.
    pub fn on_hello_ack(&mut self, ack: &HelloAck, trusted: &[Address]) -> Result<Address, SessionError> {
        if self.state != ClientState::AwaitingHelloAck {
            return Err(SessionError::InvalidState(self.state.describe()));
        }
        let result = Self::check_hello_ack(ack, trusted);
        match result {
            Ok(()) => {
                debug!("Handshake complete with {} ({:?})", ack.server_addr, ack.sn);
                self.state = ClientState::Ready(ack.sn);
                self.server = Some(ack.server_addr);
                Ok(ack.server_addr)
            }
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    fn check_hello_ack(ack: &HelloAck, trusted: &[Address]) -> Result<(), SessionError> {
        if !ack.error_code.is_success() {
            return Err(SessionError::Refused(ack.error_code));
        }
        if !trusted.is_empty() && !trusted.contains(&ack.server_addr) {
            return Err(SessionError::UntrustedServer(ack.server_addr));
        }
        Ok(())
    }

    fn take_sn(&mut self) -> Result<SerialNumber, SessionError> {
        match self.state {
            ClientState::Ready(sn) => {
                self.state = ClientState::AwaitingResponse(sn);
                Ok(sn)
            }
            ref other => Err(SessionError::InvalidState(other.describe())),
        }
    }

    /// Build a signed envelope submission from the current serial number
    pub fn envelope_syn(&mut self, identity: &Identity, envelope: CryptEnvelope) -> Result<EnvelopeSyn, SessionError> {
        if !self.is_ready() {
            return Err(SessionError::InvalidState(self.state.describe()));
        }
        let hash = envelope.hash()?;
        let sn = self.take_sn()?;
        self.pending = Some(Pending::Envelope(hash));
        Ok(EnvelopeSyn {
            sn,
            sig: identity.sign(sn.as_bytes()),
            hash,
            envelope,
        })
    }

    /// Build a signed retrieval command from the current serial number
    pub fn command_syn(&mut self, identity: &Identity, command: Command) -> Result<CommandSyn, SessionError> {
        let sn = self.take_sn()?;
        self.pending = Some(Pending::Command(command.clone()));
        Ok(CommandSyn {
            sn,
            sig: identity.sign(sn.as_bytes()),
            command,
        })
    }

    /// Check an envelope ack and adopt its next serial number
    pub fn on_envelope_ack(&mut self, ack: &EnvelopeAck) -> Result<(), SessionError> {
        let result = self.check_envelope_ack(ack);
        self.finish_round(result, ack.next_sn)
    }

    fn check_envelope_ack(&self, ack: &EnvelopeAck) -> Result<(), SessionError> {
        let sent = self.awaiting()?;
        let Some(Pending::Envelope(hash)) = &self.pending else {
            return Err(SessionError::InvalidState("awaiting a command ack"));
        };
        check_rotation(sent, ack.sn, ack.next_sn)?;
        if &ack.hash != hash {
            return Err(SessionError::HashMismatch("envelope ack"));
        }
        self.verify_server(&ack.hash, &ack.sig, "envelope ack")
    }

    /// Check a command ack and adopt its next serial number
    pub fn on_command_ack(&mut self, ack: &CommandAck) -> Result<(), SessionError> {
        let result = self.check_command_ack(ack);
        self.finish_round(result, ack.next_sn)
    }

    fn check_command_ack(&self, ack: &CommandAck) -> Result<(), SessionError> {
        let sent = self.awaiting()?;
        let Some(Pending::Command(command)) = &self.pending else {
            return Err(SessionError::InvalidState("awaiting an envelope ack"));
        };
        check_rotation(sent, ack.sn, ack.next_sn)?;
        if !ack.content.answers(command) {
            return Err(SessionError::UnexpectedMessage {
                state: "awaiting command ack",
                got: ack.content.msg_type(),
            });
        }
        if ack.hash != CommandAck::binding_hash(command, &ack.content)? {
            return Err(SessionError::HashMismatch("command ack"));
        }
        self.verify_server(&ack.hash, &ack.sig, "command ack")
    }

    fn awaiting(&self) -> Result<SerialNumber, SessionError> {
        match self.state {
            ClientState::AwaitingResponse(sn) => Ok(sn),
            ref other => Err(SessionError::InvalidState(other.describe())),
        }
    }

    fn verify_server(&self, hash: &Hash, sig: &[u8], what: &'static str) -> Result<(), SessionError> {
        let server = self.server.ok_or(SessionError::InvalidState("without server address"))?;
        server
            .verify(hash, sig)
            .map_err(|_| SessionError::InvalidSignature(what))
    }

    fn finish_round(&mut self, result: Result<(), SessionError>, next_sn: SerialNumber) -> Result<(), SessionError> {
        match result {
            Ok(()) => {
                debug!("SN rotated to {:?}", next_sn);
                self.state = ClientState::Ready(next_sn);
                self.pending = None;
                Ok(())
            }
            Err(e) => {
                warn!("Rejecting ack: {}", e);
                self.close();
                Err(e)
            }
        }
    }
}

fn check_rotation(sent: SerialNumber, echoed: SerialNumber, next: SerialNumber) -> Result<(), SessionError> {
    if echoed != sent {
        return Err(SessionError::SnMismatch);
    }
    if next == sent {
        return Err(SessionError::SnNotRotated);
    }
    Ok(())
}

/// Server session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for the client's HELLO
    AwaitingHello,
    /// Expecting a request signed over this serial number
    Ready(SerialNumber),
    /// Request with this serial number accepted, ack not yet built
    Processing(SerialNumber),
    /// Chain broken
    Closed,
}

/// Server half of the serial-number protocol
#[derive(Debug)]
pub struct ServerSession {
    identity: Arc<Identity>,
    state: ServerState,
}

impl ServerSession {
    /// New session signing acks with `identity`
    pub fn new(identity: Arc<Identity>) -> Self {
        Self {
            identity,
            state: ServerState::AwaitingHello,
        }
    }

    /// Current state
    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Answer HELLO with a fresh first serial number
    pub fn on_hello(&mut self, _hello: &Hello) -> Result<HelloAck, SessionError> {
        if self.state != ServerState::AwaitingHello {
            return Err(self.violation(SessionError::InvalidState("past handshake")));
        }
        let sn = SerialNumber::random();
        self.state = ServerState::Ready(sn);
        debug!("Issued SN0 {:?}", sn);
        Ok(HelloAck::new(sn, self.identity.address()))
    }

    fn consume(&mut self, sn: SerialNumber, signer: &Address, sig: &[u8]) -> Result<(), SessionError> {
        let current = match self.state {
            ServerState::Ready(current) => current,
            ServerState::AwaitingHello => return Err(self.violation(SessionError::InvalidState("awaiting hello"))),
            ServerState::Processing(_) => return Err(self.violation(SessionError::InvalidState("processing"))),
            ServerState::Closed => return Err(SessionError::InvalidState("closed")),
        };
        if sn != current {
            return Err(self.violation(SessionError::SnMismatch));
        }
        if signer.verify(sn.as_bytes(), sig).is_err() {
            return Err(self.violation(SessionError::InvalidSignature("request")));
        }
        self.state = ServerState::Processing(sn);
        Ok(())
    }

    /// Validate an envelope submission: serial number, sender signature and
    /// envelope hash
    pub fn accept_envelope(&mut self, syn: &EnvelopeSyn) -> Result<(), SessionError> {
        self.consume(syn.sn, &syn.envelope.from_addr, &syn.sig)?;
        let hash = match syn.envelope.hash() {
            Ok(hash) => hash,
            Err(e) => return Err(self.violation(e.into())),
        };
        if hash != syn.hash {
            return Err(self.violation(SessionError::HashMismatch("envelope")));
        }
        Ok(())
    }

    /// Validate a retrieval command: serial number and owner signature
    pub fn accept_command(&mut self, syn: &CommandSyn) -> Result<(), SessionError> {
        self.consume(syn.sn, syn.command.owner(), &syn.sig)
    }

    fn rotate(&mut self) -> Result<(SerialNumber, SerialNumber), SessionError> {
        let sn = match self.state {
            ServerState::Processing(sn) => sn,
            _ => return Err(SessionError::InvalidState("no request accepted")),
        };
        let mut next = SerialNumber::random();
        while next == sn {
            next = SerialNumber::random();
        }
        self.state = ServerState::Ready(next);
        debug!("SN rotated {:?} -> {:?}", sn, next);
        Ok((sn, next))
    }

    /// Ack an accepted envelope and rotate the serial number
    pub fn envelope_ack(&mut self, syn: &EnvelopeSyn, error_code: ErrorCode) -> Result<EnvelopeAck, SessionError> {
        let (sn, next_sn) = self.rotate()?;
        Ok(EnvelopeAck {
            sn,
            next_sn,
            hash: syn.hash,
            sig: self.identity.sign(&syn.hash),
            error_code,
        })
    }

    /// Ack an accepted command and rotate the serial number
    pub fn command_ack(
        &mut self,
        syn: &CommandSyn,
        error_code: ErrorCode,
        content: AckContent,
    ) -> Result<CommandAck, SessionError> {
        if !content.answers(&syn.command) {
            return Err(SessionError::InvalidState("reply does not answer the command"));
        }
        let hash = CommandAck::binding_hash(&syn.command, &content)?;
        let (sn, next_sn) = self.rotate()?;
        Ok(CommandAck {
            sn,
            next_sn,
            hash,
            sig: self.identity.sign(&hash),
            error_code,
            content,
        })
    }

    fn violation(&mut self, err: SessionError) -> SessionError {
        warn!("Protocol violation ({:?}): {}", err.kind(), err);
        self.state = ServerState::Closed;
        err
    }
}

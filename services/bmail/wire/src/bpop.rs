//! Retrieval commands (RETR, LIST, DELETE, STAT) and their replies.
//!
//! A [`CommandSyn`] is framed with the type of the command it carries and
//! answered by a [`CommandAck`] framed with the matching response type. The
//! ack hash covers the packed command followed by the packed reply content,
//! so the server's signature binds the answer to the question.

use bmail_crypto::{sha256, Address, Hash};
use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::{
    get_hash, get_i64, get_list, get_optional_uuid, get_short_string, get_signature, get_u32,
    get_u8, put_hash, put_list, put_optional_uuid, put_short_string, put_signature, Pack, Unpack,
};
use crate::envelope::CryptEnvelope;
use crate::error::{FieldContext, WireError};
use crate::header::MsgType;
use crate::message::WireMessage;
use crate::types::{ErrorCode, SerialNumber};

/// Page size used when a download asks for zero envelopes
pub const DEFAULT_MAIL_COUNT: u32 = 20;

/// Which side of the pivot a download walks.
///
/// Mailboxes are ordered by `(date, eid)`. A pivot is the pair
/// `(time_pivot, pivot_eid)`; without a `pivot_eid` only the date is
/// compared, so envelopes dated exactly at the pivot are excluded.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Strictly after the pivot, oldest first
    NewerThan = 0,
    /// Strictly before the pivot, newest first
    OlderThan = 1,
}

impl TryFrom<u8> for Direction {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Direction::NewerThan),
            1 => Ok(Direction::OlderThan),
            _ => Err(WireError::Invalid(format!("direction {value}"))),
        }
    }
}

fn page_size(mail_count: u32) -> usize {
    if mail_count == 0 {
        DEFAULT_MAIL_COUNT as usize
    } else {
        mail_count as usize
    }
}

fn pack_page(
    buf: &mut BytesMut,
    mail_count: u32,
    direction: Direction,
    time_pivot: i64,
    pivot_eid: Option<&Uuid>,
) -> Result<(), WireError> {
    buf.put_u32(mail_count);
    buf.put_u8(direction as u8);
    buf.put_i64(time_pivot);
    put_optional_uuid(buf, pivot_eid)
}

fn get_direction<B: Buf>(buf: &mut B) -> Result<Direction, WireError> {
    get_u8(buf).and_then(Direction::try_from)
}

/// Download a page of envelopes around a pivot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdDownload {
    /// Mailbox owner; must sign the request
    pub owner: Address,
    /// Owner's mail name
    pub mail_addr: String,
    /// Maximum number of envelopes, 0 for the default
    pub mail_count: u32,
    /// Side of the pivot to walk
    pub direction: Direction,
    /// Milliseconds since the Unix epoch
    pub time_pivot: i64,
    /// Tie-break for envelopes dated exactly `time_pivot`; usually the eid
    /// of the last envelope of the previous page
    pub pivot_eid: Option<Uuid>,
}

impl CmdDownload {
    /// Page size the server should apply
    pub fn page_size(&self) -> usize {
        page_size(self.mail_count)
    }
}

/// List ids and sizes of received envelopes around a pivot, paged like
/// [`CmdDownload`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdList {
    /// Mailbox owner; must sign the request
    pub owner: Address,
    /// Owner's mail name
    pub mail_addr: String,
    /// Maximum number of entries, 0 for the default
    pub mail_count: u32,
    /// Side of the pivot to walk
    pub direction: Direction,
    /// Milliseconds since the Unix epoch
    pub time_pivot: i64,
    /// Tie-break for envelopes dated exactly `time_pivot`
    pub pivot_eid: Option<Uuid>,
}

impl CmdList {
    /// Page size the server should apply
    pub fn page_size(&self) -> usize {
        page_size(self.mail_count)
    }
}

/// Delete envelopes by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdDelete {
    /// Mailbox owner; must sign the request
    pub owner: Address,
    /// Owner's mail name
    pub mail_addr: String,
    /// Envelope ids to delete
    pub eids: Vec<Uuid>,
}

/// Query mailbox usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdState {
    /// Mailbox owner; must sign the request
    pub owner: Address,
    /// Owner's mail name
    pub mail_addr: String,
    /// Count only envelopes dated before this instant (ms since epoch)
    pub before_time: i64,
}

/// One retrieval command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// RETR
    Download(CmdDownload),
    /// LIST
    List(CmdList),
    /// DELETE
    Delete(CmdDelete),
    /// STAT
    State(CmdState),
}

impl Command {
    /// Type the command is framed with
    pub fn msg_type(&self) -> MsgType {
        match self {
            Command::Download(_) => MsgType::Retr,
            Command::List(_) => MsgType::List,
            Command::Delete(_) => MsgType::Delete,
            Command::State(_) => MsgType::Stat,
        }
    }

    /// Mailbox owner the request acts for
    pub fn owner(&self) -> &Address {
        match self {
            Command::Download(c) => &c.owner,
            Command::List(c) => &c.owner,
            Command::Delete(c) => &c.owner,
            Command::State(c) => &c.owner,
        }
    }

    fn unpack_as<B: Buf>(msg_type: MsgType, buf: &mut B) -> Result<Self, WireError> {
        match msg_type {
            MsgType::Retr => Ok(Command::Download(CmdDownload {
                owner: Address::unpack(buf).field("owner")?,
                mail_addr: get_short_string(buf).field("mail_addr")?,
                mail_count: get_u32(buf).field("mail_count")?,
                direction: get_direction(buf).field("direction")?,
                time_pivot: get_i64(buf).field("time_pivot")?,
                pivot_eid: get_optional_uuid(buf).field("pivot_eid")?,
            })),
            MsgType::List => Ok(Command::List(CmdList {
                owner: Address::unpack(buf).field("owner")?,
                mail_addr: get_short_string(buf).field("mail_addr")?,
                mail_count: get_u32(buf).field("mail_count")?,
                direction: get_direction(buf).field("direction")?,
                time_pivot: get_i64(buf).field("time_pivot")?,
                pivot_eid: get_optional_uuid(buf).field("pivot_eid")?,
            })),
            MsgType::Delete => Ok(Command::Delete(CmdDelete {
                owner: Address::unpack(buf).field("owner")?,
                mail_addr: get_short_string(buf).field("mail_addr")?,
                eids: get_list(buf).field("eids")?,
            })),
            MsgType::Stat => Ok(Command::State(CmdState {
                owner: Address::unpack(buf).field("owner")?,
                mail_addr: get_short_string(buf).field("mail_addr")?,
                before_time: get_i64(buf).field("before_time")?,
            })),
            other => Err(WireError::UnexpectedType(other)),
        }
    }
}

impl Pack for Command {
    fn pack(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        match self {
            Command::Download(c) => {
                c.owner.pack(buf)?;
                put_short_string(buf, &c.mail_addr)?;
                pack_page(buf, c.mail_count, c.direction, c.time_pivot, c.pivot_eid.as_ref())?;
            }
            Command::List(c) => {
                c.owner.pack(buf)?;
                put_short_string(buf, &c.mail_addr)?;
                pack_page(buf, c.mail_count, c.direction, c.time_pivot, c.pivot_eid.as_ref())?;
            }
            Command::Delete(c) => {
                c.owner.pack(buf)?;
                put_short_string(buf, &c.mail_addr)?;
                put_list(buf, &c.eids)?;
            }
            Command::State(c) => {
                c.owner.pack(buf)?;
                put_short_string(buf, &c.mail_addr)?;
                buf.put_i64(c.before_time);
            }
        }
        Ok(())
    }
}

/// Retrieval request, signed by the owner over the current serial number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSyn {
    /// Serial number being consumed
    pub sn: SerialNumber,
    /// Owner's signature over `sn`
    pub sig: Vec<u8>,
    /// The command
    pub command: Command,
}

impl WireMessage for CommandSyn {
    fn msg_type(&self) -> MsgType {
        self.command.msg_type()
    }

    fn accepts(msg_type: MsgType) -> bool {
        matches!(
            msg_type,
            MsgType::Retr | MsgType::List | MsgType::Delete | MsgType::Stat
        )
    }

    fn pack_payload(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        self.sn.pack(buf)?;
        put_signature(buf, &self.sig)?;
        self.command.pack(buf)
    }

    fn unpack_payload<B: Buf>(msg_type: MsgType, buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            sn: SerialNumber::unpack(buf).field("sn")?,
            sig: get_signature(buf).field("sig")?,
            command: Command::unpack_as(msg_type, buf).field("command")?,
        })
    }
}

/// One LIST_RESP entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListEntry {
    /// Envelope id
    pub eid: Uuid,
    /// Envelope date, ms since epoch
    pub date: i64,
    /// Packed size of the stored envelope in bytes
    pub size: u32,
}

impl Pack for ListEntry {
    fn pack(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        self.eid.pack(buf)?;
        buf.put_i64(self.date);
        buf.put_u32(self.size);
        Ok(())
    }
}

impl Unpack for ListEntry {
    fn unpack<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            eid: Uuid::unpack(buf).field("eid")?,
            date: get_i64(buf).field("date")?,
            size: get_u32(buf).field("size")?,
        })
    }
}

/// Outcome of deleting one envelope
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeleteResult {
    /// Envelope removed
    Deleted = 0,
    /// No such envelope in the owner's mailbox
    NotFound = 1,
    /// Removal failed
    Failed = 2,
}

impl TryFrom<u32> for DeleteResult {
    type Error = WireError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DeleteResult::Deleted),
            1 => Ok(DeleteResult::NotFound),
            2 => Ok(DeleteResult::Failed),
            _ => Err(WireError::Invalid(format!("delete result {value}"))),
        }
    }
}

/// Per-id delete result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Envelope id
    pub eid: Uuid,
    /// What happened to it
    pub result: DeleteResult,
}

impl Pack for DeleteOutcome {
    fn pack(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        self.eid.pack(buf)?;
        buf.put_u32(self.result as u32);
        Ok(())
    }
}

impl Unpack for DeleteOutcome {
    fn unpack<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            eid: Uuid::unpack(buf).field("eid")?,
            result: get_u32(buf)
                .and_then(DeleteResult::try_from)
                .field("result")?,
        })
    }
}

/// Usage counters for one side of a mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MailboxStats {
    /// Quota in bytes
    pub total_space: i64,
    /// Bytes in use
    pub used_size: i64,
    /// Number of envelopes
    pub total_count: u32,
}

impl Pack for MailboxStats {
    fn pack(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        buf.put_i64(self.total_space);
        buf.put_i64(self.used_size);
        buf.put_u32(self.total_count);
        Ok(())
    }
}

impl Unpack for MailboxStats {
    fn unpack<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            total_space: get_i64(buf).field("total_space")?,
            used_size: get_i64(buf).field("used_size")?,
            total_count: get_u32(buf).field("total_count")?,
        })
    }
}

/// Mailbox state reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateAck {
    /// Envelopes the owner sent
    pub sent: MailboxStats,
    /// Envelopes the owner received
    pub received: MailboxStats,
}

/// Body of a command reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckContent {
    /// RETR_RESP
    Download(Vec<CryptEnvelope>),
    /// LIST_RESP
    List(Vec<ListEntry>),
    /// DELETE_RESP
    Delete(Vec<DeleteOutcome>),
    /// STAT_RESP
    State(StateAck),
}

impl AckContent {
    /// Type the reply is framed with
    pub fn msg_type(&self) -> MsgType {
        match self {
            AckContent::Download(_) => MsgType::RetrResp,
            AckContent::List(_) => MsgType::ListResp,
            AckContent::Delete(_) => MsgType::DeleteResp,
            AckContent::State(_) => MsgType::StatResp,
        }
    }

    /// Empty reply of the kind that answers `command`
    pub fn empty_for(command: &Command) -> Self {
        match command {
            Command::Download(_) => AckContent::Download(Vec::new()),
            Command::List(_) => AckContent::List(Vec::new()),
            Command::Delete(_) => AckContent::Delete(Vec::new()),
            Command::State(_) => AckContent::State(StateAck::default()),
        }
    }

    /// Whether this reply answers `command`
    pub fn answers(&self, command: &Command) -> bool {
        matches!(
            (self, command),
            (AckContent::Download(_), Command::Download(_))
                | (AckContent::List(_), Command::List(_))
                | (AckContent::Delete(_), Command::Delete(_))
                | (AckContent::State(_), Command::State(_))
        )
    }

    fn unpack_as<B: Buf>(msg_type: MsgType, buf: &mut B) -> Result<Self, WireError> {
        match msg_type {
            MsgType::RetrResp => Ok(AckContent::Download(get_list(buf).field("envelopes")?)),
            MsgType::ListResp => Ok(AckContent::List(get_list(buf).field("entries")?)),
            MsgType::DeleteResp => Ok(AckContent::Delete(get_list(buf).field("results")?)),
            MsgType::StatResp => Ok(AckContent::State(StateAck {
                sent: MailboxStats::unpack(buf).field("sent")?,
                received: MailboxStats::unpack(buf).field("received")?,
            })),
            other => Err(WireError::UnexpectedType(other)),
        }
    }
}

impl Pack for AckContent {
    fn pack(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        match self {
            AckContent::Download(envelopes) => put_list(buf, envelopes),
            AckContent::List(entries) => put_list(buf, entries),
            AckContent::Delete(results) => put_list(buf, results),
            AckContent::State(state) => {
                state.sent.pack(buf)?;
                state.received.pack(buf)
            }
        }
    }
}

/// Server reply to a retrieval command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAck {
    /// Serial number consumed by the request
    pub sn: SerialNumber,
    /// Serial number for the next request
    pub next_sn: SerialNumber,
    /// [`CommandAck::binding_hash`] of the command and `content`
    pub hash: Hash,
    /// Server signature over `hash`
    pub sig: Vec<u8>,
    /// Outcome of the command
    pub error_code: ErrorCode,
    /// Reply body
    pub content: AckContent,
}

impl CommandAck {
    /// SHA-256 over the packed command followed by the packed reply content
    pub fn binding_hash(command: &Command, content: &AckContent) -> Result<Hash, WireError> {
        let command = command.packed()?;
        let content = content.packed()?;
        Ok(sha256(&[&command[..], &content[..]]))
    }
}

impl WireMessage for CommandAck {
    fn msg_type(&self) -> MsgType {
        self.content.msg_type()
    }

    fn accepts(msg_type: MsgType) -> bool {
        matches!(
            msg_type,
            MsgType::RetrResp | MsgType::ListResp | MsgType::DeleteResp | MsgType::StatResp
        )
    }

    fn pack_payload(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        self.sn.pack(buf)?;
        self.next_sn.pack(buf)?;
        put_hash(buf, &self.hash)?;
        put_signature(buf, &self.sig)?;
        self.error_code.pack(buf)?;
        self.content.pack(buf)
    }

    fn unpack_payload<B: Buf>(msg_type: MsgType, buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            sn: SerialNumber::unpack(buf).field("sn")?,
            next_sn: SerialNumber::unpack(buf).field("next_sn")?,
            hash: get_hash(buf).field("hash")?,
            sig: get_signature(buf).field("sig")?,
            error_code: ErrorCode::unpack(buf).field("error_code")?,
            content: AckContent::unpack_as(msg_type, buf).field("content")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::tests::sample_envelope;
    use bmail_crypto::Identity;

    fn owner() -> Address {
        Identity::generate().address()
    }

    fn sample_commands() -> Vec<Command> {
        vec![
            Command::Download(CmdDownload {
                owner: owner(),
                mail_addr: "bob@example.bm".into(),
                mail_count: 20,
                direction: Direction::OlderThan,
                time_pivot: 1_700_000_000_000,
                pivot_eid: None,
            }),
            Command::Download(CmdDownload {
                owner: owner(),
                mail_addr: "bob@example.bm".into(),
                mail_count: 0,
                direction: Direction::NewerThan,
                time_pivot: 5_000,
                pivot_eid: Some(Uuid::new_v4()),
            }),
            Command::List(CmdList {
                owner: owner(),
                mail_addr: "bob@example.bm".into(),
                mail_count: 50,
                direction: Direction::OlderThan,
                time_pivot: i64::MAX,
                pivot_eid: None,
            }),
            Command::Delete(CmdDelete {
                owner: owner(),
                mail_addr: "bob@example.bm".into(),
                eids: vec![Uuid::new_v4(), Uuid::new_v4()],
            }),
            Command::Delete(CmdDelete {
                owner: owner(),
                mail_addr: String::new(),
                eids: Vec::new(),
            }),
            Command::State(CmdState {
                owner: owner(),
                mail_addr: "bob@example.bm".into(),
                before_time: i64::MAX,
            }),
        ]
    }

    #[test]
    fn test_command_syn_roundtrip() {
        for command in sample_commands() {
            let syn = CommandSyn {
                sn: SerialNumber::random(),
                sig: vec![1u8; 64],
                command,
            };
            let bytes = syn.pack().unwrap();
            let (decoded, consumed) = CommandSyn::unpack(&bytes).unwrap();
            assert_eq!(decoded, syn);
            assert_eq!(consumed, bytes.len());

            for cut in 0..bytes.len() {
                assert!(CommandSyn::unpack(&bytes[..cut]).is_err(), "cut at {cut}");
            }
        }
    }

    #[test]
    fn test_command_syn_framed_by_command_type() {
        let commands = sample_commands();
        let types: Vec<_> = commands.iter().map(Command::msg_type).collect();
        assert_eq!(
            types,
            vec![
                MsgType::Retr,
                MsgType::Retr,
                MsgType::List,
                MsgType::Delete,
                MsgType::Delete,
                MsgType::Stat
            ]
        );
    }

    #[test]
    fn test_command_ack_roundtrip() {
        let contents = vec![
            AckContent::Download(vec![sample_envelope(1), sample_envelope(2)]),
            AckContent::Download(Vec::new()),
            AckContent::List(vec![
                ListEntry {
                    eid: Uuid::new_v4(),
                    date: 1_000,
                    size: 512,
                },
                ListEntry {
                    eid: Uuid::new_v4(),
                    date: 1_000,
                    size: 77,
                },
            ]),
            AckContent::Delete(vec![
                DeleteOutcome {
                    eid: Uuid::new_v4(),
                    result: DeleteResult::Deleted,
                },
                DeleteOutcome {
                    eid: Uuid::new_v4(),
                    result: DeleteResult::NotFound,
                },
            ]),
            AckContent::State(StateAck {
                sent: MailboxStats {
                    total_space: 1 << 30,
                    used_size: 4096,
                    total_count: 3,
                },
                received: MailboxStats::default(),
            }),
        ];

        for content in contents {
            let ack = CommandAck {
                sn: SerialNumber::random(),
                next_sn: SerialNumber::random(),
                hash: [8u8; 32],
                sig: vec![2u8; 64],
                error_code: ErrorCode::Success,
                content,
            };
            let bytes = ack.pack().unwrap();
            let (decoded, consumed) = CommandAck::unpack(&bytes).unwrap();
            assert_eq!(decoded, ack);
            assert_eq!(consumed, bytes.len());

            for cut in 0..bytes.len() {
                assert!(CommandAck::unpack(&bytes[..cut]).is_err(), "cut at {cut}");
            }
        }
    }

    #[test]
    fn test_binding_hash_covers_request_and_reply() {
        let commands = sample_commands();
        let content = AckContent::Delete(Vec::new());
        let a = CommandAck::binding_hash(&commands[3], &content).unwrap();
        let b = CommandAck::binding_hash(&commands[4], &content).unwrap();
        assert_ne!(a, b);

        let other = AckContent::Delete(vec![DeleteOutcome {
            eid: Uuid::new_v4(),
            result: DeleteResult::Failed,
        }]);
        assert_ne!(a, CommandAck::binding_hash(&commands[3], &other).unwrap());
    }

    #[test]
    fn test_bad_direction() {
        let syn = CommandSyn {
            sn: SerialNumber::random(),
            sig: vec![1u8; 64],
            command: sample_commands().remove(0),
        };
        let mut bytes = syn.pack().unwrap().to_vec();
        // direction sits before the i64 pivot and the empty pivot_eid
        let offset = bytes.len() - 11;
        bytes[offset] = 7;
        let err = CommandSyn::unpack(&bytes).unwrap_err();
        assert_eq!(err.field(), Some("command"));
        assert!(matches!(err.root(), WireError::Invalid(_)));
    }

    #[test]
    fn test_page_size_default() {
        let cmd = CmdDownload {
            owner: owner(),
            mail_addr: String::new(),
            mail_count: 0,
            direction: Direction::NewerThan,
            time_pivot: 0,
            pivot_eid: None,
        };
        assert_eq!(cmd.page_size(), DEFAULT_MAIL_COUNT as usize);
        assert_eq!(CmdDownload { mail_count: 5, ..cmd }.page_size(), 5);
    }

    #[test]
    fn test_content_answers_command() {
        for command in sample_commands() {
            let content = AckContent::empty_for(&command);
            assert!(content.answers(&command));
        }
        let commands = sample_commands();
        assert!(!AckContent::State(StateAck::default()).answers(&commands[0]));
        assert!(!AckContent::Download(Vec::new()).answers(&commands[2]));
    }

    #[test]
    fn test_pivot_eid_layout() {
        let eid = Uuid::new_v4();
        let with_eid = CmdDownload {
            owner: owner(),
            mail_addr: "bob@example.bm".into(),
            mail_count: 20,
            direction: Direction::OlderThan,
            time_pivot: 5_000,
            pivot_eid: Some(eid),
        };
        let without = CmdDownload {
            pivot_eid: None,
            ..with_eid.clone()
        };

        let long = Command::Download(with_eid).packed().unwrap();
        let short = Command::Download(without).packed().unwrap();
        assert_eq!(long.len(), short.len() + 16);
        assert_eq!(&long[long.len() - 16..], eid.as_bytes());
        assert_eq!(&short[short.len() - 2..], &[0, 0]);
    }

    #[test]
    fn test_bad_pivot_eid_length() {
        let syn = CommandSyn {
            sn: SerialNumber::random(),
            sig: vec![1u8; 64],
            command: sample_commands().remove(0),
        };
        let mut bytes = syn.pack().unwrap().to_vec();
        // Swap the empty pivot_eid for a 3-byte one
        bytes.truncate(bytes.len() - 2);
        bytes.extend_from_slice(&[0, 3, 1, 2, 3]);
        let len = (bytes.len() - crate::header::HEADER_SIZE) as u32;
        bytes[6..10].copy_from_slice(&len.to_be_bytes());

        let err = CommandSyn::unpack(&bytes).unwrap_err();
        assert_eq!(err.field(), Some("command"));
        assert!(matches!(err.root(), WireError::Invalid(_)));
    }
}

use crate::engine::AssociationState;
use crate::message::CommandError;
use crate::pdu::{AbortRQSource, AssociationRJ};
use crate::types::Endpoint;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// A value cannot be represented in the upper layer wire format.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("invalid AE title {0:?}, must be 1 to 16 printable ASCII characters")]
    InvalidAeTitle(String),

    #[error("{field} is {length} bytes long, which does not fit in its length field")]
    ItemTooLong { field: &'static str, length: usize },

    #[error("encoded PDU is {length} bytes long, which exceeds the maximum of {max}")]
    PduTooLarge { length: usize, max: u32 },

    #[error("presentation context ID {0} is not an odd number between 1 and 255")]
    InvalidPresentationContextId(u8),

    #[error("presentation context ID {0} is used more than once")]
    DuplicatePresentationContextId(u8),

    #[error("no more presentation context IDs are available")]
    PresentationContextIdsExhausted,

    #[error("no presentation contexts were proposed")]
    NoPresentationContexts,

    #[error("presentation context {0} proposes no transfer syntaxes")]
    NoTransferSyntaxes(u8),

    #[error("maximum PDU length of {0} bytes leaves no room for presentation data")]
    MaxPduLengthTooSmall(u32),
}

/// Received bytes violate the framing rules, or arrive out of order.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("PDU declares {declared} bytes but {available} bytes were given")]
    LengthMismatch { declared: usize, available: usize },

    #[error("unrecognized PDU type 0x{0:02X}")]
    UnrecognizedPduType(u8),

    #[error("PDU ended in the middle of the {0}")]
    Truncated(&'static str),

    #[error("{item} item declares {declared} bytes, which disagrees with its content")]
    InconsistentItemLength { item: &'static str, declared: usize },

    #[error("unexpected item 0x{item_type:02X} inside the {within}")]
    UnexpectedItem { item_type: u8, within: &'static str },

    #[error("{0} is missing")]
    MissingItem(&'static str),

    #[error("invalid value {value} for the {field}")]
    InvalidParameter { field: &'static str, value: u8 },

    #[error("{0} is not valid ASCII text")]
    InvalidText(&'static str),

    #[error("incoming PDU of {length} bytes exceeds the maximum of {max}")]
    PduTooLarge { length: usize, max: u32 },

    #[error("unexpected {pdu} while {state}")]
    UnexpectedPdu {
        pdu: &'static str,
        state: AssociationState,
    },

    #[error("invalid association acceptance: {0}")]
    InvalidAcceptance(String),

    #[error("data fragment on presentation context {0} without a preceding command")]
    DataWithoutCommand(u8),

    #[error("new command on presentation context {0} while the previous message is incomplete")]
    CommandInterleaved(u8),

    #[error("invalid command set: {0}")]
    InvalidCommandSet(String),

    #[error("presentation context {0} was not accepted on this association")]
    UnknownPresentationContext(u8),
}

/// Which protocol timer expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutKind {
    /// No A-ASSOCIATE-RQ arrived on an accepted connection.
    Association,
    /// No answer to our A-ASSOCIATE-RQ.
    Response,
    /// No A-RELEASE-RP arrived.
    Release,
    /// No traffic while associated.
    Idle,
}

impl Display for TimeoutKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TimeoutKind::Association => "association request",
            TimeoutKind::Response => "association response",
            TimeoutKind::Release => "release response",
            TimeoutKind::Idle => "idle",
        };
        f.write_str(name)
    }
}

/// Why an association ended in the aborted state.
#[derive(thiserror::Error, Debug, Clone)]
pub enum AbortCause {
    #[error("aborted by the local user")]
    Local,

    #[error("aborted by the peer ({origin})")]
    Peer { origin: AbortRQSource },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("could not encode PDU: {0}")]
    Encoding(#[from] EncodingError),

    #[error("{0} timer expired")]
    Timeout(TimeoutKind),

    #[error("incoming message exceeds the maximum size of {limit} bytes")]
    MessageTooLarge { limit: usize },

    #[error("transport error: {0}")]
    Io(#[source] Arc<std::io::Error>),
}

impl AbortCause {
    pub(crate) fn io(error: std::io::Error) -> Self {
        Self::Io(Arc::new(error))
    }

    /// The A-ABORT PDU to send the peer, if any.
    pub(crate) fn abort_source(&self) -> Option<AbortRQSource> {
        use crate::pdu::AbortRQServiceProviderReason as Reason;
        match self {
            AbortCause::Local => Some(AbortRQSource::ServiceUser),
            AbortCause::Peer { .. } => None,
            AbortCause::Protocol(e) => Some(AbortRQSource::ServiceProvider(match e {
                ProtocolError::UnrecognizedPduType(_) => Reason::UnrecognizedPdu,
                ProtocolError::UnexpectedPdu { .. } => Reason::UnexpectedPdu,
                ProtocolError::UnexpectedItem { .. } => Reason::UnexpectedPduParameter,
                _ => Reason::InvalidPduParameter,
            })),
            AbortCause::Encoding(_)
            | AbortCause::Timeout(_)
            | AbortCause::MessageTooLarge { .. }
            | AbortCause::Io(_) => Some(AbortRQSource::ServiceProvider(
                Reason::ReasonNotSpecified,
            )),
        }
    }
}

/// Error reported to users of an association.
#[derive(thiserror::Error, Debug)]
pub enum AssociationError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("timed out connecting to {0}")]
    ConnectTimeout(Endpoint),

    #[error("connection to {0} was refused")]
    ConnectionRefused(Endpoint),

    #[error("could not connect to {endpoint}")]
    Connect {
        endpoint: Endpoint,
        source: std::io::Error,
    },

    #[error("peer did not answer the association request in time")]
    ResponseTimeout,

    #[error("peer did not answer the release request in time")]
    ReleaseTimeout,

    #[error("message exceeds the maximum size of {0} bytes")]
    MessageTooLarge(usize),

    #[error("association rejected: {0}")]
    Rejected(AssociationRJ),

    #[error("association aborted: {0}")]
    Aborted(AbortCause),

    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: AssociationState,
    },

    #[error("presentation context {0} was not accepted")]
    PresentationContextNotAccepted(u8),

    #[error("no accepted presentation context for abstract syntax {0}")]
    NoPresentationContext(String),

    #[error("expected a response to message {expected}, got one for {actual:?}")]
    UnexpectedResponse { expected: u16, actual: Option<u16> },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<AbortCause> for AssociationError {
    fn from(cause: AbortCause) -> Self {
        match cause {
            AbortCause::Timeout(TimeoutKind::Response | TimeoutKind::Association) => {
                AssociationError::ResponseTimeout
            }
            AbortCause::Timeout(TimeoutKind::Release) => AssociationError::ReleaseTimeout,
            AbortCause::MessageTooLarge { limit } => AssociationError::MessageTooLarge(limit),
            cause => AssociationError::Aborted(cause),
        }
    }
}

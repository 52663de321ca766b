//! DICOM upper layer protocol data units (PS3.8 section 9.3).
//!
//! [`encode`] and [`decode`] are pure transformations between a [`Pdu`]
//! and its exact byte encoding. [`read_pdu`] pulls complete PDUs out of a
//! growing receive buffer.

mod reader;
mod writer;

pub use reader::{decode, pdu_length, read_pdu};
pub use writer::{encode, validate_ae_title};

use bytes::Bytes;
use std::fmt::{Display, Formatter};

/// Length of the PDU type, reserved and length fields.
pub const PDU_HEADER_LENGTH: usize = 6;

/// Length of the PDV item length, context ID and message control header fields.
pub const PDV_HEADER_LENGTH: usize = 6;

/// Default maximum PDU length.
pub const DEFAULT_MAX_PDU: u32 = 16_384;

/// Hard ceiling on the size of any incoming PDU.
pub const MAXIMUM_PDU_SIZE: u32 = 64 * 1024 * 1024;

/// The only protocol version defined by the standard.
pub const PROTOCOL_VERSION: u16 = 0x0001;

pub(crate) mod pdu_type {
    pub const ASSOCIATE_RQ: u8 = 0x01;
    pub const ASSOCIATE_AC: u8 = 0x02;
    pub const ASSOCIATE_RJ: u8 = 0x03;
    pub const P_DATA_TF: u8 = 0x04;
    pub const RELEASE_RQ: u8 = 0x05;
    pub const RELEASE_RP: u8 = 0x06;
    pub const ABORT_RQ: u8 = 0x07;
}

pub(crate) mod item_type {
    pub const APPLICATION_CONTEXT: u8 = 0x10;
    pub const PRESENTATION_CONTEXT_RQ: u8 = 0x20;
    pub const PRESENTATION_CONTEXT_AC: u8 = 0x21;
    pub const ABSTRACT_SYNTAX: u8 = 0x30;
    pub const TRANSFER_SYNTAX: u8 = 0x40;
    pub const USER_INFORMATION: u8 = 0x50;
    pub const MAX_LENGTH: u8 = 0x51;
    pub const IMPLEMENTATION_CLASS_UID: u8 = 0x52;
    pub const ASYNC_OPERATIONS_WINDOW: u8 = 0x53;
    pub const ROLE_SELECTION: u8 = 0x54;
    pub const IMPLEMENTATION_VERSION_NAME: u8 = 0x55;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pdu {
    AssociationRQ(AssociationRQ),
    AssociationAC(AssociationAC),
    AssociationRJ(AssociationRJ),
    PData { data: Vec<PDataValue> },
    ReleaseRQ,
    ReleaseRP,
    AbortRQ { source: AbortRQSource },
}

impl Pdu {
    /// The standard name of this kind of PDU.
    pub fn kind(&self) -> &'static str {
        match self {
            Pdu::AssociationRQ(_) => "A-ASSOCIATE-RQ",
            Pdu::AssociationAC(_) => "A-ASSOCIATE-AC",
            Pdu::AssociationRJ(_) => "A-ASSOCIATE-RJ",
            Pdu::PData { .. } => "P-DATA-TF",
            Pdu::ReleaseRQ => "A-RELEASE-RQ",
            Pdu::ReleaseRP => "A-RELEASE-RP",
            Pdu::AbortRQ { .. } => "A-ABORT",
        }
    }

    /// One-line summary, for logs.
    pub fn short_description(&self) -> String {
        match self {
            Pdu::AssociationRQ(rq) => format!(
                "A-ASSOCIATE-RQ {} -> {} with {} presentation contexts",
                rq.calling_ae_title,
                rq.called_ae_title,
                rq.presentation_contexts.len()
            ),
            Pdu::AssociationAC(ac) => format!(
                "A-ASSOCIATE-AC {} -> {} with {} presentation contexts",
                ac.calling_ae_title,
                ac.called_ae_title,
                ac.presentation_contexts.len()
            ),
            Pdu::AssociationRJ(rj) => format!("A-ASSOCIATE-RJ {rj}"),
            Pdu::PData { data } => {
                let bytes: usize = data.iter().map(|pdv| pdv.data.len()).sum();
                format!("P-DATA-TF with {} PDVs ({bytes} bytes)", data.len())
            }
            Pdu::ReleaseRQ => "A-RELEASE-RQ".to_string(),
            Pdu::ReleaseRP => "A-RELEASE-RP".to_string(),
            Pdu::AbortRQ { source } => format!("A-ABORT ({source})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationRQ {
    pub protocol_version: u16,
    pub calling_ae_title: String,
    pub called_ae_title: String,
    pub application_context_name: String,
    pub presentation_contexts: Vec<PresentationContextProposed>,
    pub user_variables: Vec<UserVariableItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationAC {
    pub protocol_version: u16,
    pub calling_ae_title: String,
    pub called_ae_title: String,
    pub application_context_name: String,
    pub presentation_contexts: Vec<PresentationContextResult>,
    pub user_variables: Vec<UserVariableItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociationRJ {
    pub result: AssociationRJResult,
    pub source: AssociationRJSource,
}

impl Display for AssociationRJ {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} rejection by {:?}", self.result, self.source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationContextProposed {
    pub id: u8,
    pub abstract_syntax: String,
    pub transfer_syntaxes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationContextResult {
    pub id: u8,
    pub reason: PresentationContextResultReason,
    pub transfer_syntax: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationContextResultReason {
    Acceptance,
    UserRejection,
    NoReason,
    AbstractSyntaxNotSupported,
    TransferSyntaxesNotSupported,
}

impl PresentationContextResultReason {
    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Acceptance),
            1 => Some(Self::UserRejection),
            2 => Some(Self::NoReason),
            3 => Some(Self::AbstractSyntaxNotSupported),
            4 => Some(Self::TransferSyntaxesNotSupported),
            _ => None,
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Acceptance => 0,
            Self::UserRejection => 1,
            Self::NoReason => 2,
            Self::AbstractSyntaxNotSupported => 3,
            Self::TransferSyntaxesNotSupported => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationRJResult {
    Permanent,
    Transient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationRJSource {
    ServiceUser(AssociationRJServiceUserReason),
    ServiceProviderASCE(AssociationRJServiceProviderASCEReason),
    ServiceProviderPresentation(AssociationRJServiceProviderPresentationReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationRJServiceUserReason {
    NoReasonGiven,
    ApplicationContextNameNotSupported,
    CallingAETitleNotRecognized,
    CalledAETitleNotRecognized,
    Reserved(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationRJServiceProviderASCEReason {
    NoReasonGiven,
    ProtocolVersionNotSupported,
    Reserved(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationRJServiceProviderPresentationReason {
    TemporaryCongestion,
    LocalLimitExceeded,
    Reserved(u8),
}

impl AssociationRJResult {
    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Permanent),
            2 => Some(Self::Transient),
            _ => None,
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Permanent => 1,
            Self::Transient => 2,
        }
    }
}

impl AssociationRJSource {
    pub(crate) fn from_codes(source: u8, reason: u8) -> Option<Self> {
        use AssociationRJServiceProviderASCEReason as Asce;
        use AssociationRJServiceProviderPresentationReason as Presentation;
        use AssociationRJServiceUserReason as User;
        let source = match source {
            1 => Self::ServiceUser(match reason {
                1 => User::NoReasonGiven,
                2 => User::ApplicationContextNameNotSupported,
                3 => User::CallingAETitleNotRecognized,
                7 => User::CalledAETitleNotRecognized,
                other => User::Reserved(other),
            }),
            2 => Self::ServiceProviderASCE(match reason {
                1 => Asce::NoReasonGiven,
                2 => Asce::ProtocolVersionNotSupported,
                other => Asce::Reserved(other),
            }),
            3 => Self::ServiceProviderPresentation(match reason {
                1 => Presentation::TemporaryCongestion,
                2 => Presentation::LocalLimitExceeded,
                other => Presentation::Reserved(other),
            }),
            _ => return None,
        };
        Some(source)
    }

    pub(crate) fn codes(self) -> (u8, u8) {
        use AssociationRJServiceProviderASCEReason as Asce;
        use AssociationRJServiceProviderPresentationReason as Presentation;
        use AssociationRJServiceUserReason as User;
        match self {
            Self::ServiceUser(reason) => (
                1,
                match reason {
                    User::NoReasonGiven => 1,
                    User::ApplicationContextNameNotSupported => 2,
                    User::CallingAETitleNotRecognized => 3,
                    User::CalledAETitleNotRecognized => 7,
                    User::Reserved(other) => other,
                },
            ),
            Self::ServiceProviderASCE(reason) => (
                2,
                match reason {
                    Asce::NoReasonGiven => 1,
                    Asce::ProtocolVersionNotSupported => 2,
                    Asce::Reserved(other) => other,
                },
            ),
            Self::ServiceProviderPresentation(reason) => (
                3,
                match reason {
                    Presentation::TemporaryCongestion => 1,
                    Presentation::LocalLimitExceeded => 2,
                    Presentation::Reserved(other) => other,
                },
            ),
        }
    }
}

/// A fragment of a command set or dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PDataValue {
    pub presentation_context_id: u8,
    pub value_type: PDataValueType,
    pub is_last: bool,
    pub data: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PDataValueType {
    Command,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortRQSource {
    ServiceUser,
    Reserved,
    ServiceProvider(AbortRQServiceProviderReason),
}

impl Display for AbortRQSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortRQSource::ServiceUser => f.write_str("service user"),
            AbortRQSource::Reserved => f.write_str("reserved source"),
            AbortRQSource::ServiceProvider(reason) => write!(f, "service provider, {reason:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortRQServiceProviderReason {
    ReasonNotSpecified,
    UnrecognizedPdu,
    UnexpectedPdu,
    Reserved,
    UnrecognizedPduParameter,
    UnexpectedPduParameter,
    InvalidPduParameter,
}

impl AbortRQSource {
    pub(crate) fn from_codes(source: u8, reason: u8) -> Option<Self> {
        use AbortRQServiceProviderReason as Reason;
        match source {
            0 => Some(Self::ServiceUser),
            1 => Some(Self::Reserved),
            2 => Some(Self::ServiceProvider(match reason {
                0 => Reason::ReasonNotSpecified,
                1 => Reason::UnrecognizedPdu,
                2 => Reason::UnexpectedPdu,
                4 => Reason::UnrecognizedPduParameter,
                5 => Reason::UnexpectedPduParameter,
                6 => Reason::InvalidPduParameter,
                _ => Reason::Reserved,
            })),
            _ => None,
        }
    }

    pub(crate) fn codes(self) -> (u8, u8) {
        use AbortRQServiceProviderReason as Reason;
        match self {
            Self::ServiceUser => (0, 0),
            Self::Reserved => (1, 0),
            Self::ServiceProvider(reason) => (
                2,
                match reason {
                    Reason::ReasonNotSpecified => 0,
                    Reason::UnrecognizedPdu => 1,
                    Reason::UnexpectedPdu => 2,
                    Reason::Reserved => 3,
                    Reason::UnrecognizedPduParameter => 4,
                    Reason::UnexpectedPduParameter => 5,
                    Reason::InvalidPduParameter => 6,
                },
            ),
        }
    }
}

/// Sub-items of the user information item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserVariableItem {
    MaxLength(u32),
    ImplementationClassUID(String),
    ImplementationVersionName(String),
    AsyncOperationsWindow {
        max_operations_invoked: u16,
        max_operations_performed: u16,
    },
    RoleSelection(RoleSelection),
    /// A sub-item this crate does not interpret, kept as raw bytes.
    Unknown(u8, Bytes),
}

/// SCP/SCU role selection for one SOP class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSelection {
    pub sop_class_uid: String,
    pub scu_role: bool,
    pub scp_role: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EncodingError, ProtocolError};
    use bytes::BytesMut;
    use pretty_assertions::assert_eq;
    use rstest::*;

    const VERIFICATION: &str = "1.2.840.10008.1.1";
    const IMPLICIT_VR_LE: &str = "1.2.840.10008.1.2";
    const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";

    fn associate_rq() -> AssociationRQ {
        AssociationRQ {
            protocol_version: PROTOCOL_VERSION,
            calling_ae_title: "STORESCU".to_string(),
            called_ae_title: "OXIDUL".to_string(),
            application_context_name: "1.2.840.10008.3.1.1.1".to_string(),
            presentation_contexts: vec![
                PresentationContextProposed {
                    id: 1,
                    abstract_syntax: VERIFICATION.to_string(),
                    transfer_syntaxes: vec![IMPLICIT_VR_LE.to_string(), EXPLICIT_VR_LE.to_string()],
                },
                PresentationContextProposed {
                    id: 3,
                    abstract_syntax: "1.2.840.10008.5.1.4.1.1.7".to_string(),
                    transfer_syntaxes: vec![EXPLICIT_VR_LE.to_string()],
                },
            ],
            user_variables: vec![
                UserVariableItem::MaxLength(16384),
                UserVariableItem::ImplementationClassUID("1.2.3.4".to_string()),
                UserVariableItem::AsyncOperationsWindow {
                    max_operations_invoked: 1,
                    max_operations_performed: 1,
                },
                UserVariableItem::RoleSelection(RoleSelection {
                    sop_class_uid: VERIFICATION.to_string(),
                    scu_role: true,
                    scp_role: false,
                }),
                UserVariableItem::Unknown(0x58, Bytes::from_static(&[0, 1, 2, 3])),
                UserVariableItem::ImplementationVersionName("TEST_1".to_string()),
            ],
        }
    }

    fn associate_ac() -> AssociationAC {
        AssociationAC {
            protocol_version: PROTOCOL_VERSION,
            calling_ae_title: "STORESCU".to_string(),
            called_ae_title: "OXIDUL".to_string(),
            application_context_name: "1.2.840.10008.3.1.1.1".to_string(),
            presentation_contexts: vec![
                PresentationContextResult {
                    id: 1,
                    reason: PresentationContextResultReason::Acceptance,
                    transfer_syntax: EXPLICIT_VR_LE.to_string(),
                },
                PresentationContextResult {
                    id: 3,
                    reason: PresentationContextResultReason::AbstractSyntaxNotSupported,
                    transfer_syntax: String::new(),
                },
            ],
            user_variables: vec![UserVariableItem::MaxLength(0)],
        }
    }

    fn pdata() -> Pdu {
        Pdu::PData {
            data: vec![
                PDataValue {
                    presentation_context_id: 1,
                    value_type: PDataValueType::Command,
                    is_last: true,
                    data: Bytes::from_static(b"command bytes"),
                },
                PDataValue {
                    presentation_context_id: 1,
                    value_type: PDataValueType::Data,
                    is_last: false,
                    data: Bytes::from_static(b"first dataset fragment"),
                },
            ],
        }
    }

    #[rstest]
    #[case(Pdu::AssociationRQ(associate_rq()))]
    #[case(Pdu::AssociationAC(associate_ac()))]
    #[case(Pdu::AssociationRJ(AssociationRJ {
        result: AssociationRJResult::Transient,
        source: AssociationRJSource::ServiceProviderPresentation(
            AssociationRJServiceProviderPresentationReason::Reserved(5)
        ),
    }))]
    #[case(pdata())]
    #[case(Pdu::ReleaseRQ)]
    #[case(Pdu::ReleaseRP)]
    #[case(Pdu::AbortRQ { source: AbortRQSource::ServiceUser })]
    #[case(Pdu::AbortRQ {
        source: AbortRQSource::ServiceProvider(AbortRQServiceProviderReason::UnexpectedPdu)
    })]
    fn test_round_trip(#[case] pdu: Pdu) {
        let encoded = encode(&pdu, MAXIMUM_PDU_SIZE).unwrap();
        assert_eq!(pdu_length(&encoded), Some(encoded.len()));
        assert_eq!(decode(encoded).unwrap(), pdu);
    }

    #[test]
    fn test_associate_rq_layout() {
        let encoded = encode(&Pdu::AssociationRQ(associate_rq()), MAXIMUM_PDU_SIZE).unwrap();
        assert_eq!(encoded[0], 0x01);
        assert_eq!(&encoded[6..8], &[0x00, 0x01]);
        assert_eq!(&encoded[10..26], b"OXIDUL          ");
        assert_eq!(&encoded[26..42], b"STORESCU        ");
        assert_eq!(encoded[74], 0x10);
    }

    #[rstest]
    #[case(
        Pdu::AssociationRJ(AssociationRJ {
            result: AssociationRJResult::Permanent,
            source: AssociationRJSource::ServiceUser(
                AssociationRJServiceUserReason::CalledAETitleNotRecognized
            ),
        }),
        &[0x03, 0, 0, 0, 0, 4, 0, 1, 1, 7]
    )]
    #[case(
        Pdu::AbortRQ {
            source: AbortRQSource::ServiceProvider(
                AbortRQServiceProviderReason::InvalidPduParameter
            )
        },
        &[0x07, 0, 0, 0, 0, 4, 0, 0, 2, 6]
    )]
    #[case(Pdu::ReleaseRP, &[0x06, 0, 0, 0, 0, 4, 0, 0, 0, 0])]
    fn test_fixed_layouts(#[case] pdu: Pdu, #[case] expected: &[u8]) {
        assert_eq!(&encode(&pdu, MAXIMUM_PDU_SIZE).unwrap()[..], expected);
    }

    #[test]
    fn test_decode_trims_uid_padding() {
        let mut rq = associate_rq();
        rq.presentation_contexts[0].abstract_syntax = format!("{VERIFICATION}\0");
        let encoded = encode(&Pdu::AssociationRQ(rq), MAXIMUM_PDU_SIZE).unwrap();
        let Pdu::AssociationRQ(decoded) = decode(encoded).unwrap() else {
            panic!("expected an A-ASSOCIATE-RQ")
        };
        assert_eq!(decoded.presentation_contexts[0].abstract_syntax, VERIFICATION);
    }

    #[test]
    fn test_decode_length_mismatch() {
        let mut raw = encode(&Pdu::ReleaseRQ, MAXIMUM_PDU_SIZE).unwrap().to_vec();
        raw.push(0);
        assert_eq!(
            decode(Bytes::from(raw)),
            Err(ProtocolError::LengthMismatch {
                declared: 10,
                available: 11
            })
        );
    }

    #[test]
    fn test_decode_unrecognized_type() {
        assert_eq!(
            decode(Bytes::from_static(&[0x09, 0, 0, 0, 0, 0])),
            Err(ProtocolError::UnrecognizedPduType(0x09))
        );
    }

    #[test]
    fn test_decode_pdv_longer_than_pdu() {
        let raw = Bytes::from_static(&[0x04, 0, 0, 0, 0, 8, 0, 0, 0, 100, 1, 3, 0xAA, 0xBB]);
        assert_eq!(
            decode(raw),
            Err(ProtocolError::InconsistentItemLength {
                item: "presentation data value",
                declared: 100
            })
        );
    }

    #[test]
    fn test_decode_nested_item_overruns_presentation_context() {
        let mut raw = encode(&Pdu::AssociationRQ(associate_rq()), MAXIMUM_PDU_SIZE)
            .unwrap()
            .to_vec();
        // header (74) + application context item (4 + 21) puts the first
        // presentation context at 99 and its abstract syntax item at 107
        assert_eq!(raw[99], 0x20);
        assert_eq!(raw[107], 0x30);
        raw[109] = 0xFF;
        raw[110] = 0xFF;
        assert_eq!(
            decode(Bytes::from(raw)),
            Err(ProtocolError::InconsistentItemLength {
                item: "presentation context",
                declared: 0xFFFF
            })
        );
    }

    #[rstest]
    #[case("THIS_AE_TITLE_IS_TOO_LONG")]
    #[case("")]
    #[case("   ")]
    #[case("BACK\\SLASH")]
    fn test_encode_invalid_ae_title(#[case] ae_title: &str) {
        let mut rq = associate_rq();
        rq.calling_ae_title = ae_title.to_string();
        assert_eq!(
            encode(&Pdu::AssociationRQ(rq), MAXIMUM_PDU_SIZE),
            Err(EncodingError::InvalidAeTitle(ae_title.to_string()))
        );
    }

    #[test]
    fn test_encode_exceeds_max_length() {
        let pdu = Pdu::PData {
            data: vec![PDataValue {
                presentation_context_id: 1,
                value_type: PDataValueType::Data,
                is_last: true,
                data: Bytes::from(vec![0u8; 100]),
            }],
        };
        assert_eq!(
            encode(&pdu, 50),
            Err(EncodingError::PduTooLarge {
                length: 112,
                max: 50
            })
        );
        assert_eq!(encode(&pdu, 112).unwrap().len(), 112);
    }

    #[test]
    fn test_read_pdu_waits_for_complete_pdu() {
        let encoded = encode(&pdata(), MAXIMUM_PDU_SIZE).unwrap();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encoded[..4]);
        assert_eq!(read_pdu(&mut buf, DEFAULT_MAX_PDU, true), Ok(None));
        buf.extend_from_slice(&encoded[4..20]);
        assert_eq!(read_pdu(&mut buf, DEFAULT_MAX_PDU, true), Ok(None));
        buf.extend_from_slice(&encoded[20..]);
        buf.extend_from_slice(&encode(&Pdu::ReleaseRQ, MAXIMUM_PDU_SIZE).unwrap());
        assert_eq!(read_pdu(&mut buf, DEFAULT_MAX_PDU, true), Ok(Some(pdata())));
        assert_eq!(read_pdu(&mut buf, DEFAULT_MAX_PDU, true), Ok(Some(Pdu::ReleaseRQ)));
        assert!(buf.is_empty());
    }

    #[rstest]
    #[case(true, Err(ProtocolError::PduTooLarge { length: 1006, max: 100 }))]
    #[case(false, Ok(None))]
    fn test_read_pdu_strict_limit(
        #[case] strict: bool,
        #[case] expected: Result<Option<Pdu>, ProtocolError>,
    ) {
        // header of a P-DATA-TF declaring 1006 bytes, body not yet received
        let mut buf = BytesMut::from(&[0x04, 0, 0, 0, 0x03, 0xEE][..]);
        assert_eq!(read_pdu(&mut buf, 100, strict), expected);
    }

    #[test]
    fn test_read_pdu_rejects_unknown_type_early() {
        let mut buf = BytesMut::from(&[0x42, 0, 0xFF, 0xFF, 0xFF, 0xFF][..]);
        assert_eq!(
            read_pdu(&mut buf, DEFAULT_MAX_PDU, false),
            Err(ProtocolError::UnrecognizedPduType(0x42))
        );
    }
}

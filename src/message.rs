//! Whole DIMSE messages, and the few command sets this crate builds itself.

use bytes::Bytes;
use dicom::core::{DataDictionary, DataElement, Tag, VR};
use dicom::dicom_value;
use dicom::dictionary_std::{tags, uids, StandardDataDictionary};
use dicom::object::InMemDicomObject;

/// Command field values.
pub mod command_field {
    pub const C_STORE_RQ: u16 = 0x0001;
    pub const C_STORE_RSP: u16 = 0x8001;
    pub const C_ECHO_RQ: u16 = 0x0030;
    pub const C_ECHO_RSP: u16 = 0x8030;
}

/// DIMSE status values.
pub mod status {
    pub const SUCCESS: u16 = 0x0000;
    pub const SOP_CLASS_NOT_SUPPORTED: u16 = 0x0122;
    pub const OUT_OF_RESOURCES: u16 = 0xA700;
    pub const CANNOT_UNDERSTAND: u16 = 0xC000;
}

/// Command Data Set Type meaning "no dataset follows".
pub const NO_DATASET: u16 = 0x0101;

/// A reassembled DIMSE message on one presentation context.
///
/// The command set is always implicit VR little endian. The dataset, if any,
/// is encoded with the transfer syntax accepted for the presentation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub presentation_context_id: u8,
    pub command: Bytes,
    pub dataset: Option<Bytes>,
}

impl Message {
    pub fn new(presentation_context_id: u8, command: Bytes) -> Self {
        Self {
            presentation_context_id,
            command,
            dataset: None,
        }
    }

    pub fn with_dataset(mut self, dataset: Bytes) -> Self {
        self.dataset = Some(dataset);
        self
    }

    pub fn from_command_object(
        presentation_context_id: u8,
        command: &InMemDicomObject,
    ) -> Result<Self, CommandError> {
        Ok(Self::new(presentation_context_id, write_command(command)?))
    }

    /// Number of command and dataset bytes.
    pub fn payload_len(&self) -> usize {
        self.command.len() + self.dataset.as_ref().map(Bytes::len).unwrap_or(0)
    }

    pub fn command_object(&self) -> Result<InMemDicomObject, CommandError> {
        read_command(&self.command)
    }

    pub fn summary(&self) -> Result<CommandSummary, CommandError> {
        CommandSummary::from_object(&self.command_object()?)
    }
}

/// Error which might happen while reading or writing a command set.
#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("Failed to read DIMSE command")]
    Read(#[from] dicom::object::ReadError),

    #[error("Failed to write DIMSE command")]
    Write(#[from] dicom::object::WriteError),

    #[error("Missing {}", name_of(.0))]
    MissingTag(Tag),

    #[error("Value for {} is not a number", name_of(.0))]
    InvalidNumber(Tag),

    #[error("Could not retrieve {}", name_of(.0))]
    CouldNotRetrieve(Tag),
}

/// Get the standard name of a tag.
fn name_of(tag: &Tag) -> &'static str {
    StandardDataDictionary
        .by_tag(*tag)
        .map(|e| e.alias)
        .unwrap_or("unknown attribute")
}

/// Encode a command set. Commands are always implicit VR little endian.
pub fn write_command(command: &InMemDicomObject) -> Result<Bytes, CommandError> {
    let ts = dicom::transfer_syntax::entries::IMPLICIT_VR_LITTLE_ENDIAN.erased();
    let mut data = Vec::new();
    command.write_dataset_with_ts(&mut data, &ts)?;
    Ok(Bytes::from(data))
}

pub fn read_command(command: &[u8]) -> Result<InMemDicomObject, CommandError> {
    let ts = dicom::transfer_syntax::entries::IMPLICIT_VR_LITTLE_ENDIAN.erased();
    Ok(InMemDicomObject::read_dataset_with_ts(command, &ts)?)
}

/// Whether a dataset follows the given encoded command set.
pub fn command_has_dataset(command: &[u8]) -> Result<bool, CommandError> {
    let obj = read_command(command)?;
    let data_set_type = obj
        .element(tags::COMMAND_DATA_SET_TYPE)
        .map_err(|_| CommandError::MissingTag(tags::COMMAND_DATA_SET_TYPE))?
        .to_int::<u16>()
        .map_err(|_| CommandError::InvalidNumber(tags::COMMAND_DATA_SET_TYPE))?;
    Ok(data_set_type != NO_DATASET)
}

/// The attributes of a command set that routing and statistics care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSummary {
    pub command_field: u16,
    pub message_id: Option<u16>,
    pub message_id_being_responded_to: Option<u16>,
    pub status: Option<u16>,
    pub affected_sop_class_uid: Option<String>,
    pub affected_sop_instance_uid: Option<String>,
    pub has_dataset: bool,
}

impl CommandSummary {
    pub fn from_object(obj: &InMemDicomObject) -> Result<Self, CommandError> {
        let command_field = obj
            .element(tags::COMMAND_FIELD)
            .map_err(|_| CommandError::MissingTag(tags::COMMAND_FIELD))?
            .uint16()
            .map_err(|_| CommandError::InvalidNumber(tags::COMMAND_FIELD))?;
        let data_set_type = optional_u16(obj, tags::COMMAND_DATA_SET_TYPE)?;
        Ok(Self {
            command_field,
            message_id: optional_u16(obj, tags::MESSAGE_ID)?,
            message_id_being_responded_to: optional_u16(obj, tags::MESSAGE_ID_BEING_RESPONDED_TO)?,
            status: optional_u16(obj, tags::STATUS)?,
            affected_sop_class_uid: optional_str(obj, tags::AFFECTED_SOP_CLASS_UID)?,
            affected_sop_instance_uid: optional_str(obj, tags::AFFECTED_SOP_INSTANCE_UID)?,
            has_dataset: data_set_type.is_some_and(|t| t != NO_DATASET),
        })
    }

    pub fn is_response(&self) -> bool {
        self.command_field & 0x8000 != 0
    }
}

fn optional_u16(obj: &InMemDicomObject, tag: Tag) -> Result<Option<u16>, CommandError> {
    obj.get(tag)
        .map(|e| e.to_int::<u16>().map_err(|_| CommandError::InvalidNumber(tag)))
        .transpose()
}

fn optional_str(obj: &InMemDicomObject, tag: Tag) -> Result<Option<String>, CommandError> {
    obj.get(tag)
        .map(|e| {
            e.to_str()
                .map(|s| s.trim_end_matches(['\0', ' ']).to_string())
                .map_err(|_| CommandError::CouldNotRetrieve(tag))
        })
        .transpose()
}

pub fn echo_request(message_id: u16) -> InMemDicomObject {
    InMemDicomObject::command_from_element_iter([
        DataElement::new(
            tags::AFFECTED_SOP_CLASS_UID,
            VR::UI,
            dicom_value!(Str, uids::VERIFICATION),
        ),
        DataElement::new(
            tags::COMMAND_FIELD,
            VR::US,
            dicom_value!(U16, [command_field::C_ECHO_RQ]),
        ),
        DataElement::new(tags::MESSAGE_ID, VR::US, dicom_value!(U16, [message_id])),
        DataElement::new(
            tags::COMMAND_DATA_SET_TYPE,
            VR::US,
            dicom_value!(U16, [NO_DATASET]),
        ),
    ])
}

pub fn echo_response(message_id: u16, status: u16) -> InMemDicomObject {
    InMemDicomObject::command_from_element_iter([
        DataElement::new(
            tags::AFFECTED_SOP_CLASS_UID,
            VR::UI,
            dicom_value!(Str, uids::VERIFICATION),
        ),
        DataElement::new(
            tags::COMMAND_FIELD,
            VR::US,
            dicom_value!(U16, [command_field::C_ECHO_RSP]),
        ),
        DataElement::new(
            tags::MESSAGE_ID_BEING_RESPONDED_TO,
            VR::US,
            dicom_value!(U16, [message_id]),
        ),
        DataElement::new(
            tags::COMMAND_DATA_SET_TYPE,
            VR::US,
            dicom_value!(U16, [NO_DATASET]),
        ),
        DataElement::new(tags::STATUS, VR::US, dicom_value!(U16, [status])),
    ])
}

pub fn store_request(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
) -> InMemDicomObject {
    InMemDicomObject::command_from_element_iter([
        DataElement::new(
            tags::AFFECTED_SOP_CLASS_UID,
            VR::UI,
            dicom_value!(Str, sop_class_uid),
        ),
        DataElement::new(
            tags::COMMAND_FIELD,
            VR::US,
            dicom_value!(U16, [command_field::C_STORE_RQ]),
        ),
        DataElement::new(tags::MESSAGE_ID, VR::US, dicom_value!(U16, [message_id])),
        DataElement::new(tags::PRIORITY, VR::US, dicom_value!(U16, [0x0000])),
        DataElement::new(
            tags::COMMAND_DATA_SET_TYPE,
            VR::US,
            dicom_value!(U16, [0x0000]),
        ),
        DataElement::new(
            tags::AFFECTED_SOP_INSTANCE_UID,
            VR::UI,
            dicom_value!(Str, sop_instance_uid),
        ),
    ])
}

pub fn store_response(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    status: u16,
) -> InMemDicomObject {
    InMemDicomObject::command_from_element_iter([
        DataElement::new(
            tags::AFFECTED_SOP_CLASS_UID,
            VR::UI,
            dicom_value!(Str, sop_class_uid),
        ),
        DataElement::new(
            tags::COMMAND_FIELD,
            VR::US,
            dicom_value!(U16, [command_field::C_STORE_RSP]),
        ),
        DataElement::new(
            tags::MESSAGE_ID_BEING_RESPONDED_TO,
            VR::US,
            dicom_value!(U16, [message_id]),
        ),
        DataElement::new(
            tags::COMMAND_DATA_SET_TYPE,
            VR::US,
            dicom_value!(U16, [NO_DATASET]),
        ),
        DataElement::new(tags::STATUS, VR::US, dicom_value!(U16, [status])),
        DataElement::new(
            tags::AFFECTED_SOP_INSTANCE_UID,
            VR::UI,
            dicom_value!(Str, sop_instance_uid),
        ),
    ])
}

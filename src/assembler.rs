//! Splitting messages into P-DATA-TF PDUs and stitching them back together.

use crate::error::{EncodingError, ProtocolError};
use crate::message::{command_has_dataset, Message};
use crate::pdu::{PDataValue, PDataValueType, Pdu, PDU_HEADER_LENGTH, PDV_HEADER_LENGTH};
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;

/// Bytes of a P-DATA-TF PDU carrying a single PDV that are not payload.
pub const PDATA_OVERHEAD: u32 = (PDU_HEADER_LENGTH + PDV_HEADER_LENGTH) as u32;

/// Default cap on the size of one reassembled message.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 512 * 1024 * 1024;

/// Split a message into P-DATA-TF PDUs of at most `max_pdu_length` encoded bytes.
///
/// Each PDU carries one PDV. The command always produces at least one PDV,
/// and so does a dataset, even an empty one.
pub fn fragment(message: &Message, max_pdu_length: u32) -> Result<Vec<Pdu>, EncodingError> {
    if max_pdu_length <= PDATA_OVERHEAD {
        return Err(EncodingError::MaxPduLengthTooSmall(max_pdu_length));
    }
    let chunk = (max_pdu_length - PDATA_OVERHEAD) as usize;
    let mut pdus = Vec::new();
    push_fragments(
        &mut pdus,
        message.presentation_context_id,
        PDataValueType::Command,
        &message.command,
        chunk,
    );
    if let Some(dataset) = &message.dataset {
        push_fragments(
            &mut pdus,
            message.presentation_context_id,
            PDataValueType::Data,
            dataset,
            chunk,
        );
    }
    Ok(pdus)
}

fn push_fragments(
    pdus: &mut Vec<Pdu>,
    presentation_context_id: u8,
    value_type: PDataValueType,
    data: &Bytes,
    chunk: usize,
) {
    let mut start = 0;
    loop {
        let end = usize::min(start + chunk, data.len());
        let is_last = end == data.len();
        pdus.push(Pdu::PData {
            data: vec![PDataValue {
                presentation_context_id,
                value_type,
                is_last,
                data: data.slice(start..end),
            }],
        });
        if is_last {
            break;
        }
        start = end;
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("message exceeds the maximum size of {limit} bytes")]
    MessageTooLarge { limit: usize },
}

#[derive(Default)]
struct PartialMessage {
    command: BytesMut,
    /// Set once the last command fragment arrived and a dataset was announced.
    awaiting_dataset: bool,
    dataset: BytesMut,
}

impl PartialMessage {
    fn len(&self) -> usize {
        self.command.len() + self.dataset.len()
    }
}

/// Reassembles incoming PDVs into messages, one partial message per
/// presentation context.
pub struct MessageAssembler {
    partial: HashMap<u8, PartialMessage>,
    max_message_size: usize,
}

impl MessageAssembler {
    pub fn new(max_message_size: usize) -> Self {
        Self {
            partial: HashMap::new(),
            max_message_size,
        }
    }

    /// Add one PDV, returning the message it completes, if any.
    pub fn push(&mut self, pdv: PDataValue) -> Result<Option<Message>, AssemblyError> {
        let id = pdv.presentation_context_id;
        match pdv.value_type {
            PDataValueType::Command => {
                let partial = self.partial.entry(id).or_default();
                if partial.awaiting_dataset {
                    return Err(ProtocolError::CommandInterleaved(id).into());
                }
                partial.command.extend_from_slice(&pdv.data);
                self.check_size(id)?;
                if !pdv.is_last {
                    return Ok(None);
                }
                let has_dataset = command_has_dataset(&self.partial[&id].command)
                    .map_err(|e| ProtocolError::InvalidCommandSet(e.to_string()))?;
                if has_dataset {
                    if let Some(partial) = self.partial.get_mut(&id) {
                        partial.awaiting_dataset = true;
                    }
                    Ok(None)
                } else {
                    Ok(self
                        .partial
                        .remove(&id)
                        .map(|partial| Message::new(id, partial.command.freeze())))
                }
            }
            PDataValueType::Data => {
                let partial = match self.partial.get_mut(&id) {
                    Some(partial) if partial.awaiting_dataset => partial,
                    _ => return Err(ProtocolError::DataWithoutCommand(id).into()),
                };
                partial.dataset.extend_from_slice(&pdv.data);
                self.check_size(id)?;
                if !pdv.is_last {
                    return Ok(None);
                }
                Ok(self.partial.remove(&id).map(|partial| {
                    Message::new(id, partial.command.freeze())
                        .with_dataset(partial.dataset.freeze())
                }))
            }
        }
    }

    fn check_size(&mut self, id: u8) -> Result<(), AssemblyError> {
        let size = self.partial.get(&id).map(PartialMessage::len).unwrap_or(0);
        if size > self.max_message_size {
            self.partial.remove(&id);
            return Err(AssemblyError::MessageTooLarge {
                limit: self.max_message_size,
            });
        }
        Ok(())
    }

    /// Number of presentation contexts with an incomplete message.
    pub fn pending(&self) -> usize {
        self.partial.len()
    }
}

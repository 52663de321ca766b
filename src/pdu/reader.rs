use super::{
    item_type, pdu_type, AbortRQSource, AssociationAC, AssociationRJ, AssociationRJResult,
    AssociationRJSource, AssociationRQ, PDataValue, PDataValueType, Pdu,
    PresentationContextProposed, PresentationContextResult, PresentationContextResultReason,
    RoleSelection, UserVariableItem, MAXIMUM_PDU_SIZE, PDU_HEADER_LENGTH,
};
use crate::error::ProtocolError;
use bytes::{Buf, Bytes, BytesMut};

/// Total length of the PDU at the front of `buf`, header included, once
/// the header is available.
pub fn pdu_length(buf: &[u8]) -> Option<usize> {
    if buf.len() < PDU_HEADER_LENGTH {
        return None;
    }
    let declared = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);
    Some(PDU_HEADER_LENGTH + declared as usize)
}

/// Take the next complete PDU out of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed. The PDU header is checked
/// before its body arrives, so oversized or unknown PDUs are refused without
/// buffering them. When `strict`, a P-DATA-TF whose length field exceeds
/// `max_pdu_length` is refused; otherwise only [MAXIMUM_PDU_SIZE] applies.
pub fn read_pdu(
    buf: &mut BytesMut,
    max_pdu_length: u32,
    strict: bool,
) -> Result<Option<Pdu>, ProtocolError> {
    let Some(total) = pdu_length(&buf[..]) else {
        return Ok(None);
    };
    let code = buf[0];
    if !(pdu_type::ASSOCIATE_RQ..=pdu_type::ABORT_RQ).contains(&code) {
        return Err(ProtocolError::UnrecognizedPduType(code));
    }
    let declared = total - PDU_HEADER_LENGTH;
    if declared > MAXIMUM_PDU_SIZE as usize {
        return Err(ProtocolError::PduTooLarge {
            length: declared,
            max: MAXIMUM_PDU_SIZE,
        });
    }
    let limited = strict && code == pdu_type::P_DATA_TF && max_pdu_length > 0;
    if limited && declared > max_pdu_length as usize {
        return Err(ProtocolError::PduTooLarge {
            length: declared,
            max: max_pdu_length,
        });
    }
    if buf.len() < total {
        buf.reserve(total - buf.len());
        return Ok(None);
    }
    decode(buf.split_to(total).freeze()).map(Some)
}

/// Decode exactly one PDU.
pub fn decode(mut raw: Bytes) -> Result<Pdu, ProtocolError> {
    let available = raw.len();
    let declared = pdu_length(&raw).ok_or(ProtocolError::Truncated("PDU header"))?;
    if declared != available {
        return Err(ProtocolError::LengthMismatch {
            declared,
            available,
        });
    }
    let code = raw.get_u8();
    raw.advance(5);
    match code {
        pdu_type::ASSOCIATE_RQ => read_associate_rq(raw).map(Pdu::AssociationRQ),
        pdu_type::ASSOCIATE_AC => read_associate_ac(raw).map(Pdu::AssociationAC),
        pdu_type::ASSOCIATE_RJ => read_associate_rj(raw).map(Pdu::AssociationRJ),
        pdu_type::P_DATA_TF => read_pdata(raw).map(|data| Pdu::PData { data }),
        pdu_type::RELEASE_RQ => Ok(Pdu::ReleaseRQ),
        pdu_type::RELEASE_RP => Ok(Pdu::ReleaseRP),
        pdu_type::ABORT_RQ => read_abort(raw),
        other => Err(ProtocolError::UnrecognizedPduType(other)),
    }
}

fn take_u8(buf: &mut Bytes, field: &'static str) -> Result<u8, ProtocolError> {
    if buf.remaining() < 1 {
        return Err(ProtocolError::Truncated(field));
    }
    Ok(buf.get_u8())
}

fn take_u16(buf: &mut Bytes, field: &'static str) -> Result<u16, ProtocolError> {
    if buf.remaining() < 2 {
        return Err(ProtocolError::Truncated(field));
    }
    Ok(buf.get_u16())
}

fn take_u32(buf: &mut Bytes, field: &'static str) -> Result<u32, ProtocolError> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::Truncated(field));
    }
    Ok(buf.get_u32())
}

fn take_bytes(buf: &mut Bytes, n: usize, field: &'static str) -> Result<Bytes, ProtocolError> {
    if buf.remaining() < n {
        return Err(ProtocolError::Truncated(field));
    }
    Ok(buf.split_to(n))
}

/// Split the next variable item off `buf`, returning its type and content.
fn take_item(buf: &mut Bytes, within: &'static str) -> Result<(u8, Bytes), ProtocolError> {
    let item_type = take_u8(buf, within)?;
    take_u8(buf, within)?;
    let declared = take_u16(buf, within)? as usize;
    if buf.remaining() < declared {
        return Err(ProtocolError::InconsistentItemLength {
            item: within,
            declared,
        });
    }
    Ok((item_type, buf.split_to(declared)))
}

fn text(raw: &[u8], field: &'static str) -> Result<String, ProtocolError> {
    if !raw.is_ascii() {
        return Err(ProtocolError::InvalidText(field));
    }
    let s = std::str::from_utf8(raw).map_err(|_| ProtocolError::InvalidText(field))?;
    Ok(s.trim_matches(|c| c == ' ' || c == '\0').to_string())
}

struct AssociateFields {
    protocol_version: u16,
    called_ae_title: String,
    calling_ae_title: String,
    application_context_name: Option<String>,
}

fn read_associate_header(buf: &mut Bytes) -> Result<AssociateFields, ProtocolError> {
    let protocol_version = take_u16(buf, "protocol version")?;
    take_u16(buf, "protocol version")?;
    let called = take_bytes(buf, 16, "called AE title")?;
    let calling = take_bytes(buf, 16, "calling AE title")?;
    take_bytes(buf, 32, "reserved header field")?;
    Ok(AssociateFields {
        protocol_version,
        called_ae_title: text(&called, "called AE title")?,
        calling_ae_title: text(&calling, "calling AE title")?,
        application_context_name: None,
    })
}

fn read_associate_rq(mut buf: Bytes) -> Result<AssociationRQ, ProtocolError> {
    let mut fields = read_associate_header(&mut buf)?;
    let mut presentation_contexts = Vec::new();
    let mut user_variables = Vec::new();
    while buf.has_remaining() {
        match take_item(&mut buf, "A-ASSOCIATE-RQ item")? {
            (item_type::APPLICATION_CONTEXT, content) => {
                fields.application_context_name =
                    Some(text(&content, "application context name")?);
            }
            (item_type::PRESENTATION_CONTEXT_RQ, content) => {
                presentation_contexts.push(read_proposed_context(content)?);
            }
            (item_type::USER_INFORMATION, content) => {
                user_variables = read_user_information(content)?;
            }
            _ => {}
        }
    }
    Ok(AssociationRQ {
        protocol_version: fields.protocol_version,
        calling_ae_title: fields.calling_ae_title,
        called_ae_title: fields.called_ae_title,
        application_context_name: fields
            .application_context_name
            .ok_or(ProtocolError::MissingItem("application context name"))?,
        presentation_contexts,
        user_variables,
    })
}

fn read_associate_ac(mut buf: Bytes) -> Result<AssociationAC, ProtocolError> {
    let mut fields = read_associate_header(&mut buf)?;
    let mut presentation_contexts = Vec::new();
    let mut user_variables = Vec::new();
    while buf.has_remaining() {
        match take_item(&mut buf, "A-ASSOCIATE-AC item")? {
            (item_type::APPLICATION_CONTEXT, content) => {
                fields.application_context_name =
                    Some(text(&content, "application context name")?);
            }
            (item_type::PRESENTATION_CONTEXT_AC, content) => {
                presentation_contexts.push(read_context_result(content)?);
            }
            (item_type::USER_INFORMATION, content) => {
                user_variables = read_user_information(content)?;
            }
            _ => {}
        }
    }
    Ok(AssociationAC {
        protocol_version: fields.protocol_version,
        calling_ae_title: fields.calling_ae_title,
        called_ae_title: fields.called_ae_title,
        application_context_name: fields
            .application_context_name
            .ok_or(ProtocolError::MissingItem("application context name"))?,
        presentation_contexts,
        user_variables,
    })
}

fn read_proposed_context(mut buf: Bytes) -> Result<PresentationContextProposed, ProtocolError> {
    let id = take_u8(&mut buf, "presentation context")?;
    take_bytes(&mut buf, 3, "presentation context")?;
    let mut abstract_syntax = None;
    let mut transfer_syntaxes = Vec::new();
    while buf.has_remaining() {
        match take_item(&mut buf, "presentation context")? {
            (item_type::ABSTRACT_SYNTAX, content) => {
                abstract_syntax = Some(text(&content, "abstract syntax")?);
            }
            (item_type::TRANSFER_SYNTAX, content) => {
                transfer_syntaxes.push(text(&content, "transfer syntax")?);
            }
            (other, _) => {
                return Err(ProtocolError::UnexpectedItem {
                    item_type: other,
                    within: "presentation context",
                });
            }
        }
    }
    Ok(PresentationContextProposed {
        id,
        abstract_syntax: abstract_syntax.ok_or(ProtocolError::MissingItem("abstract syntax"))?,
        transfer_syntaxes,
    })
}

fn read_context_result(mut buf: Bytes) -> Result<PresentationContextResult, ProtocolError> {
    let id = take_u8(&mut buf, "presentation context")?;
    take_u8(&mut buf, "presentation context")?;
    let code = take_u8(&mut buf, "presentation context")?;
    take_u8(&mut buf, "presentation context")?;
    let reason =
        PresentationContextResultReason::from_code(code).ok_or(ProtocolError::InvalidParameter {
            field: "presentation context result",
            value: code,
        })?;
    let mut transfer_syntax = String::new();
    while buf.has_remaining() {
        match take_item(&mut buf, "presentation context")? {
            (item_type::TRANSFER_SYNTAX, content) => {
                transfer_syntax = text(&content, "transfer syntax")?;
            }
            (other, _) => {
                return Err(ProtocolError::UnexpectedItem {
                    item_type: other,
                    within: "presentation context",
                });
            }
        }
    }
    Ok(PresentationContextResult {
        id,
        reason,
        transfer_syntax,
    })
}

fn read_user_information(mut buf: Bytes) -> Result<Vec<UserVariableItem>, ProtocolError> {
    let mut variables = Vec::new();
    while buf.has_remaining() {
        let (sub_item, mut content) = take_item(&mut buf, "user information")?;
        let variable = match sub_item {
            item_type::MAX_LENGTH => {
                exact_length(&content, 4, "maximum length")?;
                UserVariableItem::MaxLength(content.get_u32())
            }
            item_type::IMPLEMENTATION_CLASS_UID => UserVariableItem::ImplementationClassUID(
                text(&content, "implementation class UID")?,
            ),
            item_type::IMPLEMENTATION_VERSION_NAME => UserVariableItem::ImplementationVersionName(
                text(&content, "implementation version name")?,
            ),
            item_type::ASYNC_OPERATIONS_WINDOW => {
                exact_length(&content, 4, "asynchronous operations window")?;
                UserVariableItem::AsyncOperationsWindow {
                    max_operations_invoked: content.get_u16(),
                    max_operations_performed: content.get_u16(),
                }
            }
            item_type::ROLE_SELECTION => {
                let uid_length = take_u16(&mut content, "role selection")? as usize;
                let uid = take_bytes(&mut content, uid_length, "role selection")?;
                let scu_role = take_u8(&mut content, "role selection")?;
                let scp_role = take_u8(&mut content, "role selection")?;
                if content.has_remaining() {
                    return Err(ProtocolError::InconsistentItemLength {
                        item: "role selection",
                        declared: uid_length + 4 + content.remaining(),
                    });
                }
                UserVariableItem::RoleSelection(RoleSelection {
                    sop_class_uid: text(&uid, "role selection SOP class UID")?,
                    scu_role: scu_role != 0,
                    scp_role: scp_role != 0,
                })
            }
            other => UserVariableItem::Unknown(other, content),
        };
        variables.push(variable);
    }
    Ok(variables)
}

fn exact_length(content: &Bytes, expected: usize, item: &'static str) -> Result<(), ProtocolError> {
    if content.len() == expected {
        Ok(())
    } else {
        Err(ProtocolError::InconsistentItemLength {
            item,
            declared: content.len(),
        })
    }
}

fn read_associate_rj(mut buf: Bytes) -> Result<AssociationRJ, ProtocolError> {
    take_u8(&mut buf, "A-ASSOCIATE-RJ")?;
    let result = take_u8(&mut buf, "A-ASSOCIATE-RJ")?;
    let source = take_u8(&mut buf, "A-ASSOCIATE-RJ")?;
    let reason = take_u8(&mut buf, "A-ASSOCIATE-RJ")?;
    Ok(AssociationRJ {
        result: AssociationRJResult::from_code(result).ok_or(ProtocolError::InvalidParameter {
            field: "rejection result",
            value: result,
        })?,
        source: AssociationRJSource::from_codes(source, reason).ok_or(
            ProtocolError::InvalidParameter {
                field: "rejection source",
                value: source,
            },
        )?,
    })
}

fn read_pdata(mut buf: Bytes) -> Result<Vec<PDataValue>, ProtocolError> {
    let mut values = Vec::new();
    while buf.has_remaining() {
        let declared = take_u32(&mut buf, "presentation data value")? as usize;
        if declared < 2 || buf.remaining() < declared {
            return Err(ProtocolError::InconsistentItemLength {
                item: "presentation data value",
                declared,
            });
        }
        let mut pdv = buf.split_to(declared);
        let presentation_context_id = pdv.get_u8();
        let control = pdv.get_u8();
        values.push(PDataValue {
            presentation_context_id,
            value_type: if control & 0x01 != 0 {
                PDataValueType::Command
            } else {
                PDataValueType::Data
            },
            is_last: control & 0x02 != 0,
            data: pdv,
        });
    }
    Ok(values)
}

fn read_abort(mut buf: Bytes) -> Result<Pdu, ProtocolError> {
    take_u16(&mut buf, "A-ABORT")?;
    let source = take_u8(&mut buf, "A-ABORT")?;
    let reason = take_u8(&mut buf, "A-ABORT")?;
    let source = AbortRQSource::from_codes(source, reason).ok_or(
        ProtocolError::InvalidParameter {
            field: "abort source",
            value: source,
        },
    )?;
    Ok(Pdu::AbortRQ { source })
}

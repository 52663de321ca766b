use super::{
    item_type, pdu_type, AssociationAC, AssociationRJ, AssociationRQ, PDataValue,
    PDataValueType, Pdu, PresentationContextProposed, PresentationContextResult,
    UserVariableItem,
};
use crate::error::EncodingError;
use bytes::{BufMut, Bytes, BytesMut};

/// Encode a PDU, failing if any field does not fit its fixed width or the
/// whole PDU would be longer than `max_length` bytes.
pub fn encode(pdu: &Pdu, max_length: u32) -> Result<Bytes, EncodingError> {
    let mut buf = BytesMut::new();
    match pdu {
        Pdu::AssociationRQ(rq) => write_pdu(&mut buf, pdu_type::ASSOCIATE_RQ, |buf| {
            write_associate_rq(buf, rq)
        })?,
        Pdu::AssociationAC(ac) => write_pdu(&mut buf, pdu_type::ASSOCIATE_AC, |buf| {
            write_associate_ac(buf, ac)
        })?,
        Pdu::AssociationRJ(rj) => write_pdu(&mut buf, pdu_type::ASSOCIATE_RJ, |buf| {
            write_associate_rj(buf, rj);
            Ok(())
        })?,
        Pdu::PData { data } => write_pdu(&mut buf, pdu_type::P_DATA_TF, |buf| {
            data.iter().try_for_each(|pdv| write_pdv(buf, pdv))
        })?,
        Pdu::ReleaseRQ => write_pdu(&mut buf, pdu_type::RELEASE_RQ, |buf| {
            buf.put_u32(0);
            Ok(())
        })?,
        Pdu::ReleaseRP => write_pdu(&mut buf, pdu_type::RELEASE_RP, |buf| {
            buf.put_u32(0);
            Ok(())
        })?,
        Pdu::AbortRQ { source } => write_pdu(&mut buf, pdu_type::ABORT_RQ, |buf| {
            let (source, reason) = source.codes();
            buf.put_u16(0);
            buf.put_u8(source);
            buf.put_u8(reason);
            Ok(())
        })?,
    }
    if buf.len() > max_length as usize {
        return Err(EncodingError::PduTooLarge {
            length: buf.len(),
            max: max_length,
        });
    }
    Ok(buf.freeze())
}

/// Check that `ae_title` can be written to a 16 byte AE title field.
pub fn validate_ae_title(ae_title: &str) -> Result<(), EncodingError> {
    let printable = ae_title
        .bytes()
        .all(|b| (0x20..0x7F).contains(&b) && b != b'\\');
    if ae_title.trim().is_empty() || ae_title.len() > 16 || !printable {
        Err(EncodingError::InvalidAeTitle(ae_title.to_string()))
    } else {
        Ok(())
    }
}

fn write_pdu<F>(buf: &mut BytesMut, pdu_type: u8, body: F) -> Result<(), EncodingError>
where
    F: FnOnce(&mut BytesMut) -> Result<(), EncodingError>,
{
    buf.put_u8(pdu_type);
    buf.put_u8(0);
    let length_at = buf.len();
    buf.put_u32(0);
    body(buf)?;
    let length = buf.len() - length_at - 4;
    let length = u32::try_from(length).map_err(|_| EncodingError::PduTooLarge {
        length,
        max: u32::MAX,
    })?;
    buf[length_at..length_at + 4].copy_from_slice(&length.to_be_bytes());
    Ok(())
}

fn write_item<F>(
    buf: &mut BytesMut,
    item_type: u8,
    field: &'static str,
    content: F,
) -> Result<(), EncodingError>
where
    F: FnOnce(&mut BytesMut) -> Result<(), EncodingError>,
{
    buf.put_u8(item_type);
    buf.put_u8(0);
    let length_at = buf.len();
    buf.put_u16(0);
    content(buf)?;
    let length = buf.len() - length_at - 2;
    let length =
        u16::try_from(length).map_err(|_| EncodingError::ItemTooLong { field, length })?;
    buf[length_at..length_at + 2].copy_from_slice(&length.to_be_bytes());
    Ok(())
}

fn write_text_item(
    buf: &mut BytesMut,
    item_type: u8,
    field: &'static str,
    text: &str,
) -> Result<(), EncodingError> {
    write_item(buf, item_type, field, |buf| {
        buf.put_slice(text.as_bytes());
        Ok(())
    })
}

fn write_ae_title(buf: &mut BytesMut, ae_title: &str) -> Result<(), EncodingError> {
    validate_ae_title(ae_title)?;
    buf.put_slice(ae_title.as_bytes());
    buf.put_bytes(b' ', 16 - ae_title.len());
    Ok(())
}

/// Fields shared by A-ASSOCIATE-RQ and A-ASSOCIATE-AC up to the variable items.
fn write_associate_header(
    buf: &mut BytesMut,
    protocol_version: u16,
    called_ae_title: &str,
    calling_ae_title: &str,
    application_context_name: &str,
) -> Result<(), EncodingError> {
    buf.put_u16(protocol_version);
    buf.put_u16(0);
    write_ae_title(buf, called_ae_title)?;
    write_ae_title(buf, calling_ae_title)?;
    buf.put_bytes(0, 32);
    write_text_item(
        buf,
        item_type::APPLICATION_CONTEXT,
        "application context name",
        application_context_name,
    )
}

fn write_associate_rq(buf: &mut BytesMut, rq: &AssociationRQ) -> Result<(), EncodingError> {
    write_associate_header(
        buf,
        rq.protocol_version,
        &rq.called_ae_title,
        &rq.calling_ae_title,
        &rq.application_context_name,
    )?;
    for pc in &rq.presentation_contexts {
        write_proposed_context(buf, pc)?;
    }
    write_user_information(buf, &rq.user_variables)
}

fn write_associate_ac(buf: &mut BytesMut, ac: &AssociationAC) -> Result<(), EncodingError> {
    write_associate_header(
        buf,
        ac.protocol_version,
        &ac.called_ae_title,
        &ac.calling_ae_title,
        &ac.application_context_name,
    )?;
    for pc in &ac.presentation_contexts {
        write_context_result(buf, pc)?;
    }
    write_user_information(buf, &ac.user_variables)
}

fn write_associate_rj(buf: &mut BytesMut, rj: &AssociationRJ) {
    let (source, reason) = rj.source.codes();
    buf.put_u8(0);
    buf.put_u8(rj.result.code());
    buf.put_u8(source);
    buf.put_u8(reason);
}

fn write_proposed_context(
    buf: &mut BytesMut,
    pc: &PresentationContextProposed,
) -> Result<(), EncodingError> {
    write_item(
        buf,
        item_type::PRESENTATION_CONTEXT_RQ,
        "presentation context",
        |buf| {
            buf.put_u8(pc.id);
            buf.put_bytes(0, 3);
            write_text_item(
                buf,
                item_type::ABSTRACT_SYNTAX,
                "abstract syntax",
                &pc.abstract_syntax,
            )?;
            for ts in &pc.transfer_syntaxes {
                write_text_item(buf, item_type::TRANSFER_SYNTAX, "transfer syntax", ts)?;
            }
            Ok(())
        },
    )
}

fn write_context_result(
    buf: &mut BytesMut,
    pc: &PresentationContextResult,
) -> Result<(), EncodingError> {
    write_item(
        buf,
        item_type::PRESENTATION_CONTEXT_AC,
        "presentation context",
        |buf| {
            buf.put_u8(pc.id);
            buf.put_u8(0);
            buf.put_u8(pc.reason.code());
            buf.put_u8(0);
            write_text_item(
                buf,
                item_type::TRANSFER_SYNTAX,
                "transfer syntax",
                &pc.transfer_syntax,
            )
        },
    )
}

fn write_user_information(
    buf: &mut BytesMut,
    variables: &[UserVariableItem],
) -> Result<(), EncodingError> {
    write_item(buf, item_type::USER_INFORMATION, "user information", |buf| {
        variables.iter().try_for_each(|v| write_user_variable(buf, v))
    })
}

fn write_user_variable(
    buf: &mut BytesMut,
    variable: &UserVariableItem,
) -> Result<(), EncodingError> {
    match variable {
        UserVariableItem::MaxLength(max_length) => {
            write_item(buf, item_type::MAX_LENGTH, "maximum length", |buf| {
                buf.put_u32(*max_length);
                Ok(())
            })
        }
        UserVariableItem::ImplementationClassUID(uid) => write_text_item(
            buf,
            item_type::IMPLEMENTATION_CLASS_UID,
            "implementation class UID",
            uid,
        ),
        UserVariableItem::ImplementationVersionName(name) => write_text_item(
            buf,
            item_type::IMPLEMENTATION_VERSION_NAME,
            "implementation version name",
            name,
        ),
        UserVariableItem::AsyncOperationsWindow {
            max_operations_invoked,
            max_operations_performed,
        } => write_item(
            buf,
            item_type::ASYNC_OPERATIONS_WINDOW,
            "asynchronous operations window",
            |buf| {
                buf.put_u16(*max_operations_invoked);
                buf.put_u16(*max_operations_performed);
                Ok(())
            },
        ),
        UserVariableItem::RoleSelection(role) => {
            write_item(buf, item_type::ROLE_SELECTION, "role selection", |buf| {
                let uid_length = u16::try_from(role.sop_class_uid.len()).map_err(|_| {
                    EncodingError::ItemTooLong {
                        field: "role selection SOP class UID",
                        length: role.sop_class_uid.len(),
                    }
                })?;
                buf.put_u16(uid_length);
                buf.put_slice(role.sop_class_uid.as_bytes());
                buf.put_u8(role.scu_role.into());
                buf.put_u8(role.scp_role.into());
                Ok(())
            })
        }
        UserVariableItem::Unknown(item_type, content) => {
            write_item(buf, *item_type, "user information sub-item", |buf| {
                buf.put_slice(content);
                Ok(())
            })
        }
    }
}

fn write_pdv(buf: &mut BytesMut, pdv: &PDataValue) -> Result<(), EncodingError> {
    let length = pdv.data.len() + 2;
    let length = u32::try_from(length).map_err(|_| EncodingError::ItemTooLong {
        field: "presentation data value",
        length,
    })?;
    let mut control = 0u8;
    if pdv.value_type == PDataValueType::Command {
        control |= 0x01;
    }
    if pdv.is_last {
        control |= 0x02;
    }
    buf.put_u32(length);
    buf.put_u8(pdv.presentation_context_id);
    buf.put_u8(control);
    buf.put_slice(&pdv.data);
    Ok(())
}

//! The service class provider shipped with the server: C-ECHO and C-STORE.

use crate::error::ProtocolError;
use crate::message::{
    command_field, echo_response, status, store_response, CommandError, Message,
};
use crate::server::{ServiceClassProvider, ServiceContext};
use crate::types::AETitle;
use bytes::Bytes;
use dicom::dictionary_std::tags;
use dicom::encoding::TransferSyntaxIndex;
use dicom::object::{DefaultDicomObject, FileMetaTableBuilder, InMemDicomObject};
use dicom::transfer_syntax::TransferSyntaxRegistry;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc::UnboundedSender;
use ulid::Ulid;

/// A DICOM instance received by C-STORE.
#[derive(Debug, Clone)]
pub struct ReceivedInstance {
    pub association_ulid: Ulid,
    pub calling_ae_title: AETitle,
    pub sop_class_uid: String,
    pub sop_instance_uid: String,
    /// Transfer syntax of `dataset`, as negotiated for its presentation context.
    pub transfer_syntax: String,
    pub dataset: Bytes,
}

/// Error which might happen while decoding a received instance.
#[derive(thiserror::Error, Debug)]
pub enum InstanceError {
    #[error("Unknown transfer syntax {0}")]
    UnknownTransferSyntax(String),

    #[error("Failed to read DICOM data object")]
    FailedToReadObject(#[from] dicom::object::ReadError),

    #[error("failed to build DICOM meta file information")]
    FailedToBuildMeta(#[from] dicom::object::meta::Error),
}

impl ReceivedInstance {
    /// Decode the dataset and wrap it with file meta information.
    pub fn to_file_object(&self) -> Result<DefaultDicomObject, InstanceError> {
        let ts = TransferSyntaxRegistry
            .get(&self.transfer_syntax)
            .ok_or_else(|| InstanceError::UnknownTransferSyntax(self.transfer_syntax.clone()))?;
        let obj = InMemDicomObject::read_dataset_with_ts(&self.dataset[..], ts)?;
        let file_meta = FileMetaTableBuilder::new()
            .media_storage_sop_class_uid(self.sop_class_uid.as_str())
            .media_storage_sop_instance_uid(self.sop_instance_uid.as_str())
            .transfer_syntax(self.transfer_syntax.as_str())
            .build()?;
        Ok(obj.with_exact_meta(file_meta))
    }
}

/// Answers C-ECHO, and acknowledges C-STORE after handing the instance to
/// `instances`. Other commands are ignored.
#[derive(Debug, Clone, Default)]
pub struct StorageServiceProvider {
    instances: Option<UnboundedSender<ReceivedInstance>>,
}

impl StorageServiceProvider {
    pub fn new(instances: Option<UnboundedSender<ReceivedInstance>>) -> Self {
        Self { instances }
    }

    fn respond(
        &self,
        context: &ServiceContext,
        request: Message,
    ) -> anyhow::Result<Option<Message>> {
        let summary = request.summary()?;
        let presentation_context_id = request.presentation_context_id;
        let message_id = summary
            .message_id
            .ok_or(CommandError::MissingTag(tags::MESSAGE_ID))?;
        match summary.command_field {
            command_field::C_ECHO_RQ => {
                let response = echo_response(message_id, status::SUCCESS);
                Ok(Some(Message::from_command_object(presentation_context_id, &response)?))
            }
            command_field::C_STORE_RQ => {
                let sop_class_uid = summary
                    .affected_sop_class_uid
                    .ok_or(CommandError::MissingTag(tags::AFFECTED_SOP_CLASS_UID))?;
                let sop_instance_uid = summary
                    .affected_sop_instance_uid
                    .ok_or(CommandError::MissingTag(tags::AFFECTED_SOP_INSTANCE_UID))?;
                let transfer_syntax = context
                    .parameters
                    .accepted_transfer_syntax(presentation_context_id)
                    .ok_or(ProtocolError::UnknownPresentationContext(presentation_context_id))?;
                let status = match request.dataset {
                    Some(dataset) => {
                        let instance = ReceivedInstance {
                            association_ulid: context.association_ulid,
                            calling_ae_title: context.parameters.calling_ae_title.clone(),
                            sop_class_uid: sop_class_uid.clone(),
                            sop_instance_uid: sop_instance_uid.clone(),
                            transfer_syntax: transfer_syntax.to_string(),
                            dataset,
                        };
                        self.accept_instance(instance)
                    }
                    None => {
                        tracing::warn!(
                            association_ulid = %context.association_ulid,
                            sop_instance_uid = %sop_instance_uid,
                            "C-STORE request without a dataset"
                        );
                        status::CANNOT_UNDERSTAND
                    }
                };
                let response =
                    store_response(message_id, &sop_class_uid, &sop_instance_uid, status);
                Ok(Some(Message::from_command_object(presentation_context_id, &response)?))
            }
            other => {
                tracing::warn!(
                    association_ulid = %context.association_ulid,
                    command_field = other,
                    "Ignoring unsupported command"
                );
                Ok(None)
            }
        }
    }

    fn accept_instance(&self, instance: ReceivedInstance) -> u16 {
        tracing::debug!(
            association_ulid = %instance.association_ulid,
            aec = %instance.calling_ae_title,
            sop_instance_uid = %instance.sop_instance_uid,
            bytes = instance.dataset.len(),
            "received instance"
        );
        match &self.instances {
            Some(sender) => match sender.send(instance) {
                Ok(()) => status::SUCCESS,
                Err(_) => {
                    tracing::error!("Nobody is receiving stored instances anymore");
                    status::OUT_OF_RESOURCES
                }
            },
            None => status::SUCCESS,
        }
    }
}

impl ServiceClassProvider for StorageServiceProvider {
    fn handle<'a>(
        &'a self,
        context: &'a ServiceContext,
        request: Message,
    ) -> BoxFuture<'a, anyhow::Result<Option<Message>>> {
        async move { self.respond(context, request) }.boxed()
    }
}

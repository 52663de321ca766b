//! Requestor role: connect, propose, exchange DIMSE messages, release.

use crate::association::AssociationParameters;
use crate::engine::{Association, AssociationListener, EngineConfig};
use crate::error::AssociationError;
use crate::message::{echo_request, store_request, CommandError, CommandSummary, Message};
use crate::pdu::DEFAULT_MAX_PDU;
use crate::sop_classes::default_proposed_transfer_syntaxes;
use crate::types::{AETitle, Endpoint};
use bytes::Bytes;
use dicom::dictionary_std::{tags, uids};
use dicom::encoding::TransferSyntaxIndex;
use dicom::object::{FileDicomObject, InMemDicomObject};
use dicom::transfer_syntax::TransferSyntaxRegistry;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Options of a [DicomClient].
#[derive(Clone)]
pub struct ClientOptions {
    pub calling_ae_title: AETitle,
    pub called_ae_title: AETitle,
    /// Abstract syntax and transfer syntaxes of each proposed context, in order.
    pub presentation_contexts: Vec<(String, Vec<String>)>,
    pub max_pdu_length: u32,
    pub connect_timeout: Duration,
    pub engine: EngineConfig,
    /// How many more times to try connecting after a timeout or refusal.
    pub connect_retries: u32,
    pub retry_delay: Duration,
    pub listeners: Vec<Arc<dyn AssociationListener>>,
}

impl ClientOptions {
    pub fn new(calling_ae_title: impl Into<String>, called_ae_title: impl Into<String>) -> Self {
        Self {
            calling_ae_title: AETitle::new(calling_ae_title.into()),
            called_ae_title: AETitle::new(called_ae_title.into()),
            presentation_contexts: Vec::new(),
            max_pdu_length: DEFAULT_MAX_PDU,
            connect_timeout: Duration::from_secs(10),
            engine: EngineConfig::default(),
            connect_retries: 0,
            retry_delay: Duration::from_secs(1),
            listeners: Vec::new(),
        }
    }

    /// Propose an abstract syntax with explicit and implicit VR little endian.
    pub fn with_abstract_syntax(self, abstract_syntax: impl Into<String>) -> Self {
        self.with_presentation_context(abstract_syntax, default_proposed_transfer_syntaxes())
    }

    pub fn with_presentation_context<I, S>(
        mut self,
        abstract_syntax: impl Into<String>,
        transfer_syntaxes: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.presentation_contexts.push((
            abstract_syntax.into(),
            transfer_syntaxes.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn max_pdu_length(mut self, max_pdu_length: u32) -> Self {
        self.max_pdu_length = max_pdu_length;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.engine.response_timeout = timeout;
        self
    }

    pub fn release_timeout(mut self, timeout: Duration) -> Self {
        self.engine.release_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.engine.idle_timeout = timeout;
        self
    }

    pub fn max_message_size(mut self, max_message_size: usize) -> Self {
        self.engine.max_message_size = max_message_size;
        self
    }

    pub fn connect_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.connect_retries = retries;
        self.retry_delay = delay;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn AssociationListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    fn parameters(&self) -> Result<AssociationParameters, AssociationError> {
        let mut parameters =
            AssociationParameters::new(self.calling_ae_title.clone(), self.called_ae_title.clone())
                .with_max_pdu_length(self.max_pdu_length);
        for (abstract_syntax, transfer_syntaxes) in &self.presentation_contexts {
            parameters
                .add_presentation_context(abstract_syntax.as_str(), transfer_syntaxes.clone())?;
        }
        // fails early on bad AE titles or an empty proposal
        parameters.to_associate_rq()?;
        Ok(parameters)
    }
}

/// A DICOM service class user with one established association.
pub struct DicomClient {
    association: Association,
    next_message_id: AtomicU16,
    response_timeout: Duration,
}

impl DicomClient {
    /// Connect to `endpoint` and negotiate an association.
    ///
    /// Only connection timeouts and refusals are retried.
    pub async fn connect(
        endpoint: &Endpoint,
        options: ClientOptions,
    ) -> Result<Self, AssociationError> {
        let parameters = options.parameters()?;
        let mut attempt = 0;
        let association = loop {
            let connected = Association::connect(
                endpoint,
                options.connect_timeout,
                parameters.clone(),
                options.engine.clone(),
                options.listeners.clone(),
            )
            .await;
            match connected {
                Ok(association) => break association,
                Err(
                    e @ (AssociationError::ConnectTimeout(_)
                    | AssociationError::ConnectionRefused(_)),
                ) if attempt < options.connect_retries =>
                {
                    attempt += 1;
                    tracing::warn!(
                        endpoint = %endpoint,
                        attempt,
                        retries = options.connect_retries,
                        "{e}, retrying"
                    );
                    tokio::time::sleep(options.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        };
        association.send_associate_request().await?;
        Ok(Self {
            association,
            next_message_id: AtomicU16::new(1),
            response_timeout: options.engine.response_timeout,
        })
    }

    pub fn association(&self) -> &Association {
        &self.association
    }

    pub fn parameters(&self) -> Arc<AssociationParameters> {
        self.association.parameters()
    }

    pub async fn send_message(&self, message: Message) -> Result<(), AssociationError> {
        self.association.send_message(message).await
    }

    pub async fn next_message(&self) -> Option<Message> {
        self.association.next_message().await
    }

    /// C-ECHO round trip, returning the response status.
    pub async fn echo(&self) -> Result<u16, AssociationError> {
        let presentation_context_id = self.context_for(uids::VERIFICATION)?;
        let message_id = self.next_message_id();
        let request =
            Message::from_command_object(presentation_context_id, &echo_request(message_id))?;
        self.send_message(request).await?;
        let response = self.await_response(message_id).await?;
        response_status(&response)
    }

    /// C-STORE round trip of a dataset already encoded with the accepted
    /// transfer syntax, returning the response status.
    pub async fn store(
        &self,
        sop_class_uid: &str,
        sop_instance_uid: &str,
        dataset: Bytes,
    ) -> Result<u16, AssociationError> {
        let presentation_context_id = self.context_for(sop_class_uid)?;
        let message_id = self.next_message_id();
        let command = store_request(message_id, sop_class_uid, sop_instance_uid);
        let request =
            Message::from_command_object(presentation_context_id, &command)?.with_dataset(dataset);
        self.send_message(request).await?;
        let response = self.await_response(message_id).await?;
        response_status(&response)
    }

    /// C-STORE a DICOM file object, encoding its dataset with the
    /// transfer syntax accepted for its SOP class.
    pub async fn store_object(
        &self,
        object: &FileDicomObject<InMemDicomObject>,
    ) -> Result<u16, AssociationError> {
        let meta = object.meta();
        let sop_class_uid = trim_uid(meta.media_storage_sop_class_uid());
        let sop_instance_uid = trim_uid(meta.media_storage_sop_instance_uid());
        let parameters = self.parameters();
        let ts_uid = parameters
            .find_accepted_context(sop_class_uid)
            .and_then(|pc| pc.accepted_transfer_syntax())
            .ok_or_else(|| AssociationError::NoPresentationContext(sop_class_uid.to_string()))?;
        let ts = TransferSyntaxRegistry
            .get(ts_uid)
            .ok_or_else(|| AssociationError::NoPresentationContext(sop_class_uid.to_string()))?;
        let mut dataset = Vec::new();
        object
            .write_dataset_with_ts(&mut dataset, ts)
            .map_err(CommandError::from)?;
        self.store(sop_class_uid, sop_instance_uid, Bytes::from(dataset))
            .await
    }

    /// Release the association gracefully.
    pub async fn release(self) -> Result<(), AssociationError> {
        self.association.release().await
    }

    pub async fn abort(self) {
        self.association.abort().await
    }

    fn next_message_id(&self) -> u16 {
        self.next_message_id.fetch_add(1, Ordering::Relaxed)
    }

    fn context_for(&self, abstract_syntax: &str) -> Result<u8, AssociationError> {
        self.parameters()
            .find_accepted_context(abstract_syntax)
            .map(|pc| pc.id)
            .ok_or_else(|| AssociationError::NoPresentationContext(abstract_syntax.to_string()))
    }

    /// Wait for the response to `message_id`. Giving up aborts the association.
    async fn await_response(&self, message_id: u16) -> Result<CommandSummary, AssociationError> {
        let message = match tokio::time::timeout(self.response_timeout, self.next_message()).await {
            Ok(Some(message)) => message,
            Ok(None) => return Err(self.association.termination_error("wait for a response")),
            Err(_elapsed) => {
                self.association.abort().await;
                return Err(AssociationError::ResponseTimeout);
            }
        };
        let summary = message.summary()?;
        if !summary.is_response() || summary.message_id_being_responded_to != Some(message_id) {
            return Err(AssociationError::UnexpectedResponse {
                expected: message_id,
                actual: summary.message_id_being_responded_to,
            });
        }
        Ok(summary)
    }
}

fn response_status(response: &CommandSummary) -> Result<u16, AssociationError> {
    response
        .status
        .ok_or(AssociationError::Command(CommandError::MissingTag(tags::STATUS)))
}

fn trim_uid(uid: &str) -> &str {
    uid.trim_end_matches(['\0', ' '])
}

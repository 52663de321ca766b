//! Description of one association, as proposed and then as negotiated.

use crate::error::EncodingError;
use crate::pdu::{
    validate_ae_title, AssociationRQ, PresentationContextProposed,
    PresentationContextResultReason, RoleSelection, UserVariableItem, DEFAULT_MAX_PDU,
    MAXIMUM_PDU_SIZE, PROTOCOL_VERSION,
};
use crate::types::{AETitle, Endpoint};
use std::fmt::{Display, Formatter};

/// The DICOM application context name.
pub const APPLICATION_CONTEXT_NAME: &str = "1.2.840.10008.3.1.1.1";

/// Implementation class UID sent in every association request and acceptance.
pub const IMPLEMENTATION_CLASS_UID: &str = "2.25.178365612317455130127427004217347218447";

/// Implementation version name sent alongside [IMPLEMENTATION_CLASS_UID].
pub const IMPLEMENTATION_VERSION_NAME: &str = concat!("OXIDUL_", env!("CARGO_PKG_VERSION"));

/// Negotiation outcome of one presentation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextNegotiation {
    /// Not negotiated yet.
    Proposed,
    Accepted { transfer_syntax: String },
    Rejected(PresentationContextResultReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationContext {
    pub id: u8,
    pub abstract_syntax: String,
    /// Transfer syntaxes proposed by the requestor, in its order of preference.
    pub transfer_syntaxes: Vec<String>,
    pub negotiation: ContextNegotiation,
}

impl PresentationContext {
    pub fn accepted_transfer_syntax(&self) -> Option<&str> {
        match &self.negotiation {
            ContextNegotiation::Accepted { transfer_syntax } => Some(transfer_syntax),
            _ => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted_transfer_syntax().is_some()
    }
}

/// Asynchronous operations window negotiated with the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncOperationsWindow {
    pub max_operations_invoked: u16,
    pub max_operations_performed: u16,
}

/// Everything known about an association: who, where, and what was negotiated.
///
/// Built by the requestor (or filled in by the acceptor from the incoming
/// request), updated once by negotiation, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationParameters {
    pub calling_ae_title: AETitle,
    pub called_ae_title: AETitle,
    pub application_context_name: String,
    pub local_endpoint: Option<Endpoint>,
    pub remote_endpoint: Option<Endpoint>,
    presentation_contexts: Vec<PresentationContext>,
    /// Largest PDU we are willing to receive. 0 means unlimited.
    pub local_max_pdu_length: u32,
    /// Largest PDU the peer is willing to receive. 0 means unlimited.
    pub remote_max_pdu_length: u32,
    pub async_operations_window: Option<AsyncOperationsWindow>,
    pub role_selections: Vec<RoleSelection>,
    pub remote_implementation_class_uid: Option<String>,
    pub remote_implementation_version_name: Option<String>,
}

impl AssociationParameters {
    pub fn new(calling_ae_title: AETitle, called_ae_title: AETitle) -> Self {
        Self {
            calling_ae_title,
            called_ae_title,
            application_context_name: APPLICATION_CONTEXT_NAME.to_string(),
            local_endpoint: None,
            remote_endpoint: None,
            presentation_contexts: Vec::new(),
            local_max_pdu_length: DEFAULT_MAX_PDU,
            remote_max_pdu_length: 0,
            async_operations_window: None,
            role_selections: Vec::new(),
            remote_implementation_class_uid: None,
            remote_implementation_version_name: None,
        }
    }

    pub fn with_max_pdu_length(mut self, max_pdu_length: u32) -> Self {
        self.local_max_pdu_length = max_pdu_length;
        self
    }

    /// Propose a presentation context under the next free odd ID.
    pub fn add_presentation_context<S: Into<String>>(
        &mut self,
        abstract_syntax: S,
        transfer_syntaxes: Vec<String>,
    ) -> Result<u8, EncodingError> {
        let next = self
            .presentation_contexts
            .iter()
            .map(|pc| pc.id as u16 + 2)
            .max()
            .unwrap_or(1);
        let id = u8::try_from(next).map_err(|_| EncodingError::PresentationContextIdsExhausted)?;
        self.add_presentation_context_with_id(id, abstract_syntax, transfer_syntaxes)?;
        Ok(id)
    }

    /// Propose a presentation context under a chosen ID, which must be odd and unused.
    pub fn add_presentation_context_with_id<S: Into<String>>(
        &mut self,
        id: u8,
        abstract_syntax: S,
        transfer_syntaxes: Vec<String>,
    ) -> Result<(), EncodingError> {
        if id % 2 == 0 {
            return Err(EncodingError::InvalidPresentationContextId(id));
        }
        if self.presentation_context(id).is_some() {
            return Err(EncodingError::DuplicatePresentationContextId(id));
        }
        if transfer_syntaxes.is_empty() {
            return Err(EncodingError::NoTransferSyntaxes(id));
        }
        self.presentation_contexts.push(PresentationContext {
            id,
            abstract_syntax: abstract_syntax.into(),
            transfer_syntaxes,
            negotiation: ContextNegotiation::Proposed,
        });
        Ok(())
    }

    pub fn presentation_contexts(&self) -> &[PresentationContext] {
        &self.presentation_contexts
    }

    pub fn presentation_context(&self, id: u8) -> Option<&PresentationContext> {
        self.presentation_contexts.iter().find(|pc| pc.id == id)
    }

    /// The transfer syntax negotiated for a context, if it was accepted.
    pub fn accepted_transfer_syntax(&self, id: u8) -> Option<&str> {
        self.presentation_context(id)
            .and_then(PresentationContext::accepted_transfer_syntax)
    }

    /// First accepted context for the given abstract syntax.
    pub fn find_accepted_context(&self, abstract_syntax: &str) -> Option<&PresentationContext> {
        self.presentation_contexts
            .iter()
            .find(|pc| pc.abstract_syntax == abstract_syntax && pc.is_accepted())
    }

    /// Largest PDU we may send.
    ///
    /// The smaller of both maximums, where 0 on either side is no bound.
    /// [MAXIMUM_PDU_SIZE] applies when neither side set one.
    pub fn max_send_pdu_length(&self) -> u32 {
        match (self.local_max_pdu_length, self.remote_max_pdu_length) {
            (0, 0) => MAXIMUM_PDU_SIZE,
            (0, remote) => remote,
            (local, 0) => local,
            (local, remote) => local.min(remote),
        }
    }

    pub(crate) fn set_presentation_contexts(&mut self, contexts: Vec<PresentationContext>) {
        self.presentation_contexts = contexts;
    }

    pub(crate) fn apply_remote_user_variables(&mut self, variables: &[UserVariableItem]) {
        for variable in variables {
            match variable {
                UserVariableItem::MaxLength(max) => self.remote_max_pdu_length = *max,
                UserVariableItem::ImplementationClassUID(uid) => {
                    self.remote_implementation_class_uid = Some(uid.clone())
                }
                UserVariableItem::ImplementationVersionName(name) => {
                    self.remote_implementation_version_name = Some(name.clone())
                }
                UserVariableItem::AsyncOperationsWindow {
                    max_operations_invoked,
                    max_operations_performed,
                } => {
                    self.async_operations_window = Some(AsyncOperationsWindow {
                        max_operations_invoked: *max_operations_invoked,
                        max_operations_performed: *max_operations_performed,
                    })
                }
                UserVariableItem::RoleSelection(_) | UserVariableItem::Unknown(..) => {}
            }
        }
    }

    /// User information sub-items describing our side of the association.
    pub(crate) fn local_user_variables(&self) -> Vec<UserVariableItem> {
        let mut variables = vec![
            UserVariableItem::MaxLength(self.local_max_pdu_length),
            UserVariableItem::ImplementationClassUID(IMPLEMENTATION_CLASS_UID.to_string()),
        ];
        if let Some(window) = self.async_operations_window {
            variables.push(UserVariableItem::AsyncOperationsWindow {
                max_operations_invoked: window.max_operations_invoked,
                max_operations_performed: window.max_operations_performed,
            });
        }
        variables.extend(
            self.role_selections
                .iter()
                .cloned()
                .map(UserVariableItem::RoleSelection),
        );
        variables.push(UserVariableItem::ImplementationVersionName(
            IMPLEMENTATION_VERSION_NAME.to_string(),
        ));
        variables
    }

    /// Build the A-ASSOCIATE-RQ proposing these parameters.
    pub fn to_associate_rq(&self) -> Result<AssociationRQ, EncodingError> {
        validate_ae_title(self.calling_ae_title.as_str())?;
        validate_ae_title(self.called_ae_title.as_str())?;
        if self.presentation_contexts.is_empty() {
            return Err(EncodingError::NoPresentationContexts);
        }
        let presentation_contexts = self
            .presentation_contexts
            .iter()
            .map(|pc| PresentationContextProposed {
                id: pc.id,
                abstract_syntax: pc.abstract_syntax.clone(),
                transfer_syntaxes: pc.transfer_syntaxes.clone(),
            })
            .collect();
        Ok(AssociationRQ {
            protocol_version: PROTOCOL_VERSION,
            calling_ae_title: self.calling_ae_title.to_string(),
            called_ae_title: self.called_ae_title.to_string(),
            application_context_name: self.application_context_name.clone(),
            presentation_contexts,
            user_variables: self.local_user_variables(),
        })
    }
}

impl Display for AssociationParameters {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // the calling AE title is unknown until an acceptor got the request
        let calling = match self.calling_ae_title.as_str() {
            "" => "?",
            calling => calling,
        };
        write!(f, "{} -> {}", calling, self.called_ae_title)?;
        match (&self.local_endpoint, &self.remote_endpoint) {
            (Some(local), Some(remote)) => write!(f, " ({local} <-> {remote})"),
            (None, Some(remote)) => write!(f, " ({remote})"),
            (Some(local), None) => write!(f, " ({local})"),
            (None, None) => Ok(()),
        }
    }
}

//! Role-specific presentation context negotiation.
//!
//! Both directions are pure functions over PDU values: the acceptor turns an
//! A-ASSOCIATE-RQ into an A-ASSOCIATE-AC or -RJ with [negotiate], and the
//! requestor validates the A-ASSOCIATE-AC it gets back with [apply_acceptance].

use crate::association::{
    AssociationParameters, ContextNegotiation, PresentationContext, APPLICATION_CONTEXT_NAME,
};
use crate::error::ProtocolError;
use crate::pdu::{
    AssociationAC, AssociationRJ, AssociationRJResult, AssociationRJServiceProviderASCEReason,
    AssociationRJServiceUserReason, AssociationRJSource, AssociationRQ, PresentationContextResult,
    PresentationContextResultReason, UserVariableItem, DEFAULT_MAX_PDU, PDU_HEADER_LENGTH,
    PDV_HEADER_LENGTH,
};
use crate::sop_classes::{supported_transfer_syntaxes, ABSTRACT_SYNTAXES};
use crate::types::AETitle;

/// What an acceptor is willing to accept.
#[derive(Debug, Clone)]
pub struct AcceptorPolicy {
    /// Our AE title.
    pub ae_title: AETitle,
    /// Reject requests whose called AE title is not ours.
    pub check_called_ae_title: bool,
    pub abstract_syntaxes: Vec<String>,
    pub transfer_syntaxes: Vec<String>,
    /// Accept abstract syntaxes not in [AcceptorPolicy::abstract_syntaxes].
    pub promiscuous: bool,
    /// Largest PDU we are willing to receive.
    pub max_pdu_length: u32,
    /// Whether incoming PDUs must not surpass `max_pdu_length`.
    pub strict: bool,
}

impl AcceptorPolicy {
    pub fn new(ae_title: AETitle) -> Self {
        Self {
            ae_title,
            check_called_ae_title: false,
            abstract_syntaxes: ABSTRACT_SYNTAXES.iter().map(|s| s.to_string()).collect(),
            transfer_syntaxes: supported_transfer_syntaxes(false),
            promiscuous: false,
            max_pdu_length: DEFAULT_MAX_PDU,
            strict: false,
        }
    }

    pub fn with_abstract_syntaxes<I, S>(mut self, abstract_syntaxes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.abstract_syntaxes = abstract_syntaxes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_transfer_syntaxes<I, S>(mut self, transfer_syntaxes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transfer_syntaxes = transfer_syntaxes.into_iter().map(Into::into).collect();
        self
    }

    pub fn check_called_ae_title(mut self, check: bool) -> Self {
        self.check_called_ae_title = check;
        self
    }

    pub fn promiscuous(mut self, promiscuous: bool) -> Self {
        self.promiscuous = promiscuous;
        self
    }

    pub fn max_pdu_length(mut self, max_pdu_length: u32) -> Self {
        self.max_pdu_length = max_pdu_length;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    fn supports_abstract_syntax(&self, uid: &str) -> bool {
        self.promiscuous || self.abstract_syntaxes.iter().any(|s| s == uid)
    }

    fn supports_transfer_syntax(&self, uid: &str) -> bool {
        self.transfer_syntaxes.iter().any(|s| s == uid)
    }
}

/// Result of accepting an association request.
#[derive(Debug, Clone)]
pub struct Acceptance {
    /// The A-ASSOCIATE-AC to send back.
    pub ac: AssociationAC,
    /// The association as negotiated, from the acceptor's point of view.
    pub parameters: AssociationParameters,
}

fn rejection(source: AssociationRJSource) -> AssociationRJ {
    AssociationRJ {
        result: AssociationRJResult::Permanent,
        source,
    }
}

/// Decide on an association request.
///
/// Each proposed context is accepted with the first of its transfer syntaxes,
/// in the requestor's order, that the policy supports. The request is rejected
/// outright if the protocol version, application context or called AE title
/// is wrong, or if no context at all could be accepted.
pub fn negotiate(rq: &AssociationRQ, policy: &AcceptorPolicy) -> Result<Acceptance, AssociationRJ> {
    if rq.protocol_version & 0x0001 == 0 {
        return Err(rejection(AssociationRJSource::ServiceProviderASCE(
            AssociationRJServiceProviderASCEReason::ProtocolVersionNotSupported,
        )));
    }
    if rq.application_context_name != APPLICATION_CONTEXT_NAME {
        return Err(rejection(AssociationRJSource::ServiceUser(
            AssociationRJServiceUserReason::ApplicationContextNameNotSupported,
        )));
    }
    if policy.check_called_ae_title && rq.called_ae_title != policy.ae_title.as_str() {
        return Err(rejection(AssociationRJSource::ServiceUser(
            AssociationRJServiceUserReason::CalledAETitleNotRecognized,
        )));
    }

    let contexts: Vec<PresentationContext> = rq
        .presentation_contexts
        .iter()
        .map(|pc| {
            let negotiation = if !policy.supports_abstract_syntax(&pc.abstract_syntax) {
                ContextNegotiation::Rejected(
                    PresentationContextResultReason::AbstractSyntaxNotSupported,
                )
            } else if let Some(ts) = pc
                .transfer_syntaxes
                .iter()
                .find(|ts| policy.supports_transfer_syntax(ts))
            {
                ContextNegotiation::Accepted {
                    transfer_syntax: ts.clone(),
                }
            } else {
                ContextNegotiation::Rejected(
                    PresentationContextResultReason::TransferSyntaxesNotSupported,
                )
            };
            PresentationContext {
                id: pc.id,
                abstract_syntax: pc.abstract_syntax.clone(),
                transfer_syntaxes: pc.transfer_syntaxes.clone(),
                negotiation,
            }
        })
        .collect();

    if !contexts.iter().any(PresentationContext::is_accepted) {
        return Err(rejection(AssociationRJSource::ServiceProviderASCE(
            AssociationRJServiceProviderASCEReason::NoReasonGiven,
        )));
    }

    let mut parameters = AssociationParameters::new(
        AETitle::new(rq.calling_ae_title.clone()),
        AETitle::new(rq.called_ae_title.clone()),
    )
    .with_max_pdu_length(policy.max_pdu_length);
    parameters.application_context_name = rq.application_context_name.clone();
    parameters.apply_remote_user_variables(&rq.user_variables);
    // operations are performed one at a time, so the window is not echoed
    parameters.async_operations_window = None;
    parameters.role_selections = rq
        .user_variables
        .iter()
        .filter_map(|v| match v {
            UserVariableItem::RoleSelection(role) => Some(role.clone()),
            _ => None,
        })
        .filter(|role| {
            contexts
                .iter()
                .any(|pc| pc.abstract_syntax == role.sop_class_uid && pc.is_accepted())
        })
        .collect();

    let results = contexts
        .iter()
        .map(|pc| match &pc.negotiation {
            ContextNegotiation::Accepted { transfer_syntax } => PresentationContextResult {
                id: pc.id,
                reason: PresentationContextResultReason::Acceptance,
                transfer_syntax: transfer_syntax.clone(),
            },
            ContextNegotiation::Rejected(reason) => PresentationContextResult {
                id: pc.id,
                reason: *reason,
                transfer_syntax: String::new(),
            },
            ContextNegotiation::Proposed => PresentationContextResult {
                id: pc.id,
                reason: PresentationContextResultReason::NoReason,
                transfer_syntax: String::new(),
            },
        })
        .collect();
    parameters.set_presentation_contexts(contexts);

    let ac = AssociationAC {
        protocol_version: rq.protocol_version & 0x0001,
        calling_ae_title: rq.calling_ae_title.clone(),
        called_ae_title: rq.called_ae_title.clone(),
        application_context_name: APPLICATION_CONTEXT_NAME.to_string(),
        presentation_contexts: results,
        user_variables: parameters.local_user_variables(),
    };
    Ok(Acceptance { ac, parameters })
}

/// Fold an A-ASSOCIATE-AC into the parameters that were proposed.
///
/// Every returned context must have been proposed, and an accepted transfer
/// syntax must be one of those proposed for it. Contexts the acceptor left
/// out are recorded as rejected.
pub fn apply_acceptance(
    proposed: &AssociationParameters,
    ac: &AssociationAC,
) -> Result<AssociationParameters, ProtocolError> {
    let mut contexts = proposed.presentation_contexts().to_vec();
    for pc in contexts.iter_mut() {
        pc.negotiation = ContextNegotiation::Proposed;
    }
    for result in &ac.presentation_contexts {
        let pc = contexts
            .iter_mut()
            .find(|pc| pc.id == result.id)
            .ok_or_else(|| {
                ProtocolError::InvalidAcceptance(format!(
                    "presentation context {} was never proposed",
                    result.id
                ))
            })?;
        if pc.negotiation != ContextNegotiation::Proposed {
            return Err(ProtocolError::InvalidAcceptance(format!(
                "presentation context {} answered twice",
                result.id
            )));
        }
        pc.negotiation = match result.reason {
            PresentationContextResultReason::Acceptance => {
                if !pc.transfer_syntaxes.contains(&result.transfer_syntax) {
                    return Err(ProtocolError::InvalidAcceptance(format!(
                        "transfer syntax {} was not proposed for presentation context {}",
                        result.transfer_syntax, result.id
                    )));
                }
                ContextNegotiation::Accepted {
                    transfer_syntax: result.transfer_syntax.clone(),
                }
            }
            reason => ContextNegotiation::Rejected(reason),
        };
    }
    for pc in contexts.iter_mut() {
        if pc.negotiation == ContextNegotiation::Proposed {
            pc.negotiation =
                ContextNegotiation::Rejected(PresentationContextResultReason::NoReason);
        }
    }

    let mut parameters = proposed.clone();
    parameters.apply_remote_user_variables(&ac.user_variables);
    let overhead = (PDU_HEADER_LENGTH + PDV_HEADER_LENGTH) as u32;
    if parameters.remote_max_pdu_length != 0 && parameters.remote_max_pdu_length <= overhead {
        return Err(ProtocolError::InvalidAcceptance(format!(
            "maximum length {} leaves no room for presentation data",
            parameters.remote_max_pdu_length
        )));
    }
    parameters.set_presentation_contexts(contexts);
    Ok(parameters)
}

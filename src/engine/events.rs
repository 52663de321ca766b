use crate::association::AssociationParameters;
use crate::error::AbortCause;
use crate::message::Message;
use crate::pdu::AssociationRJ;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use ulid::Ulid;

/// Cumulative payload counters of one association.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferCounters {
    pub incoming_bytes: u64,
    pub outgoing_bytes: u64,
    pub incoming_messages: u64,
    pub outgoing_messages: u64,
}

#[derive(Default)]
pub(crate) struct Counters {
    incoming_bytes: AtomicU64,
    outgoing_bytes: AtomicU64,
    incoming_messages: AtomicU64,
    outgoing_messages: AtomicU64,
}

impl Counters {
    pub(crate) fn add_incoming_bytes(&self, n: usize) {
        self.incoming_bytes.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn add_outgoing_bytes(&self, n: usize) {
        self.outgoing_bytes.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn incoming_message(&self) {
        self.incoming_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn outgoing_message(&self) {
        self.outgoing_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> TransferCounters {
        TransferCounters {
            incoming_bytes: self.incoming_bytes.load(Ordering::Relaxed),
            outgoing_bytes: self.outgoing_bytes.load(Ordering::Relaxed),
            incoming_messages: self.incoming_messages.load(Ordering::Relaxed),
            outgoing_messages: self.outgoing_messages.load(Ordering::Relaxed),
        }
    }
}

/// What a listener sees of an association when it is notified.
#[derive(Debug, Clone)]
pub struct AssociationSnapshot {
    pub id: Ulid,
    pub parameters: Arc<AssociationParameters>,
    pub counters: TransferCounters,
}

/// Observer of association lifecycle and message events.
///
/// Callbacks run on the task driving the association and must return
/// quickly. Hand anything slow off to another task.
pub trait AssociationListener: Send + Sync {
    fn on_established(&self, _association: &AssociationSnapshot) {}

    fn on_rejected(&self, _association: &AssociationSnapshot, _rejection: &AssociationRJ) {}

    fn on_released(&self, _association: &AssociationSnapshot) {}

    fn on_aborted(&self, _association: &AssociationSnapshot, _cause: &AbortCause) {}

    fn on_message_sent(&self, _association: &AssociationSnapshot, _message: &Message) {}

    fn on_message_received(&self, _association: &AssociationSnapshot, _message: &Message) {}
}

/// How an association ended.
#[derive(Debug, Clone)]
pub enum Outcome {
    Released,
    Rejected(AssociationRJ),
    Aborted(AbortCause),
}

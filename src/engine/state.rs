use std::fmt::{Display, Formatter};

/// Where an association is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationState {
    Idle,
    /// Transport is open, no association requested yet.
    Connecting,
    /// Requestor sent A-ASSOCIATE-RQ and awaits the answer.
    AssociationRequested,
    /// Acceptor awaits the A-ASSOCIATE-RQ.
    AwaitingAssociation,
    Associated,
    /// A-RELEASE-RQ sent, awaiting A-RELEASE-RP.
    Releasing,
    Closed,
    Aborted,
}

impl AssociationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AssociationState::Closed | AssociationState::Aborted)
    }
}

impl Display for AssociationState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AssociationState::Idle => "idle",
            AssociationState::Connecting => "connecting",
            AssociationState::AssociationRequested => "association requested",
            AssociationState::AwaitingAssociation => "awaiting association",
            AssociationState::Associated => "associated",
            AssociationState::Releasing => "releasing",
            AssociationState::Closed => "closed",
            AssociationState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

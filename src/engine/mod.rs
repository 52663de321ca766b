//! The association state machine.
//!
//! One [Association] drives one transport connection. A dedicated reader
//! task decodes incoming PDUs strictly in arrival order and advances the
//! state machine, while callers send messages, release or abort from any
//! task. Writes go through a single mutex-guarded write half.

mod events;
mod state;

pub use events::{AssociationListener, AssociationSnapshot, Outcome, TransferCounters};
pub use state::AssociationState;

use crate::assembler::{self, AssemblyError, MessageAssembler, DEFAULT_MAX_MESSAGE_SIZE};
use crate::association::AssociationParameters;
use crate::error::{AbortCause, AssociationError, ProtocolError, TimeoutKind};
use crate::message::Message;
use crate::negotiation::{apply_acceptance, negotiate, AcceptorPolicy, Acceptance};
use crate::pdu::{
    self, AbortRQSource, AssociationAC, AssociationRJ, AssociationRQ, PDataValue, Pdu,
};
use crate::transport;
use crate::types::{AETitle, Endpoint};
use bytes::BytesMut;
use events::Counters;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use ulid::Ulid;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

const READ_BUFFER_CAPACITY: usize = 64 * 1024;

/// How long an abort may spend trying to tell the peer.
const ABORT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Timers and limits of one association.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long an acceptor waits for the A-ASSOCIATE-RQ.
    pub association_timeout: Duration,
    /// How long a requestor waits for the A-ASSOCIATE-AC or -RJ.
    pub response_timeout: Duration,
    /// How long to wait for the A-RELEASE-RP.
    pub release_timeout: Duration,
    /// Abort after this long without incoming traffic while associated.
    pub idle_timeout: Option<Duration>,
    /// Largest message that will be reassembled.
    pub max_message_size: usize,
    /// Refuse incoming P-DATA-TF PDUs longer than our maximum PDU length.
    pub strict: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            association_timeout: Duration::from_secs(30),
            response_timeout: Duration::from_secs(30),
            release_timeout: Duration::from_secs(30),
            idle_timeout: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            strict: false,
        }
    }
}

/// Which side of the association we are.
#[derive(Debug, Clone)]
pub enum Role {
    Initiator,
    Acceptor(Arc<AcceptorPolicy>),
}

struct Shared {
    id: Ulid,
    role: Role,
    config: EngineConfig,
    state: watch::Sender<AssociationState>,
    parameters: RwLock<Arc<AssociationParameters>>,
    writer: tokio::sync::Mutex<Option<BoxedWriter>>,
    counters: Counters,
    listeners: Vec<Arc<dyn AssociationListener>>,
    outcome: Mutex<Option<Outcome>>,
}

/// A DICOM association over some byte stream transport.
pub struct Association {
    shared: Arc<Shared>,
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<Message>>,
}

impl Association {
    /// Open a TCP connection to `endpoint` for a requestor.
    ///
    /// The association is in the [AssociationState::Connecting] state
    /// afterwards; call [Association::send_associate_request] next.
    pub async fn connect(
        endpoint: &Endpoint,
        connect_timeout: Duration,
        mut parameters: AssociationParameters,
        config: EngineConfig,
        listeners: Vec<Arc<dyn AssociationListener>>,
    ) -> Result<Self, AssociationError> {
        let stream = transport::connect(endpoint, connect_timeout).await?;
        parameters.local_endpoint = stream.local_addr().ok().map(Endpoint::from);
        parameters.remote_endpoint = Some(endpoint.clone());
        Ok(Self::initiator(stream, parameters, config, listeners))
    }

    /// Requestor side over an already connected transport.
    pub fn initiator<S>(
        stream: S,
        parameters: AssociationParameters,
        config: EngineConfig,
        listeners: Vec<Arc<dyn AssociationListener>>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::spawn(stream, Role::Initiator, parameters, config, listeners)
    }

    /// Acceptor side of a freshly accepted transport connection.
    pub fn acceptor<S>(
        stream: S,
        policy: Arc<AcceptorPolicy>,
        config: EngineConfig,
        listeners: Vec<Arc<dyn AssociationListener>>,
        local_endpoint: Option<Endpoint>,
        remote_endpoint: Option<Endpoint>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        // the calling AE title stays empty until the A-ASSOCIATE-RQ arrives
        let calling = AETitle::new(String::new());
        let mut parameters = AssociationParameters::new(calling, policy.ae_title.clone())
            .with_max_pdu_length(policy.max_pdu_length);
        parameters.local_endpoint = local_endpoint;
        parameters.remote_endpoint = remote_endpoint;
        Self::spawn(stream, Role::Acceptor(policy), parameters, config, listeners)
    }

    fn spawn<S>(
        stream: S,
        role: Role,
        parameters: AssociationParameters,
        config: EngineConfig,
        listeners: Vec<Arc<dyn AssociationListener>>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let initial = match role {
            Role::Initiator => AssociationState::Connecting,
            Role::Acceptor(_) => AssociationState::AwaitingAssociation,
        };
        let (reader, writer) = tokio::io::split(stream);
        let (state, _) = watch::channel(AssociationState::Idle);
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            id: Ulid::new(),
            role,
            config,
            state,
            parameters: RwLock::new(Arc::new(parameters)),
            writer: tokio::sync::Mutex::new(Some(Box::new(writer))),
            counters: Counters::default(),
            listeners,
            outcome: Mutex::new(None),
        });
        shared.transition(initial);
        tokio::spawn(read_loop(Arc::clone(&shared), reader, inbox_tx));
        Self {
            shared,
            inbox: tokio::sync::Mutex::new(inbox_rx),
        }
    }

    pub fn id(&self) -> Ulid {
        self.shared.id
    }

    pub fn state(&self) -> AssociationState {
        self.shared.state()
    }

    /// Current parameters. Final once the association is established.
    pub fn parameters(&self) -> Arc<AssociationParameters> {
        self.shared.parameters()
    }

    pub fn counters(&self) -> TransferCounters {
        self.shared.counters.snapshot()
    }

    /// How the association ended, once it has.
    pub fn outcome(&self) -> Option<Outcome> {
        self.shared.outcome()
    }

    /// Send the A-ASSOCIATE-RQ and wait for the answer.
    pub async fn send_associate_request(
        &self,
    ) -> Result<Arc<AssociationParameters>, AssociationError> {
        let state = self.state();
        if !matches!(self.shared.role, Role::Initiator) || state != AssociationState::Connecting {
            return Err(AssociationError::InvalidState {
                operation: "request an association",
                state,
            });
        }
        let rq = self.shared.parameters().to_associate_rq()?;
        if !self.shared.transition(AssociationState::AssociationRequested) {
            return Err(self.shared.termination_error("request an association"));
        }
        tracing::info!(
            association_ulid = %self.id(),
            aec = %rq.calling_ae_title,
            aet = %rq.called_ae_title,
            "requesting association"
        );
        if let Err(cause) = self.shared.write_pdu(&Pdu::AssociationRQ(rq)).await {
            self.shared.abort(cause.clone()).await;
            return Err(cause.into());
        }
        let state = self
            .wait_for_state(|s| s == AssociationState::Associated || s.is_terminal())
            .await;
        if state == AssociationState::Associated {
            Ok(self.parameters())
        } else {
            Err(self.shared.termination_error("request an association"))
        }
    }

    /// Acceptor side: wait until the peer's request was answered.
    pub async fn wait_for_association(
        &self,
    ) -> Result<Arc<AssociationParameters>, AssociationError> {
        let state = self
            .wait_for_state(|s| s == AssociationState::Associated || s.is_terminal())
            .await;
        if state == AssociationState::Associated {
            Ok(self.parameters())
        } else {
            Err(self.shared.termination_error("accept an association"))
        }
    }

    /// Fragment and send a message. Fails without side effects unless associated.
    ///
    /// A message is either sent whole or the association is aborted.
    pub async fn send_message(&self, message: Message) -> Result<(), AssociationError> {
        const OPERATION: &str = "send a message";
        let state = self.state();
        if state != AssociationState::Associated {
            return Err(AssociationError::InvalidState {
                operation: OPERATION,
                state,
            });
        }
        let parameters = self.parameters();
        let id = message.presentation_context_id;
        if parameters.accepted_transfer_syntax(id).is_none() {
            return Err(AssociationError::PresentationContextNotAccepted(id));
        }
        let max = parameters.max_send_pdu_length();
        let pdus = assembler::fragment(&message, max)?;

        let shared = &self.shared;
        let mut ended = shared.state.subscribe();
        let mut writer = shared.writer.lock().await;
        for pdu in &pdus {
            let state = shared.state();
            if state.is_terminal() {
                // between PDUs, so the peer can still be told
                let w = writer.take();
                drop(writer);
                shared.send_abort_and_close(w, shared.pending_abort_source()).await;
                return Err(shared.termination_error(OPERATION));
            }
            if state != AssociationState::Associated {
                drop(writer);
                shared.abort(AbortCause::Local).await;
                return Err(shared.termination_error(OPERATION));
            }
            let written = match pdu::encode(pdu, max) {
                Ok(bytes) => shared.write_or_end(&mut writer, &bytes, &mut ended).await,
                Err(e) => Err(AbortCause::Encoding(e)),
            };
            if let Err(cause) = written {
                drop(writer);
                shared.abort(cause).await;
                return Err(shared.termination_error(OPERATION));
            }
        }
        drop(writer);

        shared.counters.add_outgoing_bytes(message.payload_len());
        shared.counters.outgoing_message();
        tracing::debug!(
            association_ulid = %shared.id,
            presentation_context_id = id,
            bytes = message.payload_len(),
            pdus = pdus.len(),
            "message sent"
        );
        shared.notify(|l, s| l.on_message_sent(s, &message));
        Ok(())
    }

    /// Next reassembled incoming message, or `None` once the association ended
    /// and every received message was taken.
    pub async fn next_message(&self) -> Option<Message> {
        self.inbox.lock().await.recv().await
    }

    /// Send A-RELEASE-RQ and wait for the A-RELEASE-RP.
    pub async fn release(&self) -> Result<(), AssociationError> {
        let state = self.state();
        if state != AssociationState::Associated {
            return Err(AssociationError::InvalidState {
                operation: "release",
                state,
            });
        }
        if !self.shared.transition(AssociationState::Releasing) {
            return Err(self.shared.termination_error("release"));
        }
        if let Err(cause) = self.shared.write_pdu(&Pdu::ReleaseRQ).await {
            self.shared.abort(cause.clone()).await;
            return Err(cause.into());
        }
        self.wait_for_state(AssociationState::is_terminal).await;
        match self.outcome() {
            Some(Outcome::Released) => Ok(()),
            _ => Err(self.shared.termination_error("release")),
        }
    }

    /// Abort the association. Does nothing if it already ended.
    pub async fn abort(&self) {
        self.shared.abort(AbortCause::Local).await
    }

    /// Wait until the association ended, however it ends.
    pub async fn closed(&self) -> Option<Outcome> {
        self.wait_for_state(AssociationState::is_terminal).await;
        self.outcome()
    }

    /// The error describing why an operation found the association ended.
    pub(crate) fn termination_error(&self, operation: &'static str) -> AssociationError {
        self.shared.termination_error(operation)
    }

    async fn wait_for_state<F>(&self, done: F) -> AssociationState
    where
        F: Fn(AssociationState) -> bool,
    {
        let mut rx = self.shared.state.subscribe();
        let result = rx.wait_for(|state| done(*state)).await.map(|state| *state);
        result.unwrap_or_else(|_| *rx.borrow())
    }
}

impl Drop for Association {
    fn drop(&mut self) {
        if self.state().is_terminal() {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let shared = Arc::clone(&self.shared);
            handle.spawn(async move { shared.abort(AbortCause::Local).await });
        }
    }
}

impl Shared {
    fn state(&self) -> AssociationState {
        *self.state.borrow()
    }

    fn parameters(&self) -> Arc<AssociationParameters> {
        let parameters = self.parameters.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&parameters)
    }

    fn set_parameters(&self, parameters: AssociationParameters) {
        let mut guard = self.parameters.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(parameters);
    }

    fn outcome(&self) -> Option<Outcome> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn transition(&self, to: AssociationState) -> bool {
        self.transition_with(to, None)
    }

    /// Move to `to` unless the association already ended. A terminal
    /// `outcome` is recorded before any waiter can observe the new state.
    fn transition_with(&self, to: AssociationState, outcome: Option<Outcome>) -> bool {
        let mut from = None;
        self.state.send_if_modified(|state| {
            if state.is_terminal() || *state == to {
                return false;
            }
            if let Some(outcome) = outcome {
                *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
            }
            from = Some(*state);
            *state = to;
            true
        });
        match from {
            Some(from) => {
                tracing::debug!(association_ulid = %self.id, %from, %to, "state transition");
                true
            }
            None => false,
        }
    }

    fn termination_error(&self, operation: &'static str) -> AssociationError {
        match self.outcome() {
            Some(Outcome::Rejected(rejection)) => AssociationError::Rejected(rejection),
            Some(Outcome::Aborted(cause)) => cause.into(),
            Some(Outcome::Released) | None => AssociationError::InvalidState {
                operation,
                state: self.state(),
            },
        }
    }

    fn snapshot(&self) -> AssociationSnapshot {
        AssociationSnapshot {
            id: self.id,
            parameters: self.parameters(),
            counters: self.counters.snapshot(),
        }
    }

    fn notify<F>(&self, f: F)
    where
        F: Fn(&dyn AssociationListener, &AssociationSnapshot),
    {
        if self.listeners.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for listener in &self.listeners {
            f(listener.as_ref(), &snapshot);
        }
    }

    /// Largest incoming PDU length field accepted, and whether it is enforced.
    fn receive_limit(&self) -> (u32, bool) {
        let strict = match &self.role {
            Role::Initiator => self.config.strict,
            Role::Acceptor(policy) => self.config.strict || policy.strict,
        };
        (self.parameters().local_max_pdu_length, strict)
    }

    fn timer_for(&self, state: AssociationState) -> Option<(Duration, TimeoutKind)> {
        match state {
            AssociationState::AwaitingAssociation => {
                Some((self.config.association_timeout, TimeoutKind::Association))
            }
            AssociationState::AssociationRequested => {
                Some((self.config.response_timeout, TimeoutKind::Response))
            }
            AssociationState::Releasing => {
                Some((self.config.release_timeout, TimeoutKind::Release))
            }
            AssociationState::Associated => {
                self.config.idle_timeout.map(|d| (d, TimeoutKind::Idle))
            }
            _ => None,
        }
    }

    async fn write_pdu(&self, pdu: &Pdu) -> Result<(), AbortCause> {
        let bytes = pdu::encode(pdu, pdu::MAXIMUM_PDU_SIZE)?;
        tracing::trace!(association_ulid = %self.id, "sending {}", pdu.short_description());
        let mut ended = self.state.subscribe();
        let mut writer = self.writer.lock().await;
        self.write_or_end(&mut writer, &bytes, &mut ended).await
    }

    /// Write and flush `bytes`, unless the association ends first. The
    /// transport is then shut down, as a PDU may be half written.
    async fn write_or_end(
        &self,
        writer: &mut Option<BoxedWriter>,
        bytes: &[u8],
        ended: &mut watch::Receiver<AssociationState>,
    ) -> Result<(), AbortCause> {
        let Some(w) = writer.as_mut() else {
            return Err(AbortCause::io(std::io::ErrorKind::NotConnected.into()));
        };
        let written = tokio::select! {
            written = async {
                w.write_all(bytes).await?;
                w.flush().await
            } => Some(written),
            () = async {
                let _ = ended.wait_for(|state| state.is_terminal()).await;
            } => None,
        };
        match written {
            Some(written) => written.map_err(AbortCause::io),
            None => {
                tracing::debug!(association_ulid = %self.id, "association ended while writing");
                self.close_writer(writer.take()).await;
                Err(AbortCause::io(std::io::ErrorKind::ConnectionAborted.into()))
            }
        }
    }

    /// A-ABORT source owed to the peer for how the association ended.
    fn pending_abort_source(&self) -> Option<AbortRQSource> {
        match self.outcome() {
            Some(Outcome::Aborted(cause)) => cause.abort_source(),
            _ => None,
        }
    }

    /// Send an A-ABORT from `source`, if any, with a bounded wait, then shut down.
    async fn send_abort_and_close(
        &self,
        mut writer: Option<BoxedWriter>,
        source: Option<AbortRQSource>,
    ) {
        if let (Some(source), Some(w)) = (source, writer.as_mut()) {
            let pdu = Pdu::AbortRQ { source };
            if let Ok(bytes) = pdu::encode(&pdu, pdu::MAXIMUM_PDU_SIZE) {
                let write = async {
                    w.write_all(&bytes).await?;
                    w.flush().await
                };
                match tokio::time::timeout(ABORT_WRITE_TIMEOUT, write).await {
                    Ok(Ok(())) => {
                        let sent = pdu.short_description();
                        tracing::trace!(association_ulid = %self.id, "sent {sent}")
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(
                            association_ulid = %self.id,
                            error = %e,
                            "could not send A-ABORT"
                        )
                    }
                    Err(_) => {
                        tracing::debug!(association_ulid = %self.id, "timed out sending A-ABORT")
                    }
                }
            }
        }
        self.close_writer(writer).await;
    }

    async fn close_writer(&self, writer: Option<BoxedWriter>) {
        if let Some(mut w) = writer {
            if let Err(e) = w.shutdown().await {
                tracing::debug!(
                    association_ulid = %self.id,
                    error = %e,
                    "could not shut down transport"
                );
            }
        }
    }

    async fn close_transport(&self) {
        let writer = self.writer.lock().await.take();
        self.close_writer(writer).await;
    }

    /// Abort: tell the peer when appropriate, close the transport, notify.
    /// Only the first call has any effect.
    async fn abort(&self, cause: AbortCause) {
        if !self.transition_with(AssociationState::Aborted, Some(Outcome::Aborted(cause.clone()))) {
            return;
        }
        match &cause {
            AbortCause::Local => {
                tracing::info!(association_ulid = %self.id, "association aborted by user")
            }
            cause => {
                tracing::warn!(association_ulid = %self.id, cause = %cause, "association aborted")
            }
        }
        // a sender holding the writer notices the state change and closes it
        if let Ok(mut writer) = self.writer.try_lock() {
            let w = writer.take();
            drop(writer);
            self.send_abort_and_close(w, cause.abort_source()).await;
        }
        self.notify(|l, s| l.on_aborted(s, &cause));
    }

    fn finish_release(&self) -> bool {
        if !self.transition_with(AssociationState::Closed, Some(Outcome::Released)) {
            return false;
        }
        let parameters = self.parameters();
        tracing::info!(
            association_ulid = %self.id,
            aec = %parameters.calling_ae_title,
            aet = %parameters.called_ae_title,
            "association released"
        );
        true
    }

    async fn reject(&self, rejection: AssociationRJ) {
        if !self.transition_with(AssociationState::Closed, Some(Outcome::Rejected(rejection))) {
            return;
        }
        self.close_transport().await;
        self.notify(|l, s| l.on_rejected(s, &rejection));
    }

    async fn handle_pdu(
        &self,
        pdu: Pdu,
        state: AssociationState,
        assembler: &mut MessageAssembler,
        inbox: &mpsc::UnboundedSender<Message>,
    ) {
        use AssociationState::*;
        tracing::trace!(association_ulid = %self.id, "received {}", pdu.short_description());
        match (pdu, state) {
            (Pdu::AssociationRQ(rq), AwaitingAssociation) => self.on_associate_request(rq).await,
            (Pdu::AssociationAC(ac), AssociationRequested) => self.on_associate_accept(ac).await,
            (Pdu::AssociationRJ(rejection), AssociationRequested) => {
                tracing::info!(association_ulid = %self.id, "association rejected: {rejection}");
                self.reject(rejection).await
            }
            (Pdu::PData { data }, Associated | Releasing) => {
                self.on_pdata(data, assembler, inbox).await
            }
            (Pdu::ReleaseRQ, Associated) => {
                if let Err(cause) = self.write_pdu(&Pdu::ReleaseRP).await {
                    return self.abort(cause).await;
                }
                if self.finish_release() {
                    self.close_transport().await;
                    self.notify(|l, s| l.on_released(s));
                }
            }
            (Pdu::ReleaseRQ, Releasing) => {
                // release collision: answer, then keep waiting for our own reply
                if let Err(cause) = self.write_pdu(&Pdu::ReleaseRP).await {
                    self.abort(cause).await;
                }
            }
            (Pdu::ReleaseRP, Releasing) => {
                if self.finish_release() {
                    self.close_transport().await;
                    self.notify(|l, s| l.on_released(s));
                }
            }
            (Pdu::AbortRQ { source }, _) => self.abort(AbortCause::Peer { origin: source }).await,
            (pdu, state) => {
                let error = ProtocolError::UnexpectedPdu {
                    pdu: pdu.kind(),
                    state,
                };
                self.abort(error.into()).await
            }
        }
    }

    async fn on_associate_request(&self, rq: AssociationRQ) {
        let Role::Acceptor(policy) = &self.role else {
            let error = ProtocolError::UnexpectedPdu {
                pdu: "A-ASSOCIATE-RQ",
                state: self.state(),
            };
            return self.abort(error.into()).await;
        };
        let current = self.parameters();
        match negotiate(&rq, policy) {
            Ok(Acceptance { ac, mut parameters }) => {
                parameters.local_endpoint = current.local_endpoint.clone();
                parameters.remote_endpoint = current.remote_endpoint.clone();
                if let Err(cause) = self.write_pdu(&Pdu::AssociationAC(ac)).await {
                    return self.abort(cause).await;
                }
                tracing::info!(
                    association_ulid = %self.id,
                    aec = %parameters.calling_ae_title,
                    aet = %parameters.called_ae_title,
                    accepted = parameters
                        .presentation_contexts()
                        .iter()
                        .filter(|pc| pc.is_accepted())
                        .count(),
                    "association accepted"
                );
                self.set_parameters(parameters);
                if self.transition(AssociationState::Associated) {
                    self.notify(|l, s| l.on_established(s));
                }
            }
            Err(rejection) => {
                let mut parameters = (*current).clone();
                parameters.calling_ae_title = AETitle::new(rq.calling_ae_title.clone());
                parameters.called_ae_title = AETitle::new(rq.called_ae_title.clone());
                self.set_parameters(parameters);
                tracing::info!(
                    association_ulid = %self.id,
                    aec = %rq.calling_ae_title,
                    aet = %rq.called_ae_title,
                    "rejecting association: {rejection}"
                );
                if let Err(cause) = self.write_pdu(&Pdu::AssociationRJ(rejection)).await {
                    return self.abort(cause).await;
                }
                self.reject(rejection).await
            }
        }
    }

    async fn on_associate_accept(&self, ac: AssociationAC) {
        match apply_acceptance(&self.parameters(), &ac) {
            Ok(parameters) => {
                tracing::info!(
                    association_ulid = %self.id,
                    aec = %parameters.calling_ae_title,
                    aet = %parameters.called_ae_title,
                    max_pdu_length = parameters.max_send_pdu_length(),
                    "association established"
                );
                self.set_parameters(parameters);
                if self.transition(AssociationState::Associated) {
                    self.notify(|l, s| l.on_established(s));
                }
            }
            Err(e) => self.abort(e.into()).await,
        }
    }

    async fn on_pdata(
        &self,
        data: Vec<PDataValue>,
        assembler: &mut MessageAssembler,
        inbox: &mpsc::UnboundedSender<Message>,
    ) {
        let parameters = self.parameters();
        for pdv in data {
            let id = pdv.presentation_context_id;
            if parameters.accepted_transfer_syntax(id).is_none() {
                let error = ProtocolError::UnknownPresentationContext(id);
                return self.abort(error.into()).await;
            }
            self.counters.add_incoming_bytes(pdv.data.len());
            match assembler.push(pdv) {
                Ok(Some(message)) => {
                    self.counters.incoming_message();
                    tracing::debug!(
                        association_ulid = %self.id,
                        presentation_context_id = id,
                        bytes = message.payload_len(),
                        "message received"
                    );
                    self.notify(|l, s| l.on_message_received(s, &message));
                    if inbox.send(message).is_err() {
                        tracing::debug!(
                            association_ulid = %self.id,
                            "nobody is taking messages, dropped one"
                        );
                    }
                }
                Ok(None) => {}
                Err(AssemblyError::Protocol(e)) => return self.abort(e.into()).await,
                Err(AssemblyError::MessageTooLarge { limit }) => {
                    return self.abort(AbortCause::MessageTooLarge { limit }).await;
                }
            }
        }
    }

    async fn connection_lost(&self, pending_bytes: usize) {
        let error = std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("connection closed by peer with {pending_bytes} bytes of an incomplete PDU"),
        );
        self.abort(AbortCause::io(error)).await
    }
}

/// Drive the state machine from incoming bytes until the association ends.
async fn read_loop<R>(shared: Arc<Shared>, mut reader: R, inbox: mpsc::UnboundedSender<Message>)
where
    R: AsyncRead + Unpin,
{
    let mut state_rx = shared.state.subscribe();
    let mut buffer = BytesMut::with_capacity(READ_BUFFER_CAPACITY);
    let mut assembler = MessageAssembler::new(shared.config.max_message_size);
    // deadline of the state the timer was started in
    let mut deadline: Option<(AssociationState, Instant)> = None;
    loop {
        let state = *state_rx.borrow_and_update();
        if state.is_terminal() {
            break;
        }
        let (max_pdu_length, strict) = shared.receive_limit();
        match pdu::read_pdu(&mut buffer, max_pdu_length, strict) {
            Ok(Some(pdu)) => {
                shared.handle_pdu(pdu, state, &mut assembler, &inbox).await;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                shared.abort(e.into()).await;
                break;
            }
        }
        let timer = shared.timer_for(state);
        let expires_at = match (timer, deadline) {
            (None, _) => None,
            (Some(_), Some((started_in, at))) if started_in == state => Some(at),
            (Some((duration, _)), _) => {
                let at = Instant::now() + duration;
                deadline = Some((state, at));
                Some(at)
            }
        };
        let expiry = async {
            match expires_at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            read = reader.read_buf(&mut buffer) => match read {
                Ok(0) => {
                    shared.connection_lost(buffer.len()).await;
                    break;
                }
                Ok(_) => {
                    // only the idle timer restarts on traffic
                    if state == AssociationState::Associated {
                        deadline = None;
                    }
                }
                Err(e) => {
                    shared.abort(AbortCause::io(e)).await;
                    break;
                }
            },
            _ = expiry => {
                if let Some((_, kind)) = timer {
                    shared.abort(AbortCause::Timeout(kind)).await;
                }
                break;
            }
        }
    }
    if assembler.pending() > 0 {
        tracing::debug!(
            association_ulid = %shared.id,
            pending = assembler.pending(),
            "discarding partially received messages"
        );
    }
}

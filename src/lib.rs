//! DICOM upper layer protocol (PS3.8) engine.
//!
//! - [pdu]: encoding and decoding of every PDU type
//! - [Association]: the per-connection state machine
//! - [MessageAssembler] and [fragment]: DIMSE messages to and from P-DATA-TF PDUs
//! - [DicomClient] and [DicomServer]: requestor and acceptor roles
//! - [StatisticsRecorder]: per-association transmission statistics

mod assembler;
mod association;
mod audit;
mod client;
mod config;
mod engine;
mod error;
pub mod message;
mod negotiation;
pub mod pdu;
mod run;
mod scp;
mod server;
mod settings;
pub mod sop_classes;
mod statistics;
mod telemetry;
mod transport;
mod types;

pub use assembler::{
    fragment, AssemblyError, MessageAssembler, DEFAULT_MAX_MESSAGE_SIZE, PDATA_OVERHEAD,
};
pub use association::{
    AssociationParameters, AsyncOperationsWindow, ContextNegotiation, PresentationContext,
    APPLICATION_CONTEXT_NAME, IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME,
};
pub use audit::audit_sink_loop;
pub use client::{ClientOptions, DicomClient};
pub use config::get_config;
pub use engine::{
    Association, AssociationListener, AssociationSnapshot, AssociationState, EngineConfig,
    Outcome, Role, TransferCounters,
};
pub use error::{AbortCause, AssociationError, EncodingError, ProtocolError, TimeoutKind};
pub use message::Message;
pub use negotiation::{apply_acceptance, negotiate, Acceptance, AcceptorPolicy};
pub use run::{run_server, run_server_from_env};
pub use scp::{InstanceError, ReceivedInstance, StorageServiceProvider};
pub use server::{DicomServer, ServiceClassProvider, ServiceContext};
pub use settings::{OxidulEnvOptions, ScpSettings};
pub use statistics::{
    AssociationOutcome, AssociationStart, Direction, StatisticsRecorder, TransmissionStatistics,
};
pub use telemetry::{init_logging, init_otel, OtelGuard};
pub use transport::connect;
pub use types::{AETitle, Endpoint};

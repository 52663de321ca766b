//! Per-association transmission statistics.
//!
//! [StatisticsRecorder] observes associations, and once one ends it hands a
//! finished [TransmissionStatistics] record to the audit sink. It never
//! touches the association itself.

use crate::engine::{AssociationListener, AssociationSnapshot, TransferCounters};
use crate::error::AbortCause;
use crate::message::Message;
use crate::pdu::AssociationRJ;
use crate::types::AETitle;
use opentelemetry::metrics::Counter;
use opentelemetry::{global, KeyValue};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::mpsc::UnboundedSender;
use ulid::Ulid;

/// Direction which moved more payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AssociationOutcome {
    Released,
    Aborted { cause: String },
}

/// Statistics of one finished association.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransmissionStatistics {
    pub association_ulid: Ulid,
    /// Calling and called AE titles, and endpoints.
    pub description: String,
    pub calling_ae_title: AETitle,
    pub called_ae_title: AETitle,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub incoming_bytes: u64,
    pub outgoing_bytes: u64,
    pub incoming_messages: u64,
    pub outgoing_messages: u64,
    pub dominant_direction: Direction,
    /// Throughput of the dominant direction.
    pub bytes_per_second: f64,
    pub messages_per_second: f64,
    pub outcome: AssociationOutcome,
}

/// What is known about an association between establishment and its end.
#[derive(Debug, Clone)]
pub struct AssociationStart {
    pub association_ulid: Ulid,
    pub description: String,
    pub calling_ae_title: AETitle,
    pub called_ae_title: AETitle,
    pub started_at: OffsetDateTime,
}

impl AssociationStart {
    pub fn from_snapshot(association: &AssociationSnapshot, started_at: OffsetDateTime) -> Self {
        Self {
            association_ulid: association.id,
            description: association.parameters.to_string(),
            calling_ae_title: association.parameters.calling_ae_title.clone(),
            called_ae_title: association.parameters.called_ae_title.clone(),
            started_at,
        }
    }
}

impl TransmissionStatistics {
    /// Compute throughput from the final counters.
    ///
    /// Ties between the directions count as incoming. A zero `elapsed`
    /// yields zero rates.
    pub fn finalize(
        start: AssociationStart,
        counters: TransferCounters,
        elapsed: Duration,
        finished_at: OffsetDateTime,
        outcome: AssociationOutcome,
    ) -> Self {
        let (dominant_direction, bytes, messages) =
            if counters.outgoing_bytes > counters.incoming_bytes {
                (Direction::Outgoing, counters.outgoing_bytes, counters.outgoing_messages)
            } else {
                (Direction::Incoming, counters.incoming_bytes, counters.incoming_messages)
            };
        let seconds = elapsed.as_secs_f64();
        let rate = |n: u64| if seconds > 0.0 { n as f64 / seconds } else { 0.0 };
        Self {
            association_ulid: start.association_ulid,
            description: start.description,
            calling_ae_title: start.calling_ae_title,
            called_ae_title: start.called_ae_title,
            started_at: start.started_at,
            finished_at,
            elapsed,
            incoming_bytes: counters.incoming_bytes,
            outgoing_bytes: counters.outgoing_bytes,
            incoming_messages: counters.incoming_messages,
            outgoing_messages: counters.outgoing_messages,
            dominant_direction,
            bytes_per_second: rate(bytes),
            messages_per_second: rate(messages),
            outcome,
        }
    }
}

struct InProgress {
    start: AssociationStart,
    timer: Instant,
}

struct Metrics {
    bytes: Counter<u64>,
    messages: Counter<u64>,
    associations: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter(env!("CARGO_PKG_NAME"));
        Self {
            bytes: meter
                .u64_counter("dicom.association.bytes")
                .with_description("Payload bytes of DIMSE messages")
                .with_unit("By")
                .build(),
            messages: meter
                .u64_counter("dicom.association.messages")
                .with_description("DIMSE messages")
                .build(),
            associations: meter
                .u64_counter("dicom.associations")
                .with_description("Finished associations by outcome")
                .build(),
        }
    }
}

/// Association listener which produces [TransmissionStatistics].
///
/// Finished records are sent to `sink`. Lost records are not retried.
pub struct StatisticsRecorder {
    in_progress: Mutex<HashMap<Ulid, InProgress>>,
    sink: UnboundedSender<TransmissionStatistics>,
    metrics: Metrics,
}

impl StatisticsRecorder {
    pub fn new(sink: UnboundedSender<TransmissionStatistics>) -> Self {
        Self {
            in_progress: Default::default(),
            sink,
            metrics: Metrics::new(),
        }
    }

    fn finish(&self, association: &AssociationSnapshot, outcome: AssociationOutcome) {
        let label = match outcome {
            AssociationOutcome::Released => "released",
            AssociationOutcome::Aborted { .. } => "aborted",
        };
        self.metrics
            .associations
            .add(1, &[KeyValue::new("outcome", label)]);
        let Ok(mut in_progress) = self.in_progress.lock() else {
            return;
        };
        // aborted before it was ever established
        let Some(InProgress { start, timer }) = in_progress.remove(&association.id) else {
            return;
        };
        drop(in_progress);
        let statistics = TransmissionStatistics::finalize(
            start,
            association.counters,
            timer.elapsed(),
            OffsetDateTime::now_utc(),
            outcome,
        );
        if self.sink.send(statistics).is_err() {
            tracing::debug!(association_ulid = %association.id, "statistics sink is closed");
        }
    }

    fn count_message(&self, message: &Message, direction: &'static str) {
        let attributes = [KeyValue::new("direction", direction)];
        self.metrics.messages.add(1, &attributes);
        self.metrics
            .bytes
            .add(message.payload_len() as u64, &attributes);
    }
}

impl AssociationListener for StatisticsRecorder {
    fn on_established(&self, association: &AssociationSnapshot) {
        let start = AssociationStart::from_snapshot(association, OffsetDateTime::now_utc());
        if let Ok(mut in_progress) = self.in_progress.lock() {
            in_progress.insert(
                association.id,
                InProgress {
                    start,
                    timer: Instant::now(),
                },
            );
        }
    }

    fn on_rejected(&self, _association: &AssociationSnapshot, _rejection: &AssociationRJ) {
        self.metrics
            .associations
            .add(1, &[KeyValue::new("outcome", "rejected")]);
    }

    fn on_released(&self, association: &AssociationSnapshot) {
        self.finish(association, AssociationOutcome::Released)
    }

    fn on_aborted(&self, association: &AssociationSnapshot, cause: &AbortCause) {
        let outcome = AssociationOutcome::Aborted {
            cause: cause.to_string(),
        };
        self.finish(association, outcome)
    }

    fn on_message_sent(&self, _association: &AssociationSnapshot, message: &Message) {
        self.count_message(message, "outgoing")
    }

    fn on_message_received(&self, _association: &AssociationSnapshot, message: &Message) {
        self.count_message(message, "incoming")
    }
}

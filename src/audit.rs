//! Sink for finished [TransmissionStatistics].

use crate::statistics::TransmissionStatistics;
use camino::{Utf8Path, Utf8PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::UnboundedReceiver;

/// Log every record from `receiver`, also appending it as a JSON line to
/// `audit_file` if given. Returns once all senders are dropped.
///
/// Failures are logged and the record is dropped.
pub async fn audit_sink_loop(
    mut receiver: UnboundedReceiver<TransmissionStatistics>,
    audit_file: Option<Utf8PathBuf>,
) {
    while let Some(statistics) = receiver.recv().await {
        tracing::info!(
            association_ulid = %statistics.association_ulid,
            description = statistics.description,
            incoming_bytes = statistics.incoming_bytes,
            outgoing_bytes = statistics.outgoing_bytes,
            incoming_messages = statistics.incoming_messages,
            outgoing_messages = statistics.outgoing_messages,
            bytes_per_second = statistics.bytes_per_second,
            elapsed = ?statistics.elapsed,
            outcome = ?statistics.outcome,
            "association statistics"
        );
        if let Some(path) = &audit_file {
            if let Err(e) = append_record(path, &statistics).await {
                tracing::warn!(path = path.as_str(), "could not write audit record: {:?}", e);
            }
        }
    }
}

async fn append_record(path: &Utf8Path, statistics: &TransmissionStatistics) -> anyhow::Result<()> {
    let mut line = serde_json::to_vec(statistics)?;
    line.push(b'\n');
    let mut file = fs_err::tokio::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_std_path())
        .await?;
    file.write_all(&line).await?;
    file.flush().await?;
    Ok(())
}

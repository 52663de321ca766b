use crate::audit::audit_sink_loop;
use crate::config::get_config;
use crate::scp::{ReceivedInstance, StorageServiceProvider};
use crate::server::DicomServer;
use crate::settings::OxidulEnvOptions;
use crate::statistics::StatisticsRecorder;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Calls [run_server] using configuration from environment variables.
///
/// `finite_connections`: shut down the server after the given number of DICOM associations.
pub async fn run_server_from_env(finite_connections: Option<usize>) -> anyhow::Result<()> {
    let options: OxidulEnvOptions = get_config().extract()?;
    run_server(options, finite_connections, None::<fn(SocketAddr)>, None).await
}

/// Runs the DICOM listener along with the audit sink for association statistics.
///
/// Stored instances are sent to `instances` if given.
pub async fn run_server<F>(
    options: OxidulEnvOptions,
    finite_connections: Option<usize>,
    on_start: Option<F>,
    instances: Option<UnboundedSender<ReceivedInstance>>,
) -> anyhow::Result<()>
where
    F: FnOnce(SocketAddr),
{
    let (tx_statistics, rx_statistics) = tokio::sync::mpsc::unbounded_channel();
    let audit = tokio::spawn(audit_sink_loop(rx_statistics, options.audit_file.clone()));

    let server = DicomServer::new(options.acceptor_policy(), StorageServiceProvider::new(instances))
        .with_engine_config(options.engine_config())
        .with_listener(Arc::new(StatisticsRecorder::new(tx_statistics)));
    let address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, options.listener_port));
    let result = server.run(address, finite_connections, on_start).await;
    // the recorder holds the last sender, so the sink finishes after this
    drop(server);
    audit.await?;
    result
}

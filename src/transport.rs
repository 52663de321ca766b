//! TCP transport for requestors.

use crate::error::AssociationError;
use crate::types::Endpoint;
use std::time::Duration;
use tokio::net::TcpStream;

/// Open a TCP connection, failing after `timeout`.
pub async fn connect(
    endpoint: &Endpoint,
    timeout: Duration,
) -> Result<TcpStream, AssociationError> {
    let address = (endpoint.host.as_str(), endpoint.port);
    let stream = match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
        Err(_elapsed) => return Err(AssociationError::ConnectTimeout(endpoint.clone())),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
            return Err(AssociationError::ConnectionRefused(endpoint.clone()));
        }
        Ok(Err(source)) => {
            return Err(AssociationError::Connect {
                endpoint: endpoint.clone(),
                source,
            });
        }
        Ok(Ok(stream)) => stream,
    };
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(endpoint = %endpoint, error = %e, "could not disable Nagle's algorithm");
    }
    tracing::debug!(endpoint = %endpoint, "connected");
    Ok(stream)
}

//! Acceptor role: TCP accept loop dispatching each association to its own task.

use crate::association::AssociationParameters;
use crate::engine::{Association, AssociationListener, EngineConfig, Outcome};
use crate::error::AssociationError;
use crate::message::Message;
use crate::negotiation::AcceptorPolicy;
use crate::types::Endpoint;
use futures::future::BoxFuture;
use opentelemetry::trace::{Status, TraceContextExt, Tracer};
use opentelemetry::{global, Context, KeyValue};
use opentelemetry_semantic_conventions as semconv;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use ulid::Ulid;

/// What a service class provider knows about the association a request arrived on.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub association_ulid: Ulid,
    pub parameters: Arc<AssociationParameters>,
}

/// Maps a received request to an optional response.
pub trait ServiceClassProvider: Send + Sync + 'static {
    fn handle<'a>(
        &'a self,
        context: &'a ServiceContext,
        request: Message,
    ) -> BoxFuture<'a, anyhow::Result<Option<Message>>>;
}

/// A DICOM service class provider listening on a TCP port.
pub struct DicomServer {
    policy: Arc<AcceptorPolicy>,
    config: EngineConfig,
    listeners: Vec<Arc<dyn AssociationListener>>,
    provider: Arc<dyn ServiceClassProvider>,
}

impl DicomServer {
    pub fn new(policy: AcceptorPolicy, provider: impl ServiceClassProvider) -> Self {
        Self {
            policy: Arc::new(policy),
            config: EngineConfig::default(),
            listeners: Vec::new(),
            provider: Arc::new(provider),
        }
    }

    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn AssociationListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Listen for associations on `address`.
    ///
    /// `finite_connections` makes the server return after handling the given
    /// number of connections, which is useful for testing. `on_start` is
    /// called with the bound address once the server accepts connections.
    pub async fn run<F>(
        &self,
        address: SocketAddr,
        finite_connections: Option<usize>,
        on_start: Option<F>,
    ) -> anyhow::Result<()>
    where
        F: FnOnce(SocketAddr),
    {
        let listener = TcpListener::bind(address).await?;
        let local_address = listener.local_addr()?;
        tracing::info!("listening on: tcp://{}", local_address);
        if let Some(on_start) = on_start {
            on_start(local_address);
        }
        let tracer = global::tracer(env!("CARGO_PKG_NAME"));
        let mut tasks = JoinSet::new();
        let mut accepted = 0;
        while finite_connections.is_none_or(|n| accepted < n) {
            let (stream, peer) = match listener.accept().await {
                Ok(connection) => connection,
                Err(e) => {
                    tracing::warn!("could not accept connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };
            accepted += 1;
            let association = self.accept(stream, peer);
            let span = tracer.start("association");
            let cx = Context::current_with_span(span);
            cx.span().set_attributes([
                KeyValue::new("association_ulid", association.id().to_string()),
                KeyValue::new(semconv::trace::CLIENT_ADDRESS, peer.ip().to_string()),
                KeyValue::new(semconv::trace::CLIENT_PORT, peer.port() as i64),
            ]);
            let provider = Arc::clone(&self.provider);
            tasks.spawn(async move {
                match handle_association(association, provider, &cx).await {
                    Ok(()) => cx.span().set_status(Status::Ok),
                    Err(e) => {
                        tracing::error!("{:?}", e);
                        cx.span().set_status(Status::error(e.to_string()))
                    }
                }
            });
            while let Some(finished) = tasks.try_join_next() {
                log_join_error(finished);
            }
        }
        while let Some(finished) = tasks.join_next().await {
            log_join_error(finished);
        }
        Ok(())
    }

    fn accept(&self, stream: TcpStream, peer: SocketAddr) -> Association {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "could not disable Nagle's algorithm");
        }
        let local = stream.local_addr().ok().map(Endpoint::from);
        Association::acceptor(
            stream,
            Arc::clone(&self.policy),
            self.config.clone(),
            self.listeners.clone(),
            local,
            Some(Endpoint::from(peer)),
        )
    }
}

/// Serve requests on an accepted connection until the association ends.
async fn handle_association(
    association: Association,
    provider: Arc<dyn ServiceClassProvider>,
    cx: &Context,
) -> anyhow::Result<()> {
    let parameters = match association.wait_for_association().await {
        Ok(parameters) => parameters,
        Err(AssociationError::Rejected(rejection)) => {
            tracing::info!(
                association_ulid = %association.id(),
                "association rejected: {rejection}"
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    cx.span()
        .set_attribute(KeyValue::new("aec", parameters.calling_ae_title.to_string()));
    let context = ServiceContext {
        association_ulid: association.id(),
        parameters,
    };
    while let Some(request) = association.next_message().await {
        match provider.handle(&context, request).await {
            Ok(Some(response)) => association.send_message(response).await?,
            Ok(None) => {}
            Err(e) => {
                association.abort().await;
                return Err(e);
            }
        }
    }
    match association.outcome() {
        Some(Outcome::Aborted(cause)) => Err(AssociationError::from(cause).into()),
        _ => Ok(()),
    }
}

fn log_join_error(finished: Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        tracing::error!("association task failed: {}", e);
    }
}

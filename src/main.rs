use oxidul::{get_config, init_logging, init_otel, run_server_from_env};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let otel_enabled = get_config()
        .extract_inner::<bool>("otel_enabled")
        .unwrap_or(false);
    let _otel_guard = if otel_enabled { Some(init_otel()?) } else { None };
    tokio::select! {
        result = run_server_from_env(None) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}

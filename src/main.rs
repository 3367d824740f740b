use documind::{api, config, config::Config, logging, processing, retention};
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::net::TcpListener;

const FALLBACK_PORTS: std::ops::RangeInclusive<u16> = 8000..=8099;

#[tokio::main]
async fn main() {
    config::init_config();
    let config = config::get_config();
    logging::init_tracing(config);
    config.log_summary();

    retention::reset_root(&config.temp_upload_dir)
        .expect("Failed to prepare transient upload directory");
    tracing::info!(
        dir = %config.temp_upload_dir.display(),
        "Transient upload directory reset"
    );
    if let Err(error) = config.ensure_credentials() {
        tracing::warn!(%error, "Gemini credential missing; ingestion and queries will fail");
    }

    let service = processing::DocumentService::new(config.clone())
        .expect("Failed to initialize document service");
    let app = api::create_router(Arc::new(service), config);

    let listener = bind_listener(config).await.expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Listener has no local address");
    tracing::info!("DocuMind listening on http://{addr}");
    axum::serve(listener, app).await.expect("Server error");
}

/// Bind `SERVER_PORT` when set; otherwise take the first free port of the fallback range.
async fn bind_listener(config: &Config) -> io::Result<TcpListener> {
    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await;
    }

    for port in FALLBACK_PORTS {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => return Ok(listener),
            Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port busy");
            }
            Err(err) => return Err(err),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AddrNotAvailable,
        format!(
            "every port in {}-{} is in use",
            FALLBACK_PORTS.start(),
            FALLBACK_PORTS.end()
        ),
    ))
}

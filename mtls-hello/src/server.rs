use crate::config::{ServerFlavor, ServerOptions};
use crate::tls::server_tls_config;
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{
        header::{CONTENT_TYPE, HOST},
        Request,
    },
    response::IntoResponse,
    routing::any,
    Router,
};
use axum_server::tls_rustls::{from_tcp_rustls, RustlsConfig};
use axum_server::Handle;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Upper bound for reading a request body. Generous so that interactive
/// clients prompting for credentials are not cut off.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Upper bound for producing and writing the response once the body is in
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub flavor: ServerFlavor,
    pub read_timeout: Duration,
}

impl AppState {
    pub fn new(flavor: ServerFlavor) -> Self {
        Self {
            flavor,
            read_timeout: READ_TIMEOUT,
        }
    }
}

/// The reply for a request body; the body bytes are echoed verbatim
pub fn greeting(body: &[u8], flavor: ServerFlavor) -> Vec<u8> {
    [
        b"Hello, ".as_slice(),
        body,
        format!(" from {} Server!", flavor.label()).as_bytes(),
    ]
    .concat()
}

/// Builds the TLS config, binds `0.0.0.0:<port>` and serves until Ctrl-C
pub async fn run(opts: ServerOptions, flavor: ServerFlavor) -> Result<()> {
    let tls = server_tls_config(&opts)?;

    let listen_addr = SocketAddr::from(([0, 0, 0, 0], opts.port));
    let listener = TcpListener::bind(listen_addr)
        .context(format!("Failed to bind {}", listen_addr))?;

    tracing::info!(
        "Starting HTTPS server on host {} and port {}",
        opts.host,
        opts.port
    );

    let handle = Handle::new();
    tokio::spawn(shutdown_on_ctrl_c(handle.clone()));

    serve(listener, tls, flavor, handle).await
}

async fn shutdown_on_ctrl_c(handle: Handle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Received Ctrl-C, shutting down");
        handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
    }
}

/// Serves the greeting endpoint over TLS on an already bound listener
pub async fn serve(
    listener: TcpListener,
    tls: rustls::ServerConfig,
    flavor: ServerFlavor,
    handle: Handle,
) -> Result<()> {
    listener
        .set_nonblocking(true)
        .context("Failed to configure listener")?;
    let local_addr = listener.local_addr().context("Failed to read listener address")?;

    let app = create_app(AppState::new(flavor));
    let tls_config = RustlsConfig::from_config(Arc::new(tls));

    tracing::info!("{} Server listening on https://{}", flavor.label(), local_addr);

    from_tcp_rustls(listener, tls_config)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("Server error")?;

    Ok(())
}

/// Every path and method lands on the greeting handler
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", any(greet_handler))
        .fallback(greet_handler)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(READ_TIMEOUT + WRITE_TIMEOUT)),
        )
        .with_state(state)
}

async fn greet_handler(
    State(state): State<AppState>,
    remote: Option<ConnectInfo<SocketAddr>>,
    request: Request<Body>,
) -> impl IntoResponse {
    let (parts, body) = request.into_parts();

    let host = parts
        .headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| parts.uri.host())
        .unwrap_or_default();
    let forwarded_for = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let remote = remote
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    tracing::info!(
        "Received {} request for host {} from IP address {} and X-FORWARDED-FOR {}",
        parts.method,
        host,
        remote,
        forwarded_for
    );

    // A failed read still gets a reply, with the error in place of the body.
    let body = match tokio::time::timeout(state.read_timeout, hyper::body::to_bytes(body)).await {
        Ok(Ok(bytes)) => bytes.to_vec(),
        Ok(Err(e)) => format!("error reading request body: {}", e).into_bytes(),
        Err(_) => format!(
            "error reading request body: timed out after {:?}",
            state.read_timeout
        )
        .into_bytes(),
    };

    let response = greeting(&body, state.flavor);
    tracing::info!(
        "{} Server: Sent response {}",
        state.flavor.label(),
        String::from_utf8_lossy(&response)
    );
    ([(CONTENT_TYPE, "text/plain; charset=utf-8")], response)
}

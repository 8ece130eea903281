mod error;
mod form_verification;
mod playlist;
mod preferences;
mod routes;

use std::env;

use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{filter::Directive, EnvFilter};

use crate::{error::StartupError, playlist::PlaylistInfoHandler, preferences::Preferences};

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let prefs = Preferences::load_config(&Preferences::config_path())?;
    init_tracing(prefs.log_level())?;

    let handler = PlaylistInfoHandler::from_preferences(&prefs)?;
    info!("Forwarding playlist lookups to {}", handler.endpoint());
    if !prefs.preserve_upstream_status() {
        info!("Backend error statuses will be reported as 500");
    }

    let app = routes::app(handler);
    let addr = prefs.socket_addr()?;

    match prefs.tls_paths() {
        Some((cert, key)) => {
            let tls_config = RustlsConfig::from_pem_file(cert, key).await?;
            info!("Listening on https://{addr}");
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            let listener = TcpListener::bind(addr).await?;
            info!("Listening on http://{addr}");
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

fn init_tracing(default_level: &str) -> Result<(), StartupError> {
    let rust_log = env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(default_level, rust_log.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| StartupError::Logging(err.to_string()))
}

/// `RUST_LOG` replaces the configured level entirely; the `hyper`/`reqwest` caps only apply to
/// the configured default
fn log_filter(default_level: &str, rust_log: Option<&str>) -> Result<EnvFilter, StartupError> {
    let parse = |directive: &str| {
        directive
            .parse::<Directive>()
            .map_err(|err| StartupError::Logging(format!("{directive}: {err}")))
    };

    let builder = EnvFilter::builder().with_default_directive(parse(default_level)?);
    match rust_log.filter(|value| !value.trim().is_empty()) {
        Some(value) => Ok(builder.parse_lossy(value)),
        None => Ok(builder
            .parse_lossy("")
            .add_directive(parse("hyper=warn")?)
            .add_directive(parse("reqwest=warn")?)),
    }
}

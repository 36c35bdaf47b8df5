use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use http::{
    HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
};
use tokio::net::TcpListener;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};

use waav_relay::config::TlsConfig;
use waav_relay::{ServerConfig, routes, state::AppState};

/// Rates at or above this value disable the limiter (load testing).
const RATE_LIMIT_DISABLED_AT: u32 = 100_000;

/// WaaV Relay - Session-brokered realtime voice relay
#[derive(Parser, Debug)]
#[command(name = "waav-relay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must land in the environment before the config is read
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            ServerConfig::from_file(&path).map_err(|e| anyhow!(e.to_string()))?
        }
        None => ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?,
    };

    if !config.has_upstream_api_key() {
        warn!(
            "No upstream API key configured (UPSTREAM_API_KEY / OPENAI_API_KEY); \
             GET /session will fail until one is set"
        );
    }

    let socket_addr: SocketAddr = config
        .address()
        .parse()
        .with_context(|| format!("Invalid server address '{}'", config.address()))?;
    let tls = config.tls.clone();
    let cors = cors_layer(config.cors_allowed_origins.as_deref());
    let per_second = config.rate_limit_requests_per_second;
    let governor = if per_second < RATE_LIMIT_DISABLED_AT {
        let governor_config = GovernorConfigBuilder::default()
            .per_second(per_second as u64)
            .burst_size(config.rate_limit_burst_size)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow!("Failed to build rate limiter config"))?;
        Some(GovernorLayer::new(governor_config))
    } else {
        info!("Rate limiting disabled ({per_second}/s)");
        None
    };

    let app_state = AppState::new(config).await;

    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));

    let app = routes::create_app_router(app_state)
        .layer(cors)
        .layer(tower::util::option_layer(governor))
        .layer(security_headers);

    serve(app, socket_addr, tls).await
}

/// CORS policy for `GET /session` and the `/ws` upgrade.
fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    match origins {
        Some("*") => base.allow_origin(Any).allow_credentials(false),
        Some(list) => {
            let origins: Vec<HeaderValue> = list
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            base.allow_origin(origins).allow_credentials(true)
        }
        None => {
            info!("CORS_ALLOWED_ORIGINS not set, serving same-origin clients only");
            base.allow_credentials(false)
        }
    }
}

async fn serve(app: Router, addr: SocketAddr, tls: Option<TlsConfig>) -> anyhow::Result<()> {
    let service = app.into_make_service_with_connect_info::<SocketAddr>();

    match tls {
        Some(tls) => {
            let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                .await
                .with_context(|| {
                    format!(
                        "Failed to load TLS certificates from {} and {}",
                        tls.cert_path.display(),
                        tls.key_path.display()
                    )
                })?;

            info!("Relay listening on https://{addr} (TLS enabled)");
            axum_server::bind_rustls(addr, rustls_config)
                .serve(service)
                .await
                .context("TLS server error")?;
        }
        None => {
            info!("Relay listening on http://{addr}");
            let listener = TcpListener::bind(addr).await?;
            axum::serve(listener, service).await?;
        }
    }

    Ok(())
}

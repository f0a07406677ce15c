use std::future::ready;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{MatchedPath, Request};
use axum::http::Method;
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::get;
use clap::Parser;
use console::{style, Term};
use lnurld::auth::BasicAuth;
use lnurld::config::Config;
use lnurld::metrics::{api_metrics, init_prometheus_metrics};
use lnurld::observability::{init_logging, LoggingConfig};
use lnurld::router::build_router;
use lnurld::state::AppState;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Parser)]
#[clap(version, about = "LNURL handshakes for chat-bot wallets")]
struct Cli {
    /// Data directory path (contains config and logs)
    #[clap(long, env = "LNURLD_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Password (overrides config)
    #[clap(long, env = "LNURLD_PASSWORD")]
    password: Option<String>,

    /// Server address, ip:port (overrides config)
    #[clap(long, env = "LNURLD_ADDR")]
    addr: Option<String>,

    /// Wallet backend base URL (overrides config)
    #[clap(long, env = "LNURLD_WALLET_URL")]
    wallet_url: Option<String>,

    /// lnurl-auth key derivation secret (overrides config)
    #[clap(long, env = "LNURLD_SERVER_SECRET")]
    server_secret: Option<String>,

    /// Disable authentication
    #[clap(long)]
    no_auth: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli: Cli = Cli::parse();

    init_logging(LoggingConfig::from_env(cli.data_dir.join("logs")))?;
    info!("Starting lnurld");

    std::fs::create_dir_all(&cli.data_dir)?;
    let config_path = cli.data_dir.join("lnurld.conf");

    let term = Term::stdout();
    let (mut config, password_generated) = Config::load_or_create(&config_path)?;

    if password_generated {
        term.write_line(&format!(
            "{}{}",
            style("Generating default api password...").yellow(),
            style("done").white()
        ))?;
    }

    config.data_dir = Some(cli.data_dir.clone());
    if let Some(password) = cli.password {
        config.http_password = Some(password);
    }
    if let Some(addr) = cli.addr {
        match addr.split_once(':') {
            Some((ip, port)) => {
                config.http_bind_ip = ip.to_string();
                match port.parse::<u16>() {
                    Ok(port) => config.http_bind_port = port,
                    Err(_) => warn!(addr = %addr, "Ignoring invalid port in --addr"),
                }
            }
            None => config.http_bind_ip = addr,
        }
    }
    if let Some(wallet_url) = cli.wallet_url {
        config.wallet_url = wallet_url;
    }
    if let Some(server_secret) = cli.server_secret {
        config.server_secret = Some(server_secret);
    }
    if cli.no_auth {
        config.http_password = None;
    }

    let state = AppState::from_config(&config).await?;
    start_main_server(&config, state).await
}

async fn start_main_server(config: &Config, state: AppState) -> Result<()> {
    let basic_auth = Arc::new(BasicAuth::new(config.http_password.clone()));
    let auth_status = if basic_auth.is_enabled() {
        "enabled"
    } else {
        "disabled"
    };

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any)
        .allow_headers(Any);

    let metrics_handle = init_prometheus_metrics()?;

    let app = build_router(state, basic_auth)
        .route("/metrics", get(move || ready(metrics_handle.render())))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .route_layer(middleware::from_fn(track_metrics));

    let addr = config.http_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("lnurld listening on {addr} with authentication {auth_status}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn track_metrics(req: Request, next: Next) -> impl IntoResponse {
    let start = Instant::now();
    let path = if let Some(matched_path) = req.extensions().get::<MatchedPath>() {
        matched_path.as_str().to_owned()
    } else {
        req.uri().path().to_owned()
    };
    let method = req.method().clone();

    let response = next.run(req).await;

    api_metrics::record_api_request(
        method.as_str(),
        &path,
        response.status().as_u16(),
        start.elapsed(),
    );

    response
}

use clap::Parser;
use saver_core::config::{get_default_config_file, APP_NAME};
use saver_core::SaverConfig;
use saver_server::{run_server, AppState, OpenAiFactory};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "saver-server", about = "Web front end for continuing saved conversations")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "SAVER_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP server address
    #[arg(long, default_value = "127.0.0.1:5050")]
    addr: SocketAddr,

    /// Default model for requests that do not name one
    #[arg(short, long)]
    model: Option<String>,

    /// Extra browser origin allowed to call the API (repeatable)
    #[arg(long = "allow-origin", value_name = "ORIGIN")]
    allow_origins: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let path = match args.config {
        Some(path) => path,
        None => get_default_config_file(APP_NAME)?,
    };
    let mut config = match SaverConfig::load_layered(&path) {
        Ok(cfg) => {
            info!("Loaded configuration from {}", path.display());
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration from {}: {}", path.display(), e);
            return Err(anyhow::anyhow!("Configuration error: {}", e));
        }
    };
    if let Some(model) = args.model {
        config.model_name = Some(model);
    }
    if !args.allow_origins.is_empty() {
        config
            .allowed_origins
            .get_or_insert_with(Vec::new)
            .extend(args.allow_origins);
    }
    if config.api_key.is_none() {
        info!("No server API key configured; requests must supply their own");
    }

    let providers = Arc::new(OpenAiFactory::new(config.clone()));
    run_server(AppState::new(config, providers), args.addr).await
}

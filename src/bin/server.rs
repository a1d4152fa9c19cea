use clap::Parser;
use ferrokv::config::{
    config_aof_path_or_default, config_listen_or_default, config_log_level_or_default,
    config_port_or_default, set_global_config, Config,
};
use ferrokv::server;
use std::process::exit;
use tokio::net::TcpListener;
use tokio::{fs, signal};
use tracing_subscriber::EnvFilter;

#[tokio::main]
pub async fn main() -> ferrokv::Result<()> {
    let cli = Cli::parse();

    if let Some(config_file) = &cli.config {
        let content = fs::read_to_string(config_file)
            .await
            .unwrap_or_else(|e| panic!("failed to read config file {}: {}", config_file, e));
        match toml::from_str::<Config>(&content) {
            Ok(config) => set_global_config(config),
            Err(e) => {
                eprintln!("unable to load config file: {e}");
                exit(1);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config_log_level_or_default())),
        )
        .init();

    let listen_addr = cli.listen.unwrap_or_else(config_listen_or_default);
    let port = cli.port.unwrap_or_else(config_port_or_default);
    let aof_path = cli.aof_path.unwrap_or_else(config_aof_path_or_default);

    let listener = TcpListener::bind(&format!("{}:{}", listen_addr, port)).await?;

    server::run(listener, aof_path, shutdown_signal()).await;

    Ok(())
}

/// Resolves on SIGINT or SIGTERM, whichever arrives first.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[derive(Parser, Debug)]
#[clap(name = "ferrokv-server", version, author, about = "A Redis-compatible in-memory key/value server")]
struct Cli {
    #[clap(long = "listen")]
    listen: Option<String>,

    #[clap(long = "port")]
    port: Option<u16>,

    #[clap(long = "aof-path")]
    aof_path: Option<String>,

    #[clap(long = "config")]
    config: Option<String>,
}

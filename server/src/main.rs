use anyhow::Result;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};
use sri_server::{build_app, AppState};
use tokio::net::TcpListener;

#[derive(Parser)]
struct Args {
    /// Data directory holding the document store and both indices
    #[arg(long, default_value = "./data")]
    data: PathBuf,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8089)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let state = AppState::open(&args.data, std::env::var("ADMIN_TOKEN").ok())?;
    let app: Router = build_app(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, data = %args.data.display(), "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

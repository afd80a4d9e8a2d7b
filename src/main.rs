use std::net::SocketAddr;
use std::path::PathBuf;

use media_preview_backend::api::{self, AppState};
use media_preview_backend::services::{ThumbnailConfig, ThumbnailService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    // Load thumbnail configuration
    let config_path = std::env::var("THUMBNAIL_CONFIG").ok().map(PathBuf::from);
    let config = ThumbnailConfig::load(config_path).await?;

    // Initialize thumbnail service (detects ffmpeg / ffprobe once)
    let thumbnails = ThumbnailService::new(config)?;

    // Run the server - 从环境变量读取配置
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("🚀 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    api::serve(listener, AppState { thumbnails }, shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

use anyhow::Result;
use fiinder::map::MapServerConfig;
use fiinder::map::server::serve;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let addr = std::env::var("MAP_SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".to_string());

    let config = MapServerConfig::builder().bind_addr(addr).build();

    info!(address = %config.bind_addr, "Starting map server");
    serve(config).await?;
    Ok(())
}

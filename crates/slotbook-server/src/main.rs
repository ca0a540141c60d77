use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use slotbook_core::Config;

#[tokio::main]
async fn main() -> Result<()> {
    slotbook_core::init()?;

    let (config, _validation) = Config::load_validated()?;
    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .context("Invalid bind address")?;

    let service = Arc::new(slotbook_server::build_service(&config)?);

    tracing::info!("Slotbook listening on http://{}", addr);
    warp::serve(slotbook_server::routes(service))
        .run(addr)
        .await;

    Ok(())
}

use anyhow::Context;
use skiff::{Server, ServerConfig};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let server = Server::bind(ServerConfig::default()).context("failed to start server")?;

    server.run().context("event loop failed")?;

    Ok(())
}

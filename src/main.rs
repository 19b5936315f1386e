use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use opendash::broker::BrokerLink;
use opendash::bus::ChangeBus;
use opendash::config::BridgeConfig;
use opendash::gateway::{self, AppState};
use opendash::state::StateStore;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    // An explicit config path wins over the default search location.
    let config = match std::env::args().nth(1) {
        Some(path) => BridgeConfig::load(&PathBuf::from(path))?,
        None => BridgeConfig::load_or_default(),
    };
    info!(
        broker = %config.broker.host,
        port = config.broker.port,
        topics = config.broker.topics.len(),
        "starting opendash"
    );

    let store = Arc::new(StateStore::new());
    let bus = ChangeBus::new();
    let shutdown = CancellationToken::new();

    let (link, broker_worker) = BrokerLink::spawn(
        config.broker.clone(),
        Arc::clone(&store),
        bus.clone(),
        shutdown.clone(),
    );

    let state = AppState { store, bus, link };
    gateway::serve(state, &config.http).await?;

    // The HTTP server exits on ctrl-c; take the broker worker down with it.
    shutdown.cancel();
    broker_worker.await?;
    info!("opendash stopped");

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();
    Ok(())
}

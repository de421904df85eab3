use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use maestro::{Config, MasterLoop};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    info!(
        min_confidence = config.min_confidence_threshold,
        max_risk_per_trade = config.max_risk_per_trade,
        cycle_interval_secs = config.cycle_interval_secs,
        "configuration loaded"
    );

    let mut master = MasterLoop::new(config);
    master.run().await
}

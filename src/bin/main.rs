use std::time::Duration;

use swim_gossip::{
    api::{config::SwimConfig, swim::SwimCluster},
    error::Result,
};

use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info"))
        .with_span_events(FmtSpan::FULL)
        .with_level(true)
        .init();

    let seed = SwimCluster::try_new(0, "127.0.0.1:8080", SwimConfig::new()).await?;
    seed.run().await?;

    let mut nodes = vec![seed.clone()];
    for id in 1..3 {
        let config = SwimConfig::builder()
            .with_known_peers([seed.address()])
            .build();
        let node = SwimCluster::try_new(id, format!("127.0.0.1:808{id}"), config).await?;
        node.run().await?;
        nodes.push(node);
    }

    let mut report = tokio::time::interval(Duration::from_secs(5));
    loop {
        report.tick().await;
        for node in &nodes {
            let alive: Vec<_> = node.membership().alive().iter().map(|a| a.id).collect();
            tracing::info!("[{}] alive members: {:?}", node.id(), alive);
        }
    }
}

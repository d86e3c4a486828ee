use swim_gossip::{
    api::{config::SwimConfig, swim::SwimCluster},
    Event, Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Creates two nodes in the same cluster
    let node1 = SwimCluster::try_new(1, "127.0.0.1:8080", SwimConfig::new()).await?;
    let node2 = SwimCluster::try_new(
        2,
        "127.0.0.1:8081",
        SwimConfig::builder()
            .with_known_peers([node1.address()])
            .build(),
    )
    .await?;

    // Subscribe before running so no event is missed
    let mut rx1 = node1.subscribe();

    // Run the SWIM protocol in the background
    node1.run().await?;
    node2.run().await?;

    // Stop node2 after a while so node1 observes it failing
    let stopping = node2.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(8)).await;
        stopping.stop().await;
    });

    // Handle events accordingly
    while let Ok(event) = rx1.recv().await {
        match event {
            Event::NodeJoined(e) => tracing::info!("[{}] handle {:#?}", node1.id(), e),
            Event::NodeSuspected(e) => {
                // Without a third node there is no indirect prober, so the
                // suspicion is final for this pair.
                tracing::info!("[{}] handle {:#?}", node1.id(), e);
                break;
            }
            Event::NodeRecovered(e) => tracing::info!("[{}] handle {:#?}", node1.id(), e),
            Event::NodeDeceased(e) => tracing::info!("[{}] handle {:#?}", node1.id(), e),
        }
    }

    Ok(())
}

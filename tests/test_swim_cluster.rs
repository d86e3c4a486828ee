use std::time::Duration;

use swim_gossip::{
    api::{config::SwimConfig, swim::SwimCluster},
    pb::{NodeAddress, NodeId, PeerState},
    Event,
};

macro_rules! assert_event {
    ($event:path, $rx:expr, $ms:expr, $assertion:expr) => {
        let result = tokio::time::timeout(Duration::from_millis($ms), async {
            loop {
                match $rx.recv().await {
                    Ok(outer_event) => {
                        if let $event(inner_event) = outer_event {
                            if $assertion(inner_event) {
                                break;
                            }
                        }
                    }
                    Err(_) => panic!(),
                }
            }
        })
        .await;

        if result.is_err() {
            panic!()
        }
    };
}

async fn create_single_node(id: NodeId, ms: u64, known_peers: &[NodeAddress]) -> SwimCluster {
    let duration = Duration::from_millis(ms);
    let config = SwimConfig::builder()
        .with_ping_initial_delay(duration)
        .with_ping_interval(duration)
        .with_ping_timeout(duration)
        .with_dead_timeout(duration * 10)
        .with_known_peers(known_peers.to_vec())
        .build();
    SwimCluster::try_new(id, "127.0.0.1:0", config).await.unwrap()
}

async fn wait_until(ms: u64, condition: impl Fn() -> bool) {
    let result = tokio::time::timeout(Duration::from_millis(ms), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    if result.is_err() {
        panic!()
    }
}

#[tokio::test]
async fn test_swim_cluster_join_events() {
    let node1 = create_single_node(1, 10, &[]).await;
    let node2 = create_single_node(2, 10, &[node1.address()]).await;
    let node3 = create_single_node(3, 10, &[node1.address()]).await;

    let mut rx1 = node1.subscribe();
    let mut rx3 = node3.subscribe();

    node1.run().await.unwrap();
    node2.run().await.unwrap();
    node3.run().await.unwrap();

    assert_event!(Event::NodeJoined, rx1, 1000, |e: swim_gossip::NodeJoined| e.new_member == 2);
    assert_event!(Event::NodeJoined, rx3, 1000, |e: swim_gossip::NodeJoined| e.new_member == 2);

    for node in [&node1, &node2, &node3] {
        wait_until(1000, || node.membership().alive().len() == 3).await;
    }

    for node in [node1, node2, node3] {
        node.stop().await;
    }
}

#[tokio::test]
async fn test_swim_cluster_node_deceased_events() {
    let node1 = create_single_node(1, 10, &[]).await;
    let node2 = create_single_node(2, 10, &[node1.address()]).await;
    let node3 = create_single_node(3, 10, &[node1.address()]).await;

    node1.run().await.unwrap();
    node2.run().await.unwrap();
    node3.run().await.unwrap();

    for node in [&node1, &node2, &node3] {
        wait_until(1000, || node.membership().alive().len() == 3).await;
    }

    let mut rx1 = node1.subscribe();
    let mut rx2 = node2.subscribe();

    tracing::info!("[{}] is shutting down...", node3.id());
    node3.stop().await;

    assert_event!(Event::NodeSuspected, rx1, 1000, |e: swim_gossip::NodeSuspected| e.suspect == 3);
    assert_event!(Event::NodeSuspected, rx2, 1000, |e: swim_gossip::NodeSuspected| e.suspect == 3);
    assert_event!(Event::NodeDeceased, rx1, 2000, |e: swim_gossip::NodeDeceased| e.deceased == 3);
    assert_event!(Event::NodeDeceased, rx2, 2000, |e: swim_gossip::NodeDeceased| e.deceased == 3);

    assert_eq!(node1.membership().state_of(3), Some(PeerState::Dead));
    assert_eq!(node1.membership().dead().len(), 1);

    let alive = node1
        .nat_liveness(vec![node2.address(), NodeAddress::new(3, node3.addr())])
        .await
        .unwrap();
    assert_eq!(alive, vec![node2.address()]);

    node1.stop().await;
    node2.stop().await;
}

#[tokio::test]
async fn test_swim_cluster_address_change_is_gossiped() {
    let node1 = create_single_node(1, 10, &[]).await;
    let node2 = create_single_node(2, 10, &[node1.address()]).await;

    node1.run().await.unwrap();
    node2.run().await.unwrap();
    wait_until(1000, || node1.membership().alive().len() == 2).await;

    let relayed = node2.address().with_parents([node1.address()]);
    node2.update_self_address(relayed.clone()).unwrap();

    wait_until(1000, || {
        node1
            .membership()
            .get(2)
            .and_then(|s| s.address)
            .is_some_and(|a| a == relayed)
    })
    .await;

    node1.stop().await;
    node2.stop().await;
}

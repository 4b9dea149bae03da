//! Session grants, wait queue, FIFO promotion.

use super::harness::{ControlSim, MockBroker, SimClient};
use crate::gatekeeper::SessionGate;
use gantry_protocol::ControlCommand;

#[tokio::test]
async fn first_connect_is_granted_with_token() {
    let broker = MockBroker::new();
    let gate = SessionGate::new();
    let sim = ControlSim::new();

    let client = SimClient::new("a");
    let corr = client.send_control(&broker, ControlCommand::Connect);
    sim.drain(&broker, &gate).await;

    let reply = client.correlated_reply(&broker, &corr).unwrap();
    assert_eq!(reply.body, "Connected");
    assert!(reply.token.is_some());
    assert_eq!(gate.active_identity().await.as_deref(), Some(client.identity.as_str()));
}

#[tokio::test]
async fn contender_is_queued_without_a_grant() {
    let broker = MockBroker::new();
    let gate = SessionGate::new();
    let sim = ControlSim::new();

    let a = SimClient::new("a");
    let b = SimClient::new("b");

    a.send_control(&broker, ControlCommand::Connect);
    let corr_b = b.send_control(&broker, ControlCommand::Connect);
    sim.drain(&broker, &gate).await;

    let reply = b.correlated_reply(&broker, &corr_b).unwrap();
    assert_eq!(reply.body, "Queued");
    assert!(reply.token.is_none());
    assert!(b.grant(&broker).is_none());
    assert_eq!(gate.active_identity().await.as_deref(), Some(a.identity.as_str()));
}

#[tokio::test]
async fn reconnect_is_idempotent() {
    let broker = MockBroker::new();
    let gate = SessionGate::new();
    let sim = ControlSim::new();

    let a = SimClient::new("a");
    let b = SimClient::new("b");

    a.send_control(&broker, ControlCommand::Connect);
    b.send_control(&broker, ControlCommand::Connect);
    let corr = a.send_control(&broker, ControlCommand::Connect);
    sim.drain(&broker, &gate).await;

    let reply = a.correlated_reply(&broker, &corr).unwrap();
    assert_eq!(reply.body, "Already Connected");

    // The queue is untouched: releasing still promotes b exactly once
    let corr_release = a.send_control(&broker, ControlCommand::Release);
    sim.drain(&broker, &gate).await;

    assert_eq!(
        a.correlated_reply(&broker, &corr_release).unwrap().body,
        "Released"
    );
    assert_eq!(gate.active_identity().await.as_deref(), Some(b.identity.as_str()));
}

#[tokio::test]
async fn release_promotes_waiters_in_fifo_order() {
    let broker = MockBroker::new();
    let gate = SessionGate::new();
    let sim = ControlSim::new();

    let mut a = SimClient::new("a");
    let mut b = SimClient::new("b");
    let c = SimClient::new("c");

    let corr_a = a.send_control(&broker, ControlCommand::Connect);
    b.send_control(&broker, ControlCommand::Connect);
    c.send_control(&broker, ControlCommand::Connect);
    sim.drain(&broker, &gate).await;

    let granted = a.correlated_reply(&broker, &corr_a).unwrap();
    a.adopt_token(&granted);

    // A releases: B is promoted, C still waits
    a.send_control(&broker, ControlCommand::Release);
    sim.drain(&broker, &gate).await;

    let grant_b = b.grant(&broker).expect("b must receive an unsolicited grant");
    assert!(grant_b.token.is_some());
    b.adopt_token(&grant_b);
    assert!(c.grant(&broker).is_none());
    assert_eq!(gate.active_identity().await.as_deref(), Some(b.identity.as_str()));

    // B releases: C is promoted
    b.send_control(&broker, ControlCommand::Release);
    sim.drain(&broker, &gate).await;

    assert!(c.grant(&broker).is_some());
    assert_eq!(gate.active_identity().await.as_deref(), Some(c.identity.as_str()));
}

#[tokio::test]
async fn release_from_unconnected_client_is_silently_ignored() {
    let broker = MockBroker::new();
    let gate = SessionGate::new();
    let sim = ControlSim::new();

    let a = SimClient::new("a");
    let z = SimClient::new("z");

    a.send_control(&broker, ControlCommand::Connect);
    z.send_control(&broker, ControlCommand::Release);
    sim.drain(&broker, &gate).await;

    // No reply surfaced to the stranger, session untouched, entry still acked
    assert!(broker.replies(&z.identity).is_empty());
    assert_eq!(gate.active_identity().await.as_deref(), Some(a.identity.as_str()));
    assert_eq!(broker.pending_count(), 0);
}

#[tokio::test]
async fn release_with_empty_queue_leaves_no_session() {
    let broker = MockBroker::new();
    let gate = SessionGate::new();
    let sim = ControlSim::new();

    let a = SimClient::new("a");
    a.send_control(&broker, ControlCommand::Connect);
    let corr = a.send_control(&broker, ControlCommand::Release);
    sim.drain(&broker, &gate).await;

    assert_eq!(a.correlated_reply(&broker, &corr).unwrap().body, "Released");
    assert!(gate.active_identity().await.is_none());
}

#[tokio::test]
async fn at_most_one_grant_exists_at_any_point() {
    let broker = MockBroker::new();
    let gate = SessionGate::new();
    let sim = ControlSim::new();

    let clients: Vec<SimClient> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|name| SimClient::new(name))
        .collect();

    for client in &clients {
        client.send_control(&broker, ControlCommand::Connect);
    }

    // After every single step exactly one identity is active: the first
    // connect grants, every later one parks
    let mut steps = 0;
    while sim.process_one(&broker, &gate).await {
        steps += 1;
        assert_eq!(
            gate.active_identity().await.as_deref(),
            Some(clients[0].identity.as_str())
        );
    }
    assert_eq!(steps, clients.len());

    // Exactly one Connected was delivered across all clients
    let connected_count = clients
        .iter()
        .flat_map(|c| broker.replies(&c.identity))
        .filter(|reply| reply.body == "Connected")
        .count();
    assert_eq!(connected_count, 1);
}

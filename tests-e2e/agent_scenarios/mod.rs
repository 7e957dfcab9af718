#[path = "../support.rs"]
mod support;

use std::sync::Arc;

use fleet_agent::identity::FixedIdentity;
use fleet_agent::types::{GroupConfig, ProvisioningTemplate};
use fleet_agent::Agent;

use support::{fast_agent_config, loopback, settle, FakeCloud};

fn group_config(match_tags: &[&str], desired_size: u32, name_base: &str, floating_address: Option<&str>) -> GroupConfig {
    GroupConfig {
        match_tags: match_tags.iter().map(|t| t.to_string()).collect(),
        desired_size,
        floating_address: floating_address.map(|a| a.to_string()),
        provisioning_template: ProvisioningTemplate {
            name_base: name_base.to_string(),
            region: "nyc1".to_string(),
            size: "s-1vcpu-1gb".to_string(),
            image: "ubuntu-22-04".to_string(),
            ssh_keys: vec![],
            backups: false,
            ipv6: false,
            private_networking: false,
            user_data: None,
            monitoring: false,
            volumes: vec![],
            tags: match_tags.iter().map(|t| t.to_string()).chain(std::iter::once("fleet".to_string())).collect(),
        },
    }
}

/// §8 scenario 1: cold start, empty fleet. The one agent in existence is
/// itself the only instance the Cloud Adapter knows about; after bootstrap
/// it is the fleet's sole member, wins its own election uncontested, and
/// the bootstrap rebalance brings an empty group up to its desired size.
#[tokio::test]
async fn cold_start_lone_agent_converges_group_to_desired_size() {
    let port = 31101;
    let cloud = Arc::new(FakeCloud::default());
    cloud.seed("solo", &["fleet"], loopback(port));

    let identity = FixedIdentity("solo".to_string());
    let agent = Agent::bootstrap(fast_agent_config("fleet", port), cloud.clone(), &identity).await.unwrap();
    agent.register_group(group_config(&["ENV:T"], 2, "web", None)).await;

    let handle = tokio::spawn(agent.run());
    settle(400).await;

    assert_eq!(cloud.created_count(), 2, "bootstrap rebalance must create exactly the deficit");

    handle.abort();
}

/// §8 scenario 3: the leader dies. The survivor observes the leader's
/// removal while it is not yet leader and buffers it (§4.5); once no
/// alive leader remains it wins its own election and drains the buffer,
/// destroying the departed leader and creating exactly one replacement.
#[tokio::test]
async fn leader_death_is_buffered_then_drained_by_the_new_leader() {
    let leader_port = 31201;
    let survivor_port = 31202;
    let cloud = Arc::new(FakeCloud::default());
    // Lexicographically lowest id wins the initial election (§4.2 tie-break).
    cloud.seed("aaa-leader", &["ENV:T", "fleet"], loopback(leader_port));
    cloud.seed("zzz-survivor", &["ENV:T", "fleet"], loopback(survivor_port));

    let leader_identity = FixedIdentity("aaa-leader".to_string());
    let survivor_identity = FixedIdentity("zzz-survivor".to_string());

    let leader_config = fast_agent_config("fleet", leader_port);
    let survivor_config = fast_agent_config("fleet", survivor_port);

    let leader_agent = Agent::bootstrap(leader_config, cloud.clone(), &leader_identity).await.unwrap();
    let survivor_agent = Agent::bootstrap(survivor_config, cloud.clone(), &survivor_identity).await.unwrap();

    leader_agent.register_group(group_config(&["ENV:T"], 2, "web", None)).await;
    survivor_agent.register_group(group_config(&["ENV:T"], 2, "web", None)).await;

    let leader_handle = tokio::spawn(leader_agent.run());
    let survivor_handle = tokio::spawn(survivor_agent.run());

    // Let the fleet settle on "aaa-leader" as leader; group is already at
    // its desired size of 2, so no creates happen yet.
    settle(600).await;
    assert_eq!(cloud.created_count(), 0);

    // Simulate the leader's process dying outright: abort its task, which
    // drops its `GossipEngine` and closes its socket, so it simply stops
    // sending heartbeats — exactly the failure mode §4.1/§4.2 describe.
    leader_handle.abort();

    // Past the liveness timeout, the survivor sees `removed(leader, role:
    // leader)`, buffers it, then — once no alive leader remains — elects
    // itself and drains the buffer.
    settle(1200).await;

    assert_eq!(cloud.destroyed_count_for("aaa-leader"), 1, "exactly one destroy for the departed leader");
    assert_eq!(cloud.created_count(), 1, "exactly one replacement created to restore desired size");

    survivor_handle.abort();
}

/// §8 scenario 5: floating address failover. Two members of a group
/// declaring a `floatingAddress` each run their own sub-election; the
/// lower-id member wins it and is the one to receive the assignment call.
#[tokio::test]
async fn floating_address_is_assigned_to_the_sub_election_winner() {
    let port_a = 31401;
    let port_b = 31420;
    let cloud = Arc::new(FakeCloud::default());
    cloud.seed("aaa-member", &["ENV:T", "fleet"], loopback(port_a));
    cloud.seed("zzz-member", &["ENV:T", "fleet"], loopback(port_b));

    let identity_a = FixedIdentity("aaa-member".to_string());
    let identity_b = FixedIdentity("zzz-member".to_string());

    let config_a = fast_agent_config("fleet", port_a);
    let config_b = fast_agent_config("fleet", port_b);

    let agent_a = Agent::bootstrap(config_a, cloud.clone(), &identity_a).await.unwrap();
    let agent_b = Agent::bootstrap(config_b, cloud.clone(), &identity_b).await.unwrap();

    let address = "203.0.113.5";
    agent_a.register_group(group_config(&["ENV:T"], 2, "web", Some(address))).await;
    agent_b.register_group(group_config(&["ENV:T"], 2, "web", Some(address))).await;

    let handle_a = tokio::spawn(agent_a.run());
    let handle_b = tokio::spawn(agent_b.run());

    // The sub-election's own backoff is bounded by its heartbeat interval
    // (§4.6's fixed 3000 ms), not the fleet engine's faster test interval —
    // wait past the worst case.
    settle(3800).await;

    let assignments = cloud.floating_assignments.lock().unwrap().clone();
    assert_eq!(assignments.len(), 1, "exactly one assignment call, to the sub-election's winner");
    assert_eq!(assignments[0], (address.to_string(), "aaa-member".to_string()));

    handle_a.abort();
    handle_b.abort();
}

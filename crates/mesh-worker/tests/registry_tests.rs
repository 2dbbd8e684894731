// SPDX-License-Identifier: MIT OR Apache-2.0
//! Roster lifecycle: ordered startup, discovery, reverse teardown.

use mesh_client::AgentClient;
use mesh_worker::{SpecialistRegistry, SpecialistRole, WorkerConfig};
use std::time::Duration;

fn registry(dir: &tempfile::TempDir) -> SpecialistRegistry {
    SpecialistRegistry::new(WorkerConfig::new(dir.path()))
}

#[tokio::test]
async fn spawn_all_binds_sequential_ports_in_roster_order() {
    let dir = tempfile::tempdir().unwrap();
    let base_port = 41240;
    let roster = match registry(&dir).spawn_all(base_port).await {
        Ok(roster) => roster,
        // Another process owns the range; nothing to verify here.
        Err(_) => return,
    };

    let agents = roster.agents();
    assert_eq!(agents.len(), 4);
    for (i, (role, addr)) in agents.iter().enumerate() {
        assert_eq!(*role, SpecialistRole::ROSTER[i]);
        assert_eq!(addr.port(), base_port + i as u16);
    }

    // Each endpoint serves its own card.
    for (role, addr) in &agents {
        let client = AgentClient::new(format!("http://{addr}"))
            .with_timeout(Duration::from_secs(2));
        let card = client.discover_agent().await.unwrap();
        assert_eq!(card.name, role.as_str());
    }

    roster.stop_all().await.unwrap();

    // The ports are free again after teardown.
    for (_, addr) in &agents {
        let freed = tokio::net::TcpListener::bind(addr).await;
        assert!(freed.is_ok(), "port {} still bound", addr.port());
    }
}

#[tokio::test]
async fn spawn_all_unwinds_started_agents_when_a_port_is_taken() {
    let dir = tempfile::tempdir().unwrap();
    let base_port = 41360;

    // Occupy the third roster port so startup fails mid-way.
    let blocker =
        match tokio::net::TcpListener::bind(("127.0.0.1", base_port + 2)).await {
            Ok(listener) => listener,
            Err(_) => return,
        };

    let err = registry(&dir)
        .spawn_all(base_port)
        .await
        .expect_err("startup must fail on the occupied port");
    assert!(err.to_string().contains("planning"), "first error names the role: {err}");

    // The research and schema agents were stopped during the unwind.
    for offset in [0u16, 1] {
        let freed = tokio::net::TcpListener::bind(("127.0.0.1", base_port + offset)).await;
        assert!(freed.is_ok(), "port {} leaked", base_port + offset);
    }
    drop(blocker);
}

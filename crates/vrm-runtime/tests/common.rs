#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::net::Ipv4Addr;
use std::sync::Arc;
use vrm_config::ManagerConfig;
use vrm_core::{Result, VmManager};
use vrm_metrics::ManagerMetrics;
use vrm_proto::{access, Answer, AnswerPayload, CommandBody};
use vrm_runtime::{Repositories, RouterContext, RouterManager};
use vrm_shared::{
    Host, HostStatus, IpState, ManagementServer, Network, NetworkService, Nic, PublicIp,
    RedundantState, Router, RouterId, TrafficType, VmState, Zone,
};
use vrm_store::{
    MemoryClusterLock, MemoryStore, RecordingAlertSink, ScriptedTransport,
    SimulatedNetworkOrchestrator, SimulatedVmManager,
};

/// Simulated VM manager remembering which routers it started and stopped
pub struct RecordingVms {
    inner: SimulatedVmManager,
    pub started: Mutex<Vec<RouterId>>,
    pub stopped: Mutex<Vec<RouterId>>,
}

#[async_trait]
impl VmManager for RecordingVms {
    async fn advance_start(&self, router_id: RouterId) -> Result<()> {
        self.started.lock().push(router_id);
        self.inner.advance_start(router_id).await
    }

    async fn advance_stop(&self, router_id: RouterId, forced: bool) -> Result<()> {
        self.stopped.lock().push(router_id);
        self.inner.advance_stop(router_id, forced).await
    }
}

pub struct Env {
    pub store: Arc<MemoryStore>,
    pub transport: Arc<ScriptedTransport>,
    pub alerts: Arc<RecordingAlertSink>,
    pub vms: Arc<RecordingVms>,
    pub manager: RouterManager,
}

pub fn env() -> Env {
    vrm_logging::init_test();
    let store = Arc::new(MemoryStore::new());
    seed(&store);
    let transport = Arc::new(ScriptedTransport::new());
    let alerts = Arc::new(RecordingAlertSink::new());
    let vms = Arc::new(RecordingVms {
        inner: SimulatedVmManager::new(store.clone()),
        started: Mutex::new(Vec::new()),
        stopped: Mutex::new(Vec::new()),
    });
    let ctx = RouterContext::new(
        Repositories::from_store(store.clone()),
        transport.clone(),
        alerts.clone(),
        ManagerConfig::default(),
        ManagerMetrics::new().unwrap(),
    );
    let manager = RouterManager::new(
        ctx,
        vms.clone(),
        Arc::new(SimulatedNetworkOrchestrator::new()),
        Arc::new(MemoryClusterLock::new()),
    );
    Env {
        store,
        transport,
        alerts,
        vms,
        manager,
    }
}

fn seed(store: &MemoryStore) {
    store.insert_management_server(ManagementServer {
        id: 1,
        ..Default::default()
    });
    for id in [1, 2] {
        store.insert_host(Host {
            id,
            name: format!("kvm-{}", id),
            status: HostStatus::Up,
            management_server_id: Some(1),
        });
    }
    store.insert_zone(Zone {
        id: 1,
        name: "zone-1".to_string(),
        dns1: Some(Ipv4Addr::new(8, 8, 8, 8)),
        ..Default::default()
    });
    store.insert_network(Network {
        id: 204,
        name: "guest-204".to_string(),
        zone_id: 1,
        account_id: 2,
        cidr: Some("10.1.1.0/24".to_string()),
        gateway: Some(Ipv4Addr::new(10, 1, 1, 1)),
        is_redundant: true,
        egress_default_allow: true,
        services: [
            NetworkService::Firewall,
            NetworkService::SourceNat,
            NetworkService::PortForwarding,
            NetworkService::Dhcp,
        ]
        .into_iter()
        .collect(),
        ..Default::default()
    });
    store.insert_public_ip(PublicIp {
        id: 7,
        address: Ipv4Addr::new(192, 168, 10, 5),
        account_id: 2,
        network_id: Some(204),
        vlan_tag: "vlan://100".to_string(),
        vlan_db_id: 0,
        vlan_gateway: Ipv4Addr::new(192, 168, 10, 1),
        vlan_netmask: Ipv4Addr::new(255, 255, 255, 0),
        mac: Some("06:00:0a:00:00:01".to_string()),
        is_source_nat: true,
        is_one_to_one_nat: false,
        vm_ip: None,
        state: IpState::Allocated,
    });
}

/// Redundant router of network 204 in the given state
pub fn redundant_router(
    env: &Env,
    id: RouterId,
    host_id: u64,
    priority: u32,
    state: RedundantState,
) -> Router {
    let mut router = Router::new(id, format!("r-{}-VM", id), 1);
    router.state = VmState::Running;
    router.host_id = Some(host_id);
    router.private_ip = Some(Ipv4Addr::new(169, 254, 3, id as u8));
    router.public_ip = Some(Ipv4Addr::new(192, 168, 10, 5));
    router.public_mac = Some("06:00:0a:00:00:01".to_string());
    router.template_version = Some("Cloudstack Release 4.2.1".to_string());
    router.account_id = 2;
    router.is_redundant = true;
    router.priority = priority;
    router.redundant_state = state;
    env.store.insert_router(router.clone());
    env.store.insert_nic(Nic {
        id: 1000 + id,
        vm_id: id,
        network_id: 204,
        traffic_type: TrafficType::Guest,
        ip4: Some(Ipv4Addr::new(10, 1, 1, 200 + id as u8)),
        mac: Some(format!("02:00:00:00:00:{:02x}", id)),
        ..Default::default()
    });
    router
}

/// Agents report the given keepalived states; every other command succeeds
pub fn report_states(env: &Env, states: &[(RouterId, RedundantState)]) {
    let states: Vec<(String, RedundantState)> = states
        .iter()
        .map(|(id, state)| (format!("r-{}-VM", id), *state))
        .collect();
    env.transport.set_responder(move |_, cmd| match cmd.body {
        CommandBody::CheckRouter => {
            let name = cmd.access.get(access::ROUTER_NAME).unwrap_or_default();
            match states.iter().find(|(router, _)| router == name) {
                Some((_, state)) => Answer::success().with_payload(AnswerPayload::CheckRouter {
                    state: *state,
                    is_bumped: false,
                }),
                None => Answer::failure("unknown router"),
            }
        }
        _ => Answer::success(),
    });
}

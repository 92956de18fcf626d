//! Shared fixtures for the unit tests of this crate.

use crate::applicator::RuleApplicator;
use crate::context::{Repositories, RouterContext};
use crate::dispatcher::Dispatcher;
use std::net::Ipv4Addr;
use std::sync::Arc;
use vrm_config::ManagerConfig;
use vrm_metrics::ManagerMetrics;
use vrm_proto::{access, Answer, AnswerPayload, CommandBody};
use vrm_shared::{
    Host, HostId, HostStatus, IpState, ManagementServer, Network, NetworkService, Nic,
    PublicIp, RedundantState, Router, RouterId, TrafficType, VmState, Zone,
};
pub use vrm_store::{MemoryStore, RecordingAlertSink, ScriptedTransport};

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub transport: Arc<ScriptedTransport>,
    pub alerts: Arc<RecordingAlertSink>,
    pub ctx: RouterContext,
    pub dispatcher: Dispatcher,
    pub applicator: RuleApplicator,
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
            NetworkService::StaticNat,
            NetworkService::PortForwarding,
            NetworkService::Lb,
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

pub fn context_with(transport: Arc<ScriptedTransport>) -> (RouterContext, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    seed(&store);
    let ctx = RouterContext::new(
        Repositories::from_store(store.clone()),
        transport,
        Arc::new(RecordingAlertSink::new()),
        ManagerConfig::default(),
        ManagerMetrics::new().unwrap(),
    );
    (ctx, store)
}

pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    seed(&store);
    let transport = Arc::new(ScriptedTransport::new());
    let alerts = Arc::new(RecordingAlertSink::new());
    let ctx = RouterContext::new(
        Repositories::from_store(store.clone()),
        transport.clone(),
        alerts.clone(),
        ManagerConfig::default(),
        ManagerMetrics::new().unwrap(),
    );
    let dispatcher = Dispatcher::new(ctx.clone());
    let applicator = RuleApplicator::new(ctx.clone(), dispatcher.clone());
    Harness {
        store,
        transport,
        alerts,
        ctx,
        dispatcher,
        applicator,
    }
}

/// Insert a Running router with a guest nic in network 204
pub fn running_router(h: &Harness, id: RouterId, host_id: HostId) -> Router {
    let mut router = Router::new(id, format!("r-{}-VM", id), 1);
    router.state = VmState::Running;
    router.host_id = Some(host_id);
    router.private_ip = Some(Ipv4Addr::new(169, 254, 3, id as u8));
    router.public_ip = Some(Ipv4Addr::new(192, 168, 10, 5));
    router.public_mac = Some("06:00:0a:00:00:01".to_string());
    router.template_version = Some("Cloudstack Release 4.2.1".to_string());
    router.account_id = 2;
    h.store.insert_router(router.clone());
    h.store.insert_nic(Nic {
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

/// Master (id 4, host 1, priority 100) and backup (id 5, host 2, priority 99) of network 204
pub fn redundant_pair(h: &Harness) -> (Router, Router) {
    let mut master = running_router(h, 4, 1);
    master.is_redundant = true;
    master.priority = 100;
    master.redundant_state = RedundantState::Master;
    h.store.insert_router(master.clone());

    let mut backup = running_router(h, 5, 2);
    backup.is_redundant = true;
    backup.priority = 99;
    backup.redundant_state = RedundantState::Backup;
    h.store.insert_router(backup.clone());
    (master, backup)
}

/// Answer CheckRouter with the given state per router, success for everything else
pub fn check_router_responder(h: &Harness, states: &[(RouterId, RedundantState)]) {
    let states: Vec<(String, RedundantState)> = states
        .iter()
        .map(|(id, state)| (format!("r-{}-VM", id), *state))
        .collect();
    h.transport.set_responder(move |_, cmd| {
        if cmd.body != CommandBody::CheckRouter {
            return Answer::success();
        }
        let name = cmd.access.get(access::ROUTER_NAME).unwrap_or_default();
        match states.iter().find(|(router, _)| router == name) {
            Some((_, state)) => Answer::success().with_payload(AnswerPayload::CheckRouter {
                state: *state,
                is_bumped: false,
            }),
            None => Answer::failure("unknown router"),
        }
    });
}

//! Command Batch Builder.
//!
//! Pure functions turning rules, addresses and service settings into agent
//! commands. Nothing here talks to an agent: every `add_*` function validates
//! its whole input first and only then appends to the caller's [`Commands`],
//! so a failed build never leaves a half-filled batch behind.
//!
//! [`Commands`]: vrm_proto::Commands

pub mod addressing;
pub mod aggregation;
pub mod error;
pub mod ip_assoc;
pub mod rules;
pub mod services;
pub mod start;

pub use addressing::RouterAddressing;
pub use aggregation::{aggregation_command, cleanup_commands};
pub use error::BuildError;
pub use ip_assoc::{add_ip_assoc, ips_to_apply, order_ip_assoc};
pub use rules::{
    add_firewall_rules, add_load_balancer_config, add_port_forwarding_rules, add_static_nat_rules,
    add_static_nats, static_nats_of,
};
pub use services::{
    add_create_ip_alias, add_delete_ip_alias, add_dhcp_entry, add_remote_access_vpn,
    add_vm_data, add_vpn_users, partition_vpn_users,
};
pub use start::{build_start_sequence, GuestVmEntry, NetworkSnapshot, StartSequence};

/// Command name under which the start batch carries its version probe
pub const VERSION_COMMAND_NAME: &str = "getDomRVersion";

use crate::addressing::RouterAddressing;
use crate::error::BuildError;
use vrm_proto::{AggregationAction, Command, CommandBody, Commands, OnError};

/// Bracket marker for one guest network of a starting router
pub fn aggregation_command(
    addr: &RouterAddressing,
    action: AggregationAction,
) -> Result<Command, BuildError> {
    let details = addr.access_details()?;
    Ok(Command::new(CommandBody::AggregationControl {
        action,
        router_name: addr.router_name.clone(),
        router_ip: addr.control_ip()?,
        guest_ip: addr.guest_ip,
    })
    .with_access(details))
}

/// Cleanup markers for brackets that will never be finished
pub fn cleanup_commands(bracketed: &[RouterAddressing]) -> Result<Commands, BuildError> {
    let mut cmds = Commands::new(OnError::Continue);
    for addr in bracketed {
        cmds.push(aggregation_command(addr, AggregationAction::Cleanup)?);
    }
    Ok(cmds)
}

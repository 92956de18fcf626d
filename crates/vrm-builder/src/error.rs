use thiserror::Error;
use vrm_core::VrmError;

/// Reasons a batch cannot be built; raised before anything is dispatched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("router {router} has no control interface")]
    MissingControlInterface { router: String },

    #[error("router {router} has no interface in the guest network")]
    MissingGuestInterface { router: String },

    #[error("rule {rule_id} references unknown public ip {ip_id}")]
    UnknownSourceIp { rule_id: u64, ip_id: u64 },

    #[error("nic {nic_id} of vm {vm} lacks an address or mac")]
    IncompleteNic { nic_id: u64, vm: String },
}

impl From<BuildError> for VrmError {
    fn from(err: BuildError) -> Self {
        VrmError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_error_is_config_error() {
        let err: VrmError = BuildError::MissingControlInterface {
            router: "r-3-VM".to_string(),
        }
        .into();
        assert_eq!(err.kind(), "config");
        assert!(err.to_string().contains("r-3-VM"));
    }
}

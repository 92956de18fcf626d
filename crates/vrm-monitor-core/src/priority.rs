use thiserror::Error;
use vrm_core::VrmError;
use vrm_shared::{
    NetworkId, Router, RouterId, DEFAULT_DELTA, DEFAULT_PRIORITY, MAX_ALLOCATABLE_PRIORITY,
    MIN_ALLOCATABLE_PRIORITY,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriorityError {
    #[error("router {router} is not a redundant router")]
    NotRedundant { router: String },

    #[error("highest priority {max} in network {network_id} is below {}, too many failovers", MIN_ALLOCATABLE_PRIORITY)]
    TooLow { network_id: NetworkId, max: u32 },

    #[error("highest priority {max} in network {network_id} is above {}, too many failovers", MAX_ALLOCATABLE_PRIORITY)]
    TooHigh { network_id: NetworkId, max: u32 },
}

impl From<PriorityError> for VrmError {
    fn from(err: PriorityError) -> Self {
        match err {
            PriorityError::NotRedundant { .. } => VrmError::ResourceUnavailable(err.to_string()),
            PriorityError::TooLow { network_id, .. } | PriorityError::TooHigh { network_id, .. } => {
                VrmError::InsufficientCapacity {
                    network_id,
                    reason: err.to_string(),
                }
            }
        }
    }
}

/// Configured priority plus the bump a surviving router gets
pub fn real_priority(router: &Router) -> u32 {
    if router.is_priority_bumped {
        router.priority + DEFAULT_DELTA
    } else {
        router.priority
    }
}

/// Priority for a router joining `network_id`, given the routers already there.
///
/// `exclude` is the joining router itself when it is already persisted.
pub fn updated_priority(
    network_id: NetworkId,
    routers: &[Router],
    exclude: Option<RouterId>,
) -> Result<u32, PriorityError> {
    if routers.is_empty() {
        return Ok(DEFAULT_PRIORITY);
    }

    let mut max = 0;
    for router in routers {
        if !router.is_redundant {
            return Err(PriorityError::NotRedundant {
                router: router.instance_name.clone(),
            });
        }
        if Some(router.id) == exclude {
            continue;
        }
        max = max.max(real_priority(router));
    }

    if max == 0 {
        return Ok(DEFAULT_PRIORITY);
    }
    if max < MIN_ALLOCATABLE_PRIORITY {
        return Err(PriorityError::TooLow { network_id, max });
    }
    if max > MAX_ALLOCATABLE_PRIORITY {
        return Err(PriorityError::TooHigh { network_id, max });
    }
    Ok(max - DEFAULT_DELTA + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redundant(id: RouterId, priority: u32, bumped: bool) -> Router {
        let mut router = Router::new(id, format!("r-{}-VM", id), 1);
        router.is_redundant = true;
        router.priority = priority;
        router.is_priority_bumped = bumped;
        router
    }

    #[test]
    fn test_real_priority() {
        assert_eq!(real_priority(&redundant(1, 100, false)), 100);
        assert_eq!(real_priority(&redundant(1, 100, true)), 102);
    }

    #[test]
    fn test_no_routers_gets_default() {
        assert_eq!(updated_priority(204, &[], None), Ok(100));
    }

    #[test]
    fn test_allocation_boundaries() {
        assert_eq!(updated_priority(204, &[redundant(1, 21, false)], None), Ok(20));
        assert_eq!(updated_priority(204, &[redundant(1, 200, false)], None), Ok(199));
        assert_eq!(updated_priority(204, &[redundant(1, 19, true)], None), Ok(20));
        assert_eq!(
            updated_priority(204, &[redundant(1, 19, false)], None),
            Err(PriorityError::TooLow {
                network_id: 204,
                max: 19
            })
        );
        assert_eq!(
            updated_priority(204, &[redundant(1, 201, false)], None),
            Err(PriorityError::TooHigh {
                network_id: 204,
                max: 201
            })
        );
    }

    #[test]
    fn test_excludes_joining_router() {
        let routers = vec![redundant(1, 150, false), redundant(2, 100, false)];
        assert_eq!(updated_priority(204, &routers, Some(1)), Ok(99));
        assert_eq!(updated_priority(204, &routers[..1], Some(1)), Ok(100));
    }

    #[test]
    fn test_non_redundant_router_rejected() {
        let mut single = redundant(1, 100, false);
        single.is_redundant = false;
        let err = updated_priority(204, &[single], None).unwrap_err();
        assert!(matches!(err, PriorityError::NotRedundant { .. }));
    }

    #[test]
    fn test_capacity_errors_convert() {
        let err: VrmError = PriorityError::TooLow {
            network_id: 204,
            max: 19,
        }
        .into();
        assert_eq!(err.kind(), "insufficient_capacity");
        assert!(!err.is_retryable());
    }
}

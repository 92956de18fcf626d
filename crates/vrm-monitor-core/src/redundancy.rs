use crate::priority::{real_priority, PriorityError};
use std::collections::HashMap;
use vrm_proto::{Answer, AnswerPayload};
use vrm_shared::{
    Alert, AlertType, NetworkId, RedundantState, Router, VmState, VpcId, DEFAULT_DELTA,
};

/// Live (state, bumped) pair of a redundant router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub state: RedundantState,
    pub is_bumped: bool,
}

/// What a status probe says about a router.
///
/// A router that is not running loses its bump; a router we cannot reach keeps it.
pub fn observe(router: &Router, host_up: bool, answer: Option<&Answer>) -> Observation {
    if router.state != VmState::Running {
        return Observation {
            state: RedundantState::Unknown,
            is_bumped: false,
        };
    }
    let unreachable = Observation {
        state: RedundantState::Unknown,
        is_bumped: router.is_priority_bumped,
    };
    if !host_up {
        return unreachable;
    }
    match answer {
        Some(Answer {
            result: true,
            payload: AnswerPayload::CheckRouter { state, is_bumped },
            ..
        }) => Observation {
            state: *state,
            is_bumped: *is_bumped,
        },
        _ => unreachable,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: RedundantState,
    pub to: RedundantState,
}

impl StateChange {
    /// Only becoming Master is worth an operator's attention
    pub fn raises_alert(&self) -> bool {
        self.to == RedundantState::Master
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationResult {
    pub persist: bool,
    pub change: Option<StateChange>,
}

pub fn apply_observation(router: &mut Router, obs: Observation) -> ObservationResult {
    let previous = router.redundant_state;
    let mut persist = false;
    if router.redundant_state != obs.state {
        router.redundant_state = obs.state;
        persist = true;
    }
    if router.is_priority_bumped != obs.is_bumped {
        router.is_priority_bumped = obs.is_bumped;
        persist = true;
    }
    let change = (previous != obs.state).then_some(StateChange {
        from: previous,
        to: obs.state,
    });
    ObservationResult { persist, change }
}

/// Router of a pair that reconciles it: the lower id when placed, else the other
pub fn pair_owner(pair: &[Router]) -> Option<&Router> {
    match pair {
        [first, second] => {
            if first.id < second.id && first.host_id.is_some() {
                Some(first)
            } else {
                Some(second)
            }
        }
        _ => None,
    }
}

/// Redundancy domain of a router: its VPC, else its first guest network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairKey {
    Vpc(VpcId),
    Network(NetworkId),
}

impl PairKey {
    pub fn of(router: &Router, networks: &[NetworkId]) -> Option<Self> {
        match router.vpc_id {
            Some(vpc_id) => Some(Self::Vpc(vpc_id)),
            None => networks.first().copied().map(Self::Network),
        }
    }
}

/// Every (duplicate, first seen) pair of Masters sharing a redundancy domain
pub fn find_duplicate_masters(routers: &[(PairKey, Router)]) -> Vec<(Router, Router)> {
    let mut masters: HashMap<PairKey, &Router> = HashMap::new();
    let mut duplicates = Vec::new();
    for (key, router) in routers {
        if router.redundant_state != RedundantState::Master {
            continue;
        }
        match masters.get(key) {
            Some(first) => duplicates.push((router.clone(), (*first).clone())),
            None => {
                masters.insert(*key, router);
            }
        }
    }
    duplicates
}

/// One alert per side of a duplicate Master
pub fn duplicate_master_alerts(duplicate: &Router, first: &Router) -> [Alert; 2] {
    let title = format!(
        "Redundant routers {} and {} are both MASTER",
        duplicate.host_name, first.host_name
    );
    let detail = format!(
        "Virtual routers {} (id {}) and {} (id {}) both report MASTER; restart both if it persists",
        duplicate.host_name, duplicate.id, first.host_name, first.id
    );
    let alert_for = |router: &Router| Alert {
        alert_type: AlertType::DomainRouter,
        zone_id: router.zone_id,
        pod_id: router.pod_id,
        title: title.clone(),
        detail: detail.clone(),
    };
    [alert_for(duplicate), alert_for(first)]
}

/// (master, backup) of a pair whose priorities drifted or whose backup is bumped
pub fn sanity_violation(pair: &[Router]) -> Option<(Router, Router)> {
    if pair.len() != 2 {
        return None;
    }
    let master = pair
        .iter()
        .find(|r| r.redundant_state == RedundantState::Master)?;
    let backup = pair
        .iter()
        .find(|r| r.redundant_state == RedundantState::Backup)?;

    let expected_backup = (real_priority(master) + 1).checked_sub(DEFAULT_DELTA);
    if expected_backup != Some(real_priority(backup)) || backup.is_priority_bumped {
        Some((master.clone(), backup.clone()))
    } else {
        None
    }
}

pub fn recovery_alert(backup: &Router) -> Alert {
    let title = format!(
        "Rebooting {} to restore its redundant router pair",
        backup.instance_name
    );
    Alert {
        alert_type: AlertType::DomainRouter,
        zone_id: backup.zone_id,
        pod_id: backup.pod_id,
        detail: title.clone(),
        title,
    }
}

/// Alert for a router that just became Master
pub fn master_transition_alert(router: &Router, change: StateChange) -> Alert {
    let title = format!(
        "Redundant virtual router {} just switched to MASTER",
        router.instance_name
    );
    Alert {
        alert_type: AlertType::DomainRouter,
        zone_id: router.zone_id,
        pod_id: router.pod_id,
        title,
        detail: format!(
            "Redundant virtual router {} (id {}) went from {} to {}",
            router.instance_name, router.id, change.from, change.to
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpDecision {
    /// The surviving router has the lower priority and must take over
    Bump,
    AlreadyBumped,
    NotNeeded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SingleWorkingPlan {
    /// Not exactly one connected and one disconnected router
    Ignore,
    Handle {
        connected: Router,
        disconnected: Router,
        bump: BumpDecision,
        alert: Alert,
    },
}

/// Plan the takeover when one member of a redundant pair went unreachable
pub fn plan_single_working(
    connected: &[Router],
    disconnected: &[Router],
    reason: &str,
) -> Result<SingleWorkingPlan, PriorityError> {
    let (conn, disc) = match (connected, disconnected) {
        ([conn], [disc]) => (conn, disc),
        _ => return Ok(SingleWorkingPlan::Ignore),
    };
    for router in [conn, disc] {
        if !router.is_redundant {
            return Err(PriorityError::NotRedundant {
                router: router.instance_name.clone(),
            });
        }
    }

    let bump = if real_priority(conn) < real_priority(disc) {
        if conn.is_priority_bumped {
            BumpDecision::AlreadyBumped
        } else {
            BumpDecision::Bump
        }
    } else {
        BumpDecision::NotNeeded
    };

    let title = format!(
        "Virtual router {} will be stopped once it reconnects",
        disc.instance_name
    );
    let alert = Alert {
        alert_type: AlertType::DomainRouter,
        zone_id: disc.zone_id,
        pod_id: disc.pod_id,
        title,
        detail: format!(
            "Virtual router {} (id {}) will be stopped once it reconnects: {}",
            disc.instance_name, disc.id, reason
        ),
    };

    Ok(SingleWorkingPlan::Handle {
        connected: conn.clone(),
        disconnected: disc.clone(),
        bump,
        alert,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router(id: u64, state: RedundantState, priority: u32) -> Router {
        let mut router = Router::new(id, format!("r-{}-VM", id), 1);
        router.is_redundant = true;
        router.state = VmState::Running;
        router.redundant_state = state;
        router.priority = priority;
        router.host_id = Some(10 + id);
        router
    }

    fn check_answer(state: RedundantState, is_bumped: bool) -> Answer {
        Answer::success().with_payload(AnswerPayload::CheckRouter { state, is_bumped })
    }

    #[test]
    fn test_observe_stopped_router_clears_bump() {
        let mut r = router(1, RedundantState::Master, 100);
        r.state = VmState::Stopped;
        r.is_priority_bumped = true;
        let obs = observe(&r, true, Some(&check_answer(RedundantState::Master, true)));
        assert_eq!(
            obs,
            Observation {
                state: RedundantState::Unknown,
                is_bumped: false
            }
        );
    }

    #[test]
    fn test_observe_host_down_keeps_bump() {
        let mut r = router(1, RedundantState::Backup, 99);
        r.is_priority_bumped = true;
        let obs = observe(&r, false, None);
        assert_eq!(obs.state, RedundantState::Unknown);
        assert!(obs.is_bumped);
    }

    #[test]
    fn test_observe_answer() {
        let r = router(1, RedundantState::Unknown, 100);
        let obs = observe(&r, true, Some(&check_answer(RedundantState::Backup, false)));
        assert_eq!(obs.state, RedundantState::Backup);

        let failed = Answer::failure("keepalived not running");
        assert_eq!(observe(&r, true, Some(&failed)).state, RedundantState::Unknown);
        assert_eq!(observe(&r, true, None).state, RedundantState::Unknown);
    }

    #[test]
    fn test_apply_observation_change() {
        let mut r = router(1, RedundantState::Backup, 99);
        let result = apply_observation(
            &mut r,
            Observation {
                state: RedundantState::Master,
                is_bumped: false,
            },
        );
        assert!(result.persist);
        let change = result.change.unwrap();
        assert_eq!(change.from, RedundantState::Backup);
        assert!(change.raises_alert());
        assert_eq!(r.redundant_state, RedundantState::Master);
    }

    #[test]
    fn test_apply_observation_bump_only() {
        let mut r = router(1, RedundantState::Master, 100);
        let result = apply_observation(
            &mut r,
            Observation {
                state: RedundantState::Master,
                is_bumped: true,
            },
        );
        assert!(result.persist);
        assert!(result.change.is_none());

        let unknown = StateChange {
            from: RedundantState::Backup,
            to: RedundantState::Unknown,
        };
        assert!(!unknown.raises_alert());
    }

    #[test]
    fn test_master_transition_alert() {
        let r = router(4, RedundantState::Master, 100);
        let alert = master_transition_alert(
            &r,
            StateChange {
                from: RedundantState::Backup,
                to: RedundantState::Master,
            },
        );
        assert_eq!(alert.alert_type, AlertType::DomainRouter);
        assert!(alert.detail.contains("BACKUP to MASTER"));
    }

    #[test]
    fn test_pair_owner() {
        let a = router(1, RedundantState::Master, 100);
        let b = router(2, RedundantState::Backup, 99);
        assert_eq!(pair_owner(&[a.clone(), b.clone()]).unwrap().id, 1);
        assert_eq!(pair_owner(&[b.clone(), a.clone()]).unwrap().id, 1);

        let mut unplaced = a.clone();
        unplaced.host_id = None;
        assert_eq!(pair_owner(&[unplaced, b.clone()]).unwrap().id, 2);
        assert!(pair_owner(&[a]).is_none());
    }

    #[test]
    fn test_duplicate_masters() {
        let routers = vec![
            (PairKey::Network(204), router(1, RedundantState::Master, 100)),
            (PairKey::Network(204), router(2, RedundantState::Master, 99)),
            (PairKey::Network(205), router(3, RedundantState::Master, 100)),
            (PairKey::Vpc(204), router(4, RedundantState::Master, 100)),
        ];
        let dups = find_duplicate_masters(&routers);
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].0.id, 2);
        assert_eq!(dups[0].1.id, 1);

        let alerts = duplicate_master_alerts(&dups[0].0, &dups[0].1);
        assert_eq!(alerts[0].title, alerts[1].title);
        assert!(alerts[0].detail.contains("id 2"));
    }

    #[test]
    fn test_pair_key() {
        let mut r = router(1, RedundantState::Master, 100);
        assert_eq!(PairKey::of(&r, &[204, 205]), Some(PairKey::Network(204)));
        assert_eq!(PairKey::of(&r, &[]), None);
        r.vpc_id = Some(9);
        assert_eq!(PairKey::of(&r, &[204]), Some(PairKey::Vpc(9)));
    }

    #[test]
    fn test_sanity_steady_state() {
        let pair = vec![
            router(1, RedundantState::Master, 100),
            router(2, RedundantState::Backup, 99),
        ];
        assert!(sanity_violation(&pair).is_none());
    }

    #[test]
    fn test_sanity_drift_and_bumped_backup() {
        let drifted = vec![
            router(1, RedundantState::Master, 100),
            router(2, RedundantState::Backup, 100),
        ];
        let (master, backup) = sanity_violation(&drifted).unwrap();
        assert_eq!(master.id, 1);
        assert_eq!(backup.id, 2);

        let mut bumped_master = router(1, RedundantState::Master, 99);
        bumped_master.is_priority_bumped = true;
        let mut bumped_backup = router(2, RedundantState::Backup, 99);
        bumped_backup.is_priority_bumped = true;
        assert!(sanity_violation(&[bumped_master, bumped_backup]).is_some());
    }

    #[test]
    fn test_sanity_needs_master_and_backup() {
        let pair = vec![
            router(1, RedundantState::Master, 100),
            router(2, RedundantState::Unknown, 50),
        ];
        assert!(sanity_violation(&pair).is_none());
    }

    #[test]
    fn test_single_working_bump() {
        let conn = router(1, RedundantState::Backup, 99);
        let disc = router(2, RedundantState::Master, 100);
        let plan = plan_single_working(&[conn], &[disc], "agent unavailable").unwrap();
        match plan {
            SingleWorkingPlan::Handle {
                bump,
                disconnected,
                alert,
                ..
            } => {
                assert_eq!(bump, BumpDecision::Bump);
                assert_eq!(disconnected.id, 2);
                assert!(alert.detail.contains("agent unavailable"));
            }
            SingleWorkingPlan::Ignore => panic!("expected a plan"),
        }
    }

    #[test]
    fn test_single_working_no_bump_needed() {
        let conn = router(1, RedundantState::Master, 100);
        let disc = router(2, RedundantState::Backup, 99);
        match plan_single_working(&[conn], &[disc], "down").unwrap() {
            SingleWorkingPlan::Handle { bump, .. } => assert_eq!(bump, BumpDecision::NotNeeded),
            SingleWorkingPlan::Ignore => panic!("expected a plan"),
        }
    }

    #[test]
    fn test_single_working_already_bumped() {
        let mut conn = router(1, RedundantState::Backup, 97);
        conn.is_priority_bumped = true;
        let disc = router(2, RedundantState::Master, 100);
        match plan_single_working(&[conn], &[disc], "down").unwrap() {
            SingleWorkingPlan::Handle { bump, .. } => {
                assert_eq!(bump, BumpDecision::AlreadyBumped)
            }
            SingleWorkingPlan::Ignore => panic!("expected a plan"),
        }
    }

    #[test]
    fn test_single_working_counts_and_redundancy() {
        let a = router(1, RedundantState::Master, 100);
        let b = router(2, RedundantState::Backup, 99);
        assert_eq!(
            plan_single_working(&[a.clone(), b.clone()], &[], "down").unwrap(),
            SingleWorkingPlan::Ignore
        );

        let mut single = a;
        single.is_redundant = false;
        assert!(plan_single_working(&[single], &[b], "down").is_err());
    }
}

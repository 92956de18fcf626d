use vrm_shared::UserStatistics;

/// Byte counters reported by a router since its last reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageReading {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl UsageReading {
    pub fn is_empty(&self) -> bool {
        self.bytes_sent == 0 && self.bytes_received == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageFold {
    Applied,
    /// Another poller updated the row after we read it; the reading is dropped
    Stale,
}

/// Fold a reading into a locked statistics row.
///
/// `previous` is the row as read before the agent call. A reading below the
/// stored current value means the router's counters were reset, so the old
/// current value moves into the net total before being replaced.
pub fn fold_usage(
    row: &mut UserStatistics,
    previous: Option<&UserStatistics>,
    reading: UsageReading,
    roll_aggregate: bool,
) -> UsageFold {
    if let Some(previous) = previous {
        if previous.current_bytes_received != row.current_bytes_received
            || previous.current_bytes_sent != row.current_bytes_sent
        {
            return UsageFold::Stale;
        }
    }

    if row.current_bytes_received > reading.bytes_received {
        row.net_bytes_received += row.current_bytes_received;
    }
    row.current_bytes_received = reading.bytes_received;

    if row.current_bytes_sent > reading.bytes_sent {
        row.net_bytes_sent += row.current_bytes_sent;
    }
    row.current_bytes_sent = reading.bytes_sent;

    if roll_aggregate {
        row.roll_aggregate();
    }
    UsageFold::Applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use vrm_shared::{UsageStatsKey, ROUTER_DEVICE_TYPE};

    fn stats(current: u64, net: u64) -> UserStatistics {
        let key = UsageStatsKey {
            account_id: 2,
            zone_id: 1,
            network_id: 204,
            public_ip: None,
            router_id: 4,
            device_type: ROUTER_DEVICE_TYPE.to_string(),
        };
        let mut stats = UserStatistics::new(1, key);
        stats.current_bytes_received = current;
        stats.net_bytes_received = net;
        stats.current_bytes_sent = current;
        stats.net_bytes_sent = net;
        stats
    }

    #[test]
    fn test_counter_regression_folds_previous_current() {
        let mut row = stats(100, 500);
        let previous = row.clone();
        let reading = UsageReading {
            bytes_sent: 30,
            bytes_received: 30,
        };
        assert_eq!(
            fold_usage(&mut row, Some(&previous), reading, false),
            UsageFold::Applied
        );
        assert_eq!(row.current_bytes_received, 30);
        assert_eq!(row.net_bytes_received, 600);
        assert_eq!(row.current_bytes_sent, 30);
        assert_eq!(row.net_bytes_sent, 600);
        assert_eq!(row.agg_bytes_received, 0);
    }

    #[test]
    fn test_growth_replaces_current() {
        let mut row = stats(100, 500);
        let reading = UsageReading {
            bytes_sent: 150,
            bytes_received: 170,
        };
        fold_usage(&mut row, None, reading, true);
        assert_eq!(row.current_bytes_received, 170);
        assert_eq!(row.net_bytes_received, 500);
        assert_eq!(row.agg_bytes_received, 670);
        assert_eq!(row.agg_bytes_sent, 650);
    }

    #[test]
    fn test_stale_row_discards_reading() {
        let previous = stats(100, 500);
        let mut row = stats(120, 500);
        let reading = UsageReading {
            bytes_sent: 200,
            bytes_received: 200,
        };
        assert_eq!(
            fold_usage(&mut row, Some(&previous), reading, true),
            UsageFold::Stale
        );
        assert_eq!(row.current_bytes_received, 120);
        assert_eq!(row.agg_bytes_received, 0);
    }

    #[test]
    fn test_empty_reading() {
        assert!(UsageReading {
            bytes_sent: 0,
            bytes_received: 0
        }
        .is_empty());
        assert!(!UsageReading {
            bytes_sent: 1,
            bytes_received: 0
        }
        .is_empty());
    }
}

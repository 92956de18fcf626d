use chrono::NaiveDateTime;
use vrm_proto::{Answer, AnswerPayload};
use vrm_shared::{Alert, AlertType, Router, ALERT_TIMESTAMP_FORMAT};

/// Strict parse of a router alert timestamp
pub fn parse_alert_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, ALERT_TIMESTAMP_FORMAT).ok()
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlertPoll {
    /// Agent failed or had nothing new
    Nothing,
    /// Alerts came with a timestamp we cannot trust as a high-water mark
    InvalidTimestamp(Option<String>),
    Emit {
        alerts: Vec<Alert>,
        checkpoint: String,
    },
}

/// Decide what to do with a `GetRouterAlerts` answer
pub fn plan_router_alerts(router: &Router, answer: &Answer) -> AlertPoll {
    if !answer.result {
        return AlertPoll::Nothing;
    }
    let AnswerPayload::GetRouterAlerts { timestamp, alerts } = &answer.payload else {
        return AlertPoll::Nothing;
    };
    let Some(messages) = alerts else {
        return AlertPoll::Nothing;
    };

    let checkpoint = match timestamp.as_deref() {
        Some(raw) if parse_alert_timestamp(raw).is_some() => raw.to_string(),
        _ => return AlertPoll::InvalidTimestamp(timestamp.clone()),
    };

    let title = format!("Monitoring service on router {}", router.instance_name);
    let alerts = messages
        .iter()
        .map(|message| Alert {
            alert_type: AlertType::RouterMonitoring,
            zone_id: router.zone_id,
            pod_id: router.pod_id,
            title: title.clone(),
            detail: message.clone(),
        })
        .collect();
    AlertPoll::Emit { alerts, checkpoint }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vrm_shared::ALERT_EPOCH;

    fn answer(timestamp: Option<&str>, alerts: Option<Vec<&str>>) -> Answer {
        Answer::success().with_payload(AnswerPayload::GetRouterAlerts {
            timestamp: timestamp.map(str::to_string),
            alerts: alerts.map(|list| list.into_iter().map(str::to_string).collect()),
        })
    }

    #[test]
    fn test_parse_timestamp_strict() {
        assert!(parse_alert_timestamp(ALERT_EPOCH).is_some());
        assert!(parse_alert_timestamp("2024-02-30 10:00:00").is_none());
        assert!(parse_alert_timestamp("2024-01-05T10:00:00").is_none());
        assert!(parse_alert_timestamp("2024-01-05 25:00:00").is_none());
    }

    #[test]
    fn test_emit_one_alert_per_message() {
        let router = Router::new(4, "r-4-VM", 1);
        let poll = plan_router_alerts(
            &router,
            &answer(
                Some("2024-01-05 10:00:00"),
                Some(vec!["dnsmasq restarted", "haproxy restarted"]),
            ),
        );
        match poll {
            AlertPoll::Emit { alerts, checkpoint } => {
                assert_eq!(alerts.len(), 2);
                assert_eq!(alerts[1].detail, "haproxy restarted");
                assert_eq!(checkpoint, "2024-01-05 10:00:00");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_timestamp_skips() {
        let router = Router::new(4, "r-4-VM", 1);
        let poll = plan_router_alerts(&router, &answer(Some("yesterday"), Some(vec!["x"])));
        assert_eq!(
            poll,
            AlertPoll::InvalidTimestamp(Some("yesterday".to_string()))
        );
        let poll = plan_router_alerts(&router, &answer(None, Some(vec!["x"])));
        assert_eq!(poll, AlertPoll::InvalidTimestamp(None));
    }

    #[test]
    fn test_nothing_without_alerts() {
        let router = Router::new(4, "r-4-VM", 1);
        assert_eq!(
            plan_router_alerts(&router, &answer(Some("2024-01-05 10:00:00"), None)),
            AlertPoll::Nothing
        );
        assert_eq!(
            plan_router_alerts(&router, &Answer::failure("script missing")),
            AlertPoll::Nothing
        );
    }
}

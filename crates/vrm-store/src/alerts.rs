use parking_lot::Mutex;
use tracing::warn;
use vrm_core::AlertSink;
use vrm_shared::{Alert, AlertType};

fn log_alert(alert: &Alert) {
    warn!(
        alert_type = ?alert.alert_type,
        zone_id = alert.zone_id,
        pod_id = ?alert.pod_id,
        title = %alert.title,
        "{}",
        alert.detail
    );
}

/// Alert sink of the manager process: alerts go to the log and nowhere else
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn send_alert(&self, alert: Alert) {
        log_alert(&alert);
    }
}

/// Alert sink that logs every alert and keeps it for inspection
#[derive(Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    pub fn count_of(&self, alert_type: AlertType) -> usize {
        self.alerts
            .lock()
            .iter()
            .filter(|alert| alert.alert_type == alert_type)
            .count()
    }
}

impl AlertSink for RecordingAlertSink {
    fn send_alert(&self, alert: Alert) {
        log_alert(&alert);
        self.alerts.lock().push(alert);
    }
}

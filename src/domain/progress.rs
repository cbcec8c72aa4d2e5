use serde_json::{Map, Value};

use crate::utils::{format_eta, format_megabytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Downloading,
    Finished,
    Error,
}

impl ProgressStatus {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "downloading" => Some(ProgressStatus::Downloading),
            "finished" => Some(ProgressStatus::Finished),
            "error" => Some(ProgressStatus::Error),
            _ => None,
        }
    }
}

/// One progress tick reported by the engine.
///
/// `downloaded_bytes` never exceeds `total_bytes` when the total is known;
/// the parser clamps it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub status: ProgressStatus,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    pub speed_bytes_per_sec: Option<f64>,
    pub eta_seconds: Option<u64>,
    pub fragment_index: Option<u64>,
    pub fragment_count: Option<u64>,
}

/// Text and bar value rendered for a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub percent: Option<u8>,
    pub text: String,
}

impl ProgressEvent {
    #[cfg(test)]
    pub fn downloading(downloaded_bytes: u64, total_bytes: Option<u64>) -> Self {
        Self {
            status: ProgressStatus::Downloading,
            downloaded_bytes,
            total_bytes,
            speed_bytes_per_sec: None,
            eta_seconds: None,
            fragment_index: None,
            fragment_count: None,
        }
    }

    /// Parse the engine's progress dictionary. Returns `None` when the tick
    /// has no recognizable status; any other malformed field becomes `None`.
    pub fn from_raw(raw: &Map<String, Value>) -> Option<Self> {
        let status = raw
            .get("status")
            .and_then(Value::as_str)
            .and_then(ProgressStatus::parse)?;

        let total_bytes = number(raw, "total_bytes")
            .map(|v| v as u64)
            .filter(|&v| v > 0);
        let mut downloaded_bytes = number(raw, "downloaded_bytes").map_or(0, |v| v as u64);
        if let Some(total) = total_bytes {
            downloaded_bytes = downloaded_bytes.min(total);
        }

        Some(Self {
            status,
            downloaded_bytes,
            total_bytes,
            speed_bytes_per_sec: number(raw, "speed"),
            eta_seconds: number(raw, "eta").map(|v| v as u64),
            fragment_index: number(raw, "fragment_index").map(|v| v as u64),
            fragment_count: number(raw, "fragment_count").map(|v| v as u64),
        })
    }

    /// `floor(downloaded / total * 100)`, or `None` while the total is unknown.
    pub fn percentage(&self) -> Option<u8> {
        let total = self.total_bytes.filter(|&t| t > 0)?;
        let percent = u128::from(self.downloaded_bytes) * 100 / u128::from(total);
        Some(percent.min(100) as u8)
    }

    pub fn status_line(&self) -> StatusLine {
        match self.status {
            ProgressStatus::Downloading => StatusLine {
                percent: self.percentage(),
                text: self.describe_transfer(),
            },
            ProgressStatus::Finished => StatusLine {
                percent: self.percentage(),
                text: "Download finished, processing...".to_string(),
            },
            ProgressStatus::Error => StatusLine {
                percent: None,
                text: "The download reported an error".to_string(),
            },
        }
    }

    fn describe_transfer(&self) -> String {
        let mut text = String::from("Downloading...");

        if let (Some(percent), Some(total)) = (self.percentage(), self.total_bytes) {
            text.push_str(&format!(
                " {}% ({} / {})",
                percent,
                format_megabytes(self.downloaded_bytes as f64),
                format_megabytes(total as f64)
            ));
        }

        if let Some(speed) = self.speed_bytes_per_sec.filter(|&s| s > 0.0) {
            text.push_str(&format!(", speed: {}/s", format_megabytes(speed)));
        }

        if let Some(eta) = self.eta_seconds {
            text.push_str(&format!(", remaining: {}", format_eta(eta)));
        }

        if let (Some(index), Some(count)) = (self.fragment_index, self.fragment_count) {
            text.push_str(&format!(" (fragment {}/{})", index, count));
        }

        text
    }
}

// Accepts JSON numbers and numeric strings; negatives and NaN are treated as missing.
fn number(raw: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = match raw.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (value.is_finite() && value >= 0.0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_half_way_tick_renders_fifty_percent() {
        let event = ProgressEvent::from_raw(&raw(json!({
            "status": "downloading",
            "downloaded_bytes": 50,
            "total_bytes": 100
        })))
        .unwrap();

        assert_eq!(event.percentage(), Some(50));
        let line = event.status_line();
        assert_eq!(line.percent, Some(50));
        assert!(line.text.starts_with("Downloading... 50%"));
    }

    #[test]
    fn test_percentage_is_floored() {
        for (downloaded, total, expected) in [(1, 3, 33), (2, 3, 66), (999, 1000, 99), (0, 7, 0)] {
            let event = ProgressEvent::downloading(downloaded, Some(total));
            assert_eq!(event.percentage(), Some(expected), "{downloaded}/{total}");
        }
    }

    #[test]
    fn test_unknown_total_leaves_percentage_unset() {
        let event = ProgressEvent::from_raw(&raw(json!({
            "status": "downloading",
            "downloaded_bytes": 1024,
            "total_bytes": null,
            "speed": 2097152.0
        })))
        .unwrap();

        assert_eq!(event.total_bytes, None);
        let line = event.status_line();
        assert_eq!(line.percent, None);
        assert_eq!(line.text, "Downloading..., speed: 2.00MB/s");
    }

    #[test]
    fn test_zero_total_counts_as_unknown() {
        let event = ProgressEvent::from_raw(&raw(json!({
            "status": "downloading",
            "downloaded_bytes": 10,
            "total_bytes": 0
        })))
        .unwrap();
        assert_eq!(event.percentage(), None);
    }

    #[test]
    fn test_downloaded_is_clamped_to_total() {
        let event = ProgressEvent::from_raw(&raw(json!({
            "status": "downloading",
            "downloaded_bytes": 150,
            "total_bytes": 100
        })))
        .unwrap();
        assert_eq!(event.downloaded_bytes, 100);
        assert_eq!(event.percentage(), Some(100));
    }

    #[test]
    fn test_full_status_line() {
        let event = ProgressEvent::from_raw(&raw(json!({
            "status": "downloading",
            "downloaded_bytes": 1048576,
            "total_bytes": 4194304,
            "speed": 524288.0,
            "eta": 65.7,
            "fragment_index": 3,
            "fragment_count": 12
        })))
        .unwrap();

        assert_eq!(
            event.status_line().text,
            "Downloading... 25% (1.00MB / 4.00MB), speed: 0.50MB/s, remaining: 1:05 (fragment 3/12)"
        );
    }

    #[test]
    fn test_malformed_fields_become_none() {
        let event = ProgressEvent::from_raw(&raw(json!({
            "status": "downloading",
            "downloaded_bytes": "2048",
            "total_bytes": "NA",
            "speed": [],
            "eta": -1,
            "fragment_index": 2
        })))
        .unwrap();

        assert_eq!(event.downloaded_bytes, 2048);
        assert_eq!(event.total_bytes, None);
        assert_eq!(event.speed_bytes_per_sec, None);
        assert_eq!(event.eta_seconds, None);
        assert_eq!(event.fragment_index, Some(2));
        assert!(!event.status_line().text.contains("fragment"));
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!(ProgressEvent::from_raw(&raw(json!({ "status": "paused" }))).is_none());
        assert!(ProgressEvent::from_raw(&raw(json!({ "downloaded_bytes": 1 }))).is_none());
    }

    #[test]
    fn test_finished_tick() {
        let event = ProgressEvent::from_raw(&raw(json!({
            "status": "finished",
            "downloaded_bytes": 100,
            "total_bytes": 100
        })))
        .unwrap();
        assert_eq!(event.status, ProgressStatus::Finished);
        assert_eq!(event.status_line().percent, Some(100));
    }
}

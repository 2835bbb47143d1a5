//! Batch telemetry backfill for the history tab.
//!
//! The hub keeps a rolling archive of facility readings behind
//! `/api/sensor-data`; the history view charts six measures from it and
//! summarizes the latest alert level.

use crate::panel::{Badge, Severity};

use num_enum::{FromPrimitive, IntoPrimitive};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Request timeout for the batch endpoint.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("backfill request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Facility alert level carried by the batch records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[derive(FromPrimitive, IntoPrimitive)]
pub enum AlertState {
    Normal = 0,
    EscapeAttempt = 1,
    FireRisk = 2,
    GasDetected = 3,
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl AlertState {
    /// Rendered summary for the history tab. Unrecognized levels read
    /// as normal, same as the zero level.
    pub fn badge(&self) -> Badge {
        match self {
            AlertState::EscapeAttempt => Badge::new("ESCAPE ATTEMPT", Severity::Info),
            AlertState::FireRisk => Badge::new("FIRE RISK", Severity::Danger),
            AlertState::GasDetected => Badge::new("GAS DETECTED", Severity::Warning),
            AlertState::Normal | AlertState::Unknown(_) => {
                Badge::new("NORMAL", Severity::Success)
            }
        }
    }
}

/// One row of the batch endpoint, ordered oldest first. Measures a
/// record does not carry are simply absent from that chart.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorRecord {
    pub time: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub gas: Option<f64>,
    #[serde(default)]
    pub water: Option<f64>,
    #[serde(default)]
    pub motion: Option<f64>,
    #[serde(default)]
    pub alert_state: u8,
}

impl SensorRecord {
    pub fn alert(&self) -> AlertState {
        AlertState::from(self.alert_state)
    }
}

/// The six measures charted on the history tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Temperature,
    Humidity,
    Gas,
    Water,
    Motion,
    Alert,
}

impl Measure {
    pub const ALL: [Measure; 6] = [
        Measure::Temperature,
        Measure::Humidity,
        Measure::Gas,
        Measure::Water,
        Measure::Motion,
        Measure::Alert,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Measure::Temperature => "Temperature °C",
            Measure::Humidity => "Humidity %",
            Measure::Gas => "Gas Level",
            Measure::Water => "Water Level",
            Measure::Motion => "Motion (0/1)",
            Measure::Alert => "Alert State",
        }
    }

    /// This measure's value in one record, when present.
    pub fn extract(&self, record: &SensorRecord) -> Option<f64> {
        match self {
            Measure::Temperature => record.temperature,
            Measure::Humidity => record.humidity,
            Measure::Gas => record.gas,
            Measure::Water => record.water,
            Measure::Motion => record.motion,
            Measure::Alert => Some(record.alert_state as f64),
        }
    }
}

/// One measure's series across the records, gaps dropped.
pub fn series(records: &[SensorRecord], measure: Measure) -> Vec<f64> {
    records.iter().filter_map(|r| measure.extract(r)).collect()
}

/// The alert summary shown above the charts: the last record's state.
pub fn latest_alert(records: &[SensorRecord]) -> AlertState {
    records.last().map_or(AlertState::Normal, |r| r.alert())
}

/// Fetches the ordered batch records from the hub archive endpoint.
pub fn fetch_records(url: &str) -> Result<Vec<SensorRecord>, BackfillError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()?;
    let records = client.get(url).send()?.error_for_status()?.json()?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(alert_state: u8) -> SensorRecord {
        SensorRecord {
            time: "2026-01-01T10:00:00Z".to_string(),
            temperature: Some(21.0),
            humidity: None,
            gas: Some(0.3),
            water: None,
            motion: Some(1.0),
            alert_state,
        }
    }

    #[test]
    fn alert_levels_map_to_badges() {
        assert_eq!(AlertState::from(1u8), AlertState::EscapeAttempt);
        assert_eq!(AlertState::from(1u8).badge().severity, Severity::Info);
        assert_eq!(AlertState::from(2u8).badge().text, "FIRE RISK");
        assert_eq!(AlertState::from(3u8).badge().severity, Severity::Warning);
        assert_eq!(AlertState::from(0u8).badge().text, "NORMAL");
        // Unrecognized levels read as normal.
        assert_eq!(AlertState::from(7u8), AlertState::Unknown(7));
        assert_eq!(AlertState::from(7u8).badge().text, "NORMAL");
    }

    #[test]
    fn series_skips_missing_measures() {
        let records = vec![record(0), record(1)];
        assert_eq!(series(&records, Measure::Temperature), vec![21.0, 21.0]);
        assert!(series(&records, Measure::Humidity).is_empty());
        assert_eq!(series(&records, Measure::Alert), vec![0.0, 1.0]);
    }

    #[test]
    fn latest_alert_comes_from_the_last_record() {
        assert_eq!(latest_alert(&[]), AlertState::Normal);
        let records = vec![record(0), record(2)];
        assert_eq!(latest_alert(&records), AlertState::FireRisk);
    }

    #[test]
    fn records_parse_with_absent_measures() {
        let body = r#"[
            {"time": "2026-01-01T10:00:00Z", "temperature": 20.5, "alert_state": 3},
            {"time": "2026-01-01T10:01:00Z", "humidity": 48.2}
        ]"#;
        let records: Vec<SensorRecord> = serde_json::from_str(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].alert(), AlertState::GasDetected);
        assert_eq!(records[1].temperature, None);
        assert_eq!(records[1].alert(), AlertState::Normal);
    }
}

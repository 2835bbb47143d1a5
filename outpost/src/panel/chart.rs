//! Rolling trend window behind the temperature/humidity charts.

use std::collections::VecDeque;

/// How many points the trend charts keep.
pub const TREND_CAPACITY: usize = 15;

/// Parallel label/temperature/humidity series.
///
/// Points join on a wall-clock second label. A sample arriving within a
/// second that is already charted is dropped, and a sample carrying only
/// one of the series carries the other forward from the previous point
/// (0.0 when there is no previous point). The three queues stay the same
/// length at all times.
#[derive(Debug, Default)]
pub struct TrendWindow {
    labels: VecDeque<String>,
    temperature: VecDeque<f64>,
    humidity: VecDeque<f64>,
    revision: u64,
}

impl TrendWindow {
    pub fn new() -> TrendWindow {
        TrendWindow::default()
    }

    /// Adds a point under `label`. Returns false (and changes nothing)
    /// when that label is already charted.
    pub fn record(&mut self, label: &str, temperature: Option<f64>, humidity: Option<f64>) -> bool {
        if self.labels.iter().any(|l| l == label) {
            return false;
        }
        let temp = temperature.unwrap_or_else(|| self.temperature.back().copied().unwrap_or(0.0));
        let hum = humidity.unwrap_or_else(|| self.humidity.back().copied().unwrap_or(0.0));
        self.labels.push_back(label.to_string());
        self.temperature.push_back(temp);
        self.humidity.push_back(hum);
        if self.labels.len() > TREND_CAPACITY {
            self.labels.pop_front();
            self.temperature.pop_front();
            self.humidity.pop_front();
        }
        self.revision += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &VecDeque<String> {
        &self.labels
    }

    pub fn temperature(&self) -> &VecDeque<f64> {
        &self.temperature
    }

    pub fn humidity(&self) -> &VecDeque<f64> {
        &self.humidity
    }

    /// Bumped on every accepted point; lets a renderer skip repaints.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_aligned(w: &TrendWindow) {
        assert_eq!(w.labels().len(), w.temperature().len());
        assert_eq!(w.labels().len(), w.humidity().len());
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut w = TrendWindow::new();
        for i in 0..16 {
            assert!(w.record(&format!("10:00:{:02}", i), Some(i as f64), Some(50.0)));
        }
        assert_eq!(w.len(), TREND_CAPACITY);
        assert_eq!(w.labels().front().map(String::as_str), Some("10:00:01"));
        assert_eq!(w.temperature().front().copied(), Some(1.0));
        assert_aligned(&w);
    }

    #[test]
    fn duplicate_label_is_dropped() {
        let mut w = TrendWindow::new();
        assert!(w.record("10:00:00", Some(20.0), Some(50.0)));
        let rev = w.revision();
        assert!(!w.record("10:00:00", Some(99.0), Some(99.0)));
        assert_eq!(w.len(), 1);
        assert_eq!(w.revision(), rev);
        assert_eq!(w.temperature().back().copied(), Some(20.0));
        assert_aligned(&w);
    }

    #[test]
    fn missing_series_carries_forward() {
        let mut w = TrendWindow::new();
        w.record("10:00:00", Some(21.5), None);
        assert_eq!(w.humidity().back().copied(), Some(0.0));
        w.record("10:00:01", None, Some(48.0));
        assert_eq!(w.temperature().back().copied(), Some(21.5));
        w.record("10:00:02", Some(22.0), None);
        assert_eq!(w.humidity().back().copied(), Some(48.0));
        assert_aligned(&w);
    }
}

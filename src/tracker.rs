use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// What a percent change is measured against. Fixed for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeBasis {
    /// First price seen for the symbol.
    Baseline,
    /// Price seen on the previous successful fetch.
    Previous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolState {
    pub baseline_price: f64,
    pub previous_price: f64,
    pub sum: f64,
    pub count: u64,
    pub min: f64,
    pub min_at: DateTime<Utc>,
    pub max: f64,
    pub max_at: DateTime<Utc>,
}

impl SymbolState {
    fn new(price: f64, at: DateTime<Utc>) -> Self {
        Self {
            baseline_price: price,
            previous_price: price,
            sum: 0.0,
            count: 0,
            min: price,
            min_at: at,
            max: price,
            max_at: at,
        }
    }

    fn record(&mut self, price: f64, at: DateTime<Utc>) {
        self.previous_price = price;
        self.sum += price;
        self.count += 1;

        if price < self.min {
            self.min = price;
            self.min_at = at;
        }
        if price > self.max {
            self.max = price;
            self.max_at = at;
        }
    }
}

/// Aggregates of one symbol over a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolStats {
    pub average: f64,
    pub min: f64,
    pub min_at: DateTime<Utc>,
    pub max: f64,
    pub max_at: DateTime<Utc>,
}

/// Running per-symbol state, fed by every successful fetch.
#[derive(Debug, Default)]
pub struct Tracker {
    states: HashMap<String, SymbolState>,
}

/// `(current - reference) / reference * 100`, or `None` for a zero reference.
pub fn percent_change(reference: f64, current: f64) -> Option<f64> {
    if reference == 0.0 || !reference.is_finite() {
        return None;
    }
    Some((current - reference) / reference * 100.0)
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fetch(&mut self, symbol: &str, price: f64, at: DateTime<Utc>) {
        self.states
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolState::new(price, at))
            .record(price, at);
    }

    /// Records the fetch and returns the change for `basis`.
    ///
    /// Against the baseline the change is taken after recording, so the first
    /// fetch reports 0. Against the previous price it is taken before, so the
    /// first fetch reports nothing.
    pub fn observe(
        &mut self,
        symbol: &str,
        price: f64,
        at: DateTime<Utc>,
        basis: ChangeBasis,
    ) -> Option<f64> {
        match basis {
            ChangeBasis::Baseline => {
                self.record_fetch(symbol, price, at);
                self.percent_change_from_baseline(symbol, price)
            }
            ChangeBasis::Previous => {
                let change = self.percent_change_from_previous(symbol, price);
                self.record_fetch(symbol, price, at);
                change
            }
        }
    }

    pub fn percent_change_from_baseline(&self, symbol: &str, price: f64) -> Option<f64> {
        let state = self.states.get(symbol)?;
        percent_change(state.baseline_price, price)
    }

    pub fn percent_change_from_previous(&self, symbol: &str, price: f64) -> Option<f64> {
        let state = self.states.get(symbol)?;
        percent_change(state.previous_price, price)
    }

    pub fn baseline(&self, symbol: &str) -> Option<f64> {
        self.states.get(symbol).map(|s| s.baseline_price)
    }

    /// Zero for a symbol that never had a successful fetch.
    pub fn average(&self, symbol: &str) -> f64 {
        match self.states.get(symbol) {
            Some(state) if state.count > 0 => state.sum / state.count as f64,
            _ => 0.0,
        }
    }

    pub fn state(&self, symbol: &str) -> Option<&SymbolState> {
        self.states.get(symbol)
    }

    pub fn stats(&self, symbol: &str) -> Option<SymbolStats> {
        let state = self.states.get(symbol).filter(|s| s.count > 0)?;
        Some(SymbolStats {
            average: self.average(symbol),
            min: state.min,
            min_at: state.min_at,
            max: state.max,
            max_at: state.max_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tick(n: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + n * 10, 0).unwrap()
    }

    #[test]
    fn baseline_is_first_price() {
        let mut tracker = Tracker::new();
        tracker.record_fetch("X", 100.0, tick(1));
        tracker.record_fetch("X", 250.0, tick(2));
        tracker.record_fetch("X", 0.5, tick(3));

        assert_eq!(tracker.baseline("X"), Some(100.0));
        assert_eq!(tracker.state("X").unwrap().previous_price, 0.5);
    }

    #[test]
    fn change_from_baseline_matches_formula() {
        let mut tracker = Tracker::new();
        assert_eq!(tracker.percent_change_from_baseline("X", 10.0), None);

        tracker.record_fetch("X", 80.0, tick(1));
        assert_eq!(tracker.percent_change_from_baseline("X", 100.0), Some(25.0));
        assert_eq!(tracker.percent_change_from_baseline("X", 60.0), Some(-25.0));
    }

    #[test]
    fn zero_baseline_has_no_change() {
        let mut tracker = Tracker::new();
        tracker.record_fetch("X", 0.0, tick(1));
        assert_eq!(tracker.percent_change_from_baseline("X", 5.0), None);
    }

    #[test]
    fn average_is_zero_without_fetches() {
        let tracker = Tracker::new();
        assert_eq!(tracker.average("X"), 0.0);
        assert!(tracker.stats("X").is_none());
    }

    #[test]
    fn scenario_with_failed_tick() {
        let mut tracker = Tracker::new();

        assert_eq!(tracker.observe("X", 100.0, tick(1), ChangeBasis::Baseline), Some(0.0));
        assert_eq!(tracker.observe("X", 110.0, tick(2), ChangeBasis::Baseline), Some(10.0));
        // tick 3 failed, nothing recorded
        assert_eq!(tracker.observe("X", 90.0, tick(4), ChangeBasis::Baseline), Some(-10.0));

        let stats = tracker.stats("X").unwrap();
        assert_eq!(tracker.baseline("X"), Some(100.0));
        assert_eq!(stats.average, 100.0);
        assert_eq!((stats.min, stats.min_at), (90.0, tick(4)));
        assert_eq!((stats.max, stats.max_at), (110.0, tick(2)));
    }

    #[test]
    fn previous_basis_uses_last_price() {
        let mut tracker = Tracker::new();

        assert_eq!(tracker.observe("X", 100.0, tick(1), ChangeBasis::Previous), None);
        assert_eq!(tracker.observe("X", 110.0, tick(2), ChangeBasis::Previous), Some(10.0));
        assert_eq!(tracker.observe("X", 99.0, tick(3), ChangeBasis::Previous), Some(-10.0));
        assert_eq!(tracker.baseline("X"), Some(100.0));
    }

    #[test]
    fn symbols_are_independent() {
        let mut tracker = Tracker::new();
        tracker.record_fetch("A", 1.0, tick(1));
        tracker.record_fetch("B", 3.0, tick(1));
        tracker.record_fetch("B", 5.0, tick(2));

        assert_eq!(tracker.average("A"), 1.0);
        assert_eq!(tracker.average("B"), 4.0);
    }
}

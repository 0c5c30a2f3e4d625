use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::log_store::LogEntry;
use crate::tracker::Tracker;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed log {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEntry {
    pub company: String,
    pub symbol: String,
    pub average_price: f64,
    pub min_price: f64,
    pub min_time: DateTime<Utc>,
    pub max_price: f64,
    pub max_time: DateTime<Utc>,
}

/// Per-symbol aggregates over a whole log, in first-seen order. Symbols that
/// never had a price are left out.
pub fn summarize(entries: &[LogEntry]) -> Vec<SummaryEntry> {
    let mut tracker = Tracker::new();
    let mut order: Vec<(&str, &str)> = Vec::new();

    for entry in entries {
        for stock in &entry.stocks {
            if !order.iter().any(|(symbol, _)| *symbol == stock.symbol) {
                order.push((stock.symbol.as_str(), stock.company.as_str()));
            }
            if let Some(price) = stock.price.filter(|p| p.is_finite()) {
                tracker.record_fetch(&stock.symbol, price, entry.timestamp);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|(symbol, company)| {
            let stats = tracker.stats(symbol)?;
            Some(SummaryEntry {
                company: company.to_string(),
                symbol: symbol.to_string(),
                average_price: stats.average,
                min_price: stats.min,
                min_time: stats.min_at,
                max_price: stats.max,
                max_time: stats.max_at,
            })
        })
        .collect()
}

pub async fn load_log(path: &Path) -> Result<Vec<LogEntry>, SummaryError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| SummaryError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_slice(&bytes).map_err(|source| SummaryError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads the log at `log_path`, writes the summary to `summary_path` and
/// returns it. Nothing is written when the log cannot be parsed.
pub async fn run_summary(
    log_path: &Path,
    summary_path: &Path,
) -> Result<Vec<SummaryEntry>, SummaryError> {
    let entries = load_log(log_path).await?;
    let summary = summarize(&entries);

    let write_err = |source: std::io::Error| SummaryError::Write {
        path: summary_path.to_path_buf(),
        source,
    };
    let bytes = serde_json::to_vec_pretty(&summary).map_err(|e| write_err(e.into()))?;
    tokio::fs::write(summary_path, bytes).await.map_err(write_err)?;

    tracing::info!(
        log = %log_path.display(),
        summary = %summary_path.display(),
        cycles = entries.len(),
        symbols = summary.len(),
        "summary written"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_store::StockRecord;
    use chrono::TimeZone;

    fn at(n: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + n, 0).unwrap()
    }

    fn entry(n: i64, prices: &[(&str, Option<f64>)]) -> LogEntry {
        LogEntry {
            timestamp: at(n),
            stocks: prices
                .iter()
                .map(|(symbol, price)| StockRecord {
                    company: format!("{} Corp", symbol),
                    symbol: symbol.to_string(),
                    price: *price,
                    currency: "SEK".into(),
                    percent_change: None,
                })
                .collect(),
        }
    }

    #[test]
    fn skips_missing_prices() {
        let log = vec![
            entry(1, &[("X", Some(100.0)), ("DEAD", None)]),
            entry(2, &[("X", Some(110.0)), ("DEAD", None)]),
            entry(3, &[("X", None), ("DEAD", None)]),
            entry(4, &[("X", Some(90.0)), ("DEAD", None)]),
        ];

        let summary = summarize(&log);
        assert_eq!(summary.len(), 1);

        let x = &summary[0];
        assert_eq!(x.company, "X Corp");
        assert_eq!(x.average_price, 100.0);
        assert_eq!((x.min_price, x.min_time), (90.0, at(4)));
        assert_eq!((x.max_price, x.max_time), (110.0, at(2)));
    }

    #[test]
    fn keeps_first_seen_order() {
        let log = vec![
            entry(1, &[("B", Some(1.0)), ("A", None)]),
            entry(2, &[("B", Some(2.0)), ("A", Some(3.0))]),
        ];

        let symbols: Vec<_> = summarize(&log).into_iter().map(|e| e.symbol).collect();
        assert_eq!(symbols, vec!["B", "A"]);
    }

    #[test]
    fn empty_log_has_empty_summary() {
        assert!(summarize(&[]).is_empty());
    }

    #[test]
    fn serializes_wire_names() {
        let summary = summarize(&[entry(1, &[("X", Some(5.0))])]);
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json[0]["averagePrice"], 5.0);
        assert!(json[0]["minTime"].is_string());
        assert!(json[0]["maxPrice"].is_number());
    }
}

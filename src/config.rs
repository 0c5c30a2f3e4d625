use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;

use crate::render::{RenderOptions, RenderPolicy, ScreenMode};
use crate::tracker::ChangeBasis;

/// Tracked when `TRACKED_SYMBOLS` is not set.
pub const DEFAULT_SYMBOLS: &[(&str, &str)] = &[
    ("Apple", "AAPL"),
    ("Microsoft", "MSFT"),
    ("Nvidia", "NVDA"),
    ("Tesla", "TSLA"),
];

pub const DEFAULT_API_URL: &str = "https://api.twelvedata.com";
pub const DEFAULT_LOG_PATH: &str = "daily_log.json";
pub const DEFAULT_SUMMARY_PATH: &str = "summary.json";
pub const DEFAULT_TZ: &str = "Europe/Stockholm";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedSymbol {
    pub display_name: String,
    pub symbol: String,
}

impl TrackedSymbol {
    pub fn new(display_name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            symbol: symbol.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    Rest {
        base_url: String,
        api_key: String,
        /// Query parameter carrying the key. `None` sends a bearer header.
        key_param: Option<String>,
        timeout: Duration,
    },
    Yahoo,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub symbols: Vec<TrackedSymbol>,
    pub provider: ProviderConfig,
    pub target_currency: Option<String>,
    pub poll_interval: Duration,
    pub change_basis: ChangeBasis,
    pub render: RenderOptions,
    pub display_tz: Tz,
    pub log_path: PathBuf,
    pub summary_path: PathBuf,
    pub clear_log_on_exit: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable lookup, so tests don't have to touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| value(&lookup, name);

        let symbols = match get("TRACKED_SYMBOLS") {
            Some(raw) => parse_symbols(&raw)?,
            None => DEFAULT_SYMBOLS
                .iter()
                .map(|(name, symbol)| TrackedSymbol::new(*name, *symbol))
                .collect(),
        };

        let provider = match get("QUOTE_PROVIDER").as_deref().unwrap_or("rest") {
            "rest" => ProviderConfig::Rest {
                base_url: get("STOCK_API_URL")
                    .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                api_key: get("STOCK_API_KEY").ok_or(ConfigError::Missing("STOCK_API_KEY"))?,
                key_param: get("STOCK_API_KEY_PARAM"),
                timeout: Duration::from_secs(parse_positive(
                    "REQUEST_TIMEOUT_SECS",
                    get("REQUEST_TIMEOUT_SECS"),
                    10,
                )?),
            },
            "yahoo" => ProviderConfig::Yahoo,
            other => {
                return Err(invalid(
                    "QUOTE_PROVIDER",
                    format!("expected `rest` or `yahoo`, got `{}`", other),
                ))
            }
        };

        let change_basis = match get("CHANGE_BASIS").as_deref().unwrap_or("baseline") {
            "baseline" => ChangeBasis::Baseline,
            "previous" => ChangeBasis::Previous,
            other => {
                return Err(invalid(
                    "CHANGE_BASIS",
                    format!("expected `baseline` or `previous`, got `{}`", other),
                ))
            }
        };

        let policy = match get("RENDER_POLICY").as_deref().unwrap_or("all") {
            "all" => RenderPolicy::All,
            "threshold" => {
                let threshold = match get("RENDER_THRESHOLD") {
                    Some(raw) => raw
                        .parse::<f64>()
                        .ok()
                        .filter(|t| t.is_finite() && *t >= 0.0)
                        .ok_or_else(|| {
                            invalid("RENDER_THRESHOLD", format!("`{}` is not a percentage", raw))
                        })?,
                    None => 0.05,
                };
                RenderPolicy::Threshold(threshold)
            }
            other => {
                return Err(invalid(
                    "RENDER_POLICY",
                    format!("expected `all` or `threshold`, got `{}`", other),
                ))
            }
        };

        let screen = match get("SCREEN_MODE").as_deref().unwrap_or("append") {
            "append" => ScreenMode::Append,
            "clear" => ScreenMode::Clear,
            other => {
                return Err(invalid(
                    "SCREEN_MODE",
                    format!("expected `append` or `clear`, got `{}`", other),
                ))
            }
        };

        let files = SummarySettings::from_lookup(&lookup)?;

        let clear_log_on_exit = match get("CLEAR_LOG_ON_EXIT") {
            Some(raw) => raw
                .parse::<bool>()
                .map_err(|_| invalid("CLEAR_LOG_ON_EXIT", format!("`{}` is not a bool", raw)))?,
            None => true,
        };

        Ok(Self {
            symbols,
            provider,
            target_currency: get("TARGET_CURRENCY").map(|c| c.to_uppercase()),
            poll_interval: Duration::from_secs(parse_positive(
                "POLL_INTERVAL_SECS",
                get("POLL_INTERVAL_SECS"),
                10,
            )?),
            change_basis,
            render: RenderOptions { policy, screen },
            display_tz: files.display_tz,
            log_path: files.log_path,
            summary_path: files.summary_path,
            clear_log_on_exit,
        })
    }
}

/// Blank and whitespace-only variables count as unset.
fn value<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The part of the config the standalone summary needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarySettings {
    pub log_path: PathBuf,
    pub summary_path: PathBuf,
    pub display_tz: Tz,
}

impl SummarySettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let display_tz = value(&lookup, "DISPLAY_TZ")
            .unwrap_or_else(|| DEFAULT_TZ.to_string())
            .parse::<Tz>()
            .map_err(|e| invalid("DISPLAY_TZ", e.to_string()))?;

        Ok(Self {
            log_path: value(&lookup, "LOG_PATH")
                .unwrap_or_else(|| DEFAULT_LOG_PATH.to_string())
                .into(),
            summary_path: value(&lookup, "SUMMARY_PATH")
                .unwrap_or_else(|| DEFAULT_SUMMARY_PATH.to_string())
                .into(),
            display_tz,
        })
    }
}

fn parse_positive(name: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(invalid(name, format!("`{}` is not a positive integer", raw))),
        },
    }
}

/// Parses `Name:SYM,Name:SYM`. A bare `SYM` uses the ticker as its name.
pub fn parse_symbols(raw: &str) -> Result<Vec<TrackedSymbol>, ConfigError> {
    let mut symbols = Vec::new();

    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, symbol) = match item.rsplit_once(':') {
            Some((name, symbol)) => (name.trim(), symbol.trim()),
            None => (item, item),
        };

        if symbol.is_empty() || name.is_empty() {
            return Err(invalid("TRACKED_SYMBOLS", format!("malformed entry `{}`", item)));
        }
        if symbols.iter().any(|s: &TrackedSymbol| s.symbol == symbol) {
            return Err(invalid("TRACKED_SYMBOLS", format!("`{}` is listed twice", symbol)));
        }

        symbols.push(TrackedSymbol::new(name, symbol));
    }

    if symbols.is_empty() {
        return Err(invalid("TRACKED_SYMBOLS", "no symbols given"));
    }

    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn rest_provider_requires_api_key() {
        assert_eq!(
            config(&[]).unwrap_err(),
            ConfigError::Missing("STOCK_API_KEY")
        );
    }

    #[test]
    fn yahoo_provider_needs_no_key() {
        let config = config(&[("QUOTE_PROVIDER", "yahoo")]).unwrap();
        assert_eq!(config.provider, ProviderConfig::Yahoo);
        assert_eq!(config.symbols.len(), DEFAULT_SYMBOLS.len());
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.change_basis, ChangeBasis::Baseline);
        assert_eq!(config.render.policy, RenderPolicy::All);
        assert!(config.clear_log_on_exit);
    }

    #[test]
    fn reads_rest_settings() {
        let config = config(&[
            ("STOCK_API_KEY", "secret"),
            ("STOCK_API_URL", "http://localhost:8080/"),
            ("TRACKED_SYMBOLS", "Volvo B:VOLV-B.ST, Ericsson:ERIC-B.ST"),
            ("TARGET_CURRENCY", "sek"),
            ("RENDER_POLICY", "threshold"),
            ("POLL_INTERVAL_SECS", "15"),
        ])
        .unwrap();

        match config.provider {
            ProviderConfig::Rest {
                base_url, api_key, ..
            } => {
                assert_eq!(base_url, "http://localhost:8080");
                assert_eq!(api_key, "secret");
            }
            other => panic!("unexpected provider {:?}", other),
        }
        assert_eq!(config.target_currency.as_deref(), Some("SEK"));
        assert_eq!(config.render.policy, RenderPolicy::Threshold(0.05));
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.symbols[0], TrackedSymbol::new("Volvo B", "VOLV-B.ST"));
    }

    #[test]
    fn rejects_zero_interval() {
        let err = config(&[("QUOTE_PROVIDER", "yahoo"), ("POLL_INTERVAL_SECS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "POLL_INTERVAL_SECS", .. }));
    }

    #[test]
    fn rejects_unknown_timezone() {
        let err = config(&[("QUOTE_PROVIDER", "yahoo"), ("DISPLAY_TZ", "Mars/Olympus")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "DISPLAY_TZ", .. }));
    }

    #[test]
    fn blank_summary_settings_fall_back_to_defaults() {
        let vars: HashMap<&str, &str> = [("DISPLAY_TZ", ""), ("LOG_PATH", "  "), ("SUMMARY_PATH", "out.json ")]
            .into_iter()
            .collect();
        let settings = SummarySettings::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(settings.display_tz, chrono_tz::Europe::Stockholm);
        assert_eq!(settings.log_path, PathBuf::from(DEFAULT_LOG_PATH));
        assert_eq!(settings.summary_path, PathBuf::from("out.json"));

        let config = config(&[("QUOTE_PROVIDER", "yahoo"), ("DISPLAY_TZ", " ")]).unwrap();
        assert_eq!(config.display_tz, settings.display_tz);
    }

    #[test]
    fn parses_bare_and_named_symbols() {
        let symbols = parse_symbols("AAPL, Microsoft:MSFT").unwrap();
        assert_eq!(symbols[0], TrackedSymbol::new("AAPL", "AAPL"));
        assert_eq!(symbols[1], TrackedSymbol::new("Microsoft", "MSFT"));
    }

    #[test]
    fn rejects_duplicate_symbols() {
        assert!(parse_symbols("AAPL,Apple:AAPL").is_err());
        assert!(parse_symbols(" , ").is_err());
    }
}

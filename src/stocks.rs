use async_trait::async_trait;
use chrono::offset::Utc;
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use yahoo_finance_api as yahoo;

use crate::config::ProviderConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub price: f64,
    pub currency: String,
}

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("rate limited")]
    RateLimited,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid price: {0}")]
    InvalidPrice(f64),

    #[error("missing data: {0}")]
    MissingData(String),
}

/// Where prices and conversion rates come from.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError>;

    /// Units of `to` for one unit of `from`.
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<f64, QuoteError>;
}

pub fn from_config(provider: &ProviderConfig) -> Result<Box<dyn QuoteSource>, QuoteError> {
    Ok(match provider {
        ProviderConfig::Rest {
            base_url,
            api_key,
            key_param,
            timeout,
        } => {
            let client = reqwest::Client::builder()
                .timeout(*timeout)
                .build()
                .map_err(|e| QuoteError::Network(e.to_string()))?;
            Box::new(RestSource {
                client,
                base_url: base_url.clone(),
                api_key: api_key.clone(),
                key_param: key_param.clone(),
            })
        }
        ProviderConfig::Yahoo => Box::new(YahooSource::new()?),
    })
}

fn finite(value: f64) -> Result<f64, QuoteError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(QuoteError::InvalidPrice(value))
    }
}

// Quote APIs disagree on whether numbers are sent as numbers or strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

fn numeric<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Numeric>::deserialize(deserializer)? {
        Some(Numeric::Number(n)) => Some(n),
        Some(Numeric::Text(s)) => Some(s.trim().parse().map_err(serde::de::Error::custom)?),
        None => None,
    })
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default, alias = "close", deserialize_with = "numeric")]
    price: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RateResponse {
    #[serde(default, deserialize_with = "numeric")]
    rate: Option<f64>,
    #[serde(default)]
    message: Option<String>,
}

fn parse_quote(body: &[u8]) -> Result<Quote, QuoteError> {
    let body: QuoteResponse =
        serde_json::from_slice(body).map_err(|e| QuoteError::Parse(e.to_string()))?;

    let price = match (body.price, body.message) {
        (Some(price), _) => finite(price)?,
        (None, Some(message)) => return Err(QuoteError::MissingData(message)),
        (None, None) => return Err(QuoteError::MissingData("no price in response".into())),
    };

    Ok(Quote {
        price,
        currency: body.currency.unwrap_or_default(),
    })
}

fn parse_rate(body: &[u8]) -> Result<f64, QuoteError> {
    let body: RateResponse =
        serde_json::from_slice(body).map_err(|e| QuoteError::Parse(e.to_string()))?;

    match (body.rate, body.message) {
        (Some(rate), _) if rate.is_finite() && rate > 0.0 => Ok(rate),
        (Some(rate), _) => Err(QuoteError::InvalidPrice(rate)),
        (None, Some(message)) => Err(QuoteError::MissingData(message)),
        (None, None) => Err(QuoteError::MissingData("no rate in response".into())),
    }
}

/// Generic JSON quote API authenticated with a static key.
pub struct RestSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    key_param: Option<String>,
}

impl RestSource {
    async fn get(&self, path: &str, symbol: &str) -> Result<Vec<u8>, QuoteError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.client.get(url).query(&[("symbol", symbol)]);

        request = match &self.key_param {
            Some(param) => request.query(&[(param.as_str(), self.api_key.as_str())]),
            None => request.bearer_auth(&self.api_key),
        };

        let resp = request
            .send()
            .await
            .map_err(|e| QuoteError::Network(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(QuoteError::RateLimited);
        }
        if !status.is_success() {
            return Err(QuoteError::Status(status.as_u16()));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| QuoteError::Network(e.to_string()))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl QuoteSource for RestSource {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let body = self.get("quote", symbol).await?;
        parse_quote(&body)
    }

    async fn fetch_rate(&self, from: &str, to: &str) -> Result<f64, QuoteError> {
        let pair = format!("{}/{}", from, to);
        let body = self.get("exchange_rate", &pair).await?;
        parse_rate(&body)
    }
}

trait QuoteTime {
    fn time(&self) -> Option<DateTime<Utc>>;
}

impl QuoteTime for yahoo::Quote {
    fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp as i64, 0).single()
    }
}

/// Yahoo Finance chart API. Needs no key.
pub struct YahooSource {
    connector: yahoo::YahooConnector,
}

impl YahooSource {
    pub fn new() -> Result<Self, QuoteError> {
        let connector =
            yahoo::YahooConnector::new().map_err(|e| QuoteError::Network(e.to_string()))?;
        Ok(Self { connector })
    }

    async fn latest(&self, ticker: &str) -> Result<(yahoo::Quote, String), QuoteError> {
        let response = self
            .connector
            .get_latest_quotes(ticker, "1m")
            .await
            .map_err(|e| QuoteError::Network(e.to_string()))?;

        let quote = response
            .last_quote()
            .map_err(|e| QuoteError::MissingData(e.to_string()))?;
        let currency: String = response
            .metadata()
            .ok()
            .and_then(|meta| meta.currency)
            .unwrap_or_default();

        if let Some(time) = quote.time() {
            tracing::debug!(ticker, market_time = %time, "yahoo quote");
        }

        Ok((quote, currency))
    }
}

#[async_trait]
impl QuoteSource for YahooSource {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let (quote, currency) = self.latest(symbol).await?;
        Ok(Quote {
            price: finite(quote.close)?,
            currency,
        })
    }

    async fn fetch_rate(&self, from: &str, to: &str) -> Result<f64, QuoteError> {
        let (quote, _) = self.latest(&format!("{}{}=X", from, to)).await?;
        match quote.close {
            rate if rate.is_finite() && rate > 0.0 => Ok(rate),
            rate => Err(QuoteError::InvalidPrice(rate)),
        }
    }
}

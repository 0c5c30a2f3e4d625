use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::future::join_all;

use crate::config::{Config, TrackedSymbol};
use crate::log_store::{LogEntry, LogStore, StockRecord};
use crate::render::{self, RenderOptions};
use crate::stocks::{Quote, QuoteError, QuoteSource};
use crate::tracker::{ChangeBasis, Tracker};

/// Process-lifetime state of a run: what to poll, what has been seen so far,
/// and where it is logged. Owned by the entry point.
pub struct Watcher {
    source: Box<dyn QuoteSource>,
    symbols: Vec<TrackedSymbol>,
    target_currency: Option<String>,
    basis: ChangeBasis,
    render: RenderOptions,
    display_tz: Tz,
    tracker: Tracker,
    log: LogStore,
}

impl Watcher {
    pub fn new(config: &Config, source: Box<dyn QuoteSource>) -> Self {
        Self {
            source,
            symbols: config.symbols.clone(),
            target_currency: config.target_currency.clone(),
            basis: config.change_basis,
            render: config.render,
            display_tz: config.display_tz,
            tracker: Tracker::new(),
            log: LogStore::new(config.log_path.clone()),
        }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn log(&self) -> &LogStore {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut LogStore {
        &mut self.log
    }

    /// Fetches one symbol, converting into the target currency when needed.
    async fn fetch(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let quote = self.source.fetch_quote(symbol).await?;

        match &self.target_currency {
            Some(target)
                if !quote.currency.is_empty() && !quote.currency.eq_ignore_ascii_case(target) =>
            {
                let rate = self.source.fetch_rate(&quote.currency, target).await?;
                let price = quote.price * rate;
                if !price.is_finite() {
                    return Err(QuoteError::InvalidPrice(price));
                }
                Ok(Quote {
                    price,
                    currency: target.clone(),
                })
            }
            _ => Ok(quote),
        }
    }

    /// Runs one cycle stamped `now` and returns the rendered frame. Fetch
    /// failures turn into empty fields, never into an error.
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> String {
        let first_cycle = self.log.entries().is_empty();

        let results = join_all(self.symbols.iter().map(|s| self.fetch(&s.symbol))).await;

        let mut stocks = Vec::with_capacity(self.symbols.len());
        for (tracked, result) in self.symbols.iter().zip(results) {
            let record = match result {
                Ok(quote) => {
                    let change = self
                        .tracker
                        .observe(&tracked.symbol, quote.price, now, self.basis);
                    StockRecord {
                        company: tracked.display_name.clone(),
                        symbol: tracked.symbol.clone(),
                        price: Some(quote.price),
                        currency: quote.currency,
                        percent_change: change,
                    }
                }
                Err(why) => {
                    tracing::warn!(symbol = %tracked.symbol, error = %why, "quote unavailable this cycle");
                    StockRecord {
                        company: tracked.display_name.clone(),
                        symbol: tracked.symbol.clone(),
                        price: None,
                        currency: String::new(),
                        percent_change: None,
                    }
                }
            };
            stocks.push(record);
        }

        let frame = render::render_cycle(
            &stocks,
            &self.tracker,
            now,
            self.display_tz,
            &self.render,
            first_cycle,
        );

        self.log.append(LogEntry {
            timestamp: now,
            stocks,
        });
        self.log.persist().await;

        frame
    }

    pub async fn run_cycle(&mut self) -> String {
        self.run_cycle_at(Utc::now()).await
    }
}

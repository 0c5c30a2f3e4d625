//! Terminal tables for cycles and summaries.
//!
//! Every function here is pure: the same input always yields the same text.
//! Colors wrap cells after padding, so escape codes never shift a column.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::log_store::StockRecord;
use crate::summary::SummaryEntry;
use crate::tracker::Tracker;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

const COMPANY_WIDTH: usize = 20;
const SYMBOL_WIDTH: usize = 12;
const NUMBER_WIDTH: usize = 12;
const CHANGE_WIDTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderPolicy {
    /// Every tracked symbol, every cycle.
    All,
    /// Only symbols whose absolute change exceeds this many percent. The first
    /// cycle always shows everything.
    Threshold(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenMode {
    /// Keep earlier cycles in the scrollback.
    Append,
    /// Redraw from the top each cycle.
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub policy: RenderPolicy,
    pub screen: ScreenMode,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            policy: RenderPolicy::All,
            screen: ScreenMode::Append,
        }
    }
}

impl RenderPolicy {
    pub fn shows(&self, record: &StockRecord, first_cycle: bool) -> bool {
        match self {
            RenderPolicy::All => true,
            RenderPolicy::Threshold(_) if first_cycle => true,
            RenderPolicy::Threshold(threshold) => record
                .percent_change
                .map_or(false, |change| change.abs() > *threshold),
        }
    }
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

fn price_cell(price: Option<f64>) -> String {
    match price {
        Some(price) => format!("{:>width$.2}", price, width = NUMBER_WIDTH),
        None => format!("{:>width$}", "N/A", width = NUMBER_WIDTH),
    }
}

fn change_cell(change: Option<f64>) -> String {
    let cell = match change {
        Some(change) => format!("{:>+width$.2}%", change, width = CHANGE_WIDTH - 1),
        None => format!("{:>width$}", "N/A", width = CHANGE_WIDTH),
    };

    match change {
        Some(change) if change > 0.0 => format!("{}{}{}", GREEN, cell, RESET),
        Some(change) if change < 0.0 => format!("{}{}{}", RED, cell, RESET),
        _ => cell,
    }
}

fn header(columns: &[(&str, usize, bool)]) -> String {
    let mut line = String::new();
    for (title, width, left) in columns {
        if *left {
            let _ = write!(line, "{:<width$}", title, width = *width);
        } else {
            let _ = write!(line, " {:>width$}", title, width = *width);
        }
    }
    format!("{}{}{}", BOLD, line, RESET)
}

/// One cycle's frame.
pub fn render_cycle(
    records: &[StockRecord],
    tracker: &Tracker,
    timestamp: DateTime<Utc>,
    tz: Tz,
    options: &RenderOptions,
    first_cycle: bool,
) -> String {
    let mut out = String::new();

    if options.screen == ScreenMode::Clear {
        out.push_str(CLEAR_SCREEN);
    }

    let _ = writeln!(
        out,
        "{}",
        timestamp.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z")
    );
    let _ = writeln!(
        out,
        "{}",
        header(&[
            ("Company", COMPANY_WIDTH, true),
            ("Symbol", SYMBOL_WIDTH, true),
            ("Start", NUMBER_WIDTH, false),
            ("Price", NUMBER_WIDTH, false),
            ("Change", CHANGE_WIDTH, false),
            ("Average", NUMBER_WIDTH, false),
            ("Cur", 4, false),
        ])
    );

    let mut shown = 0;
    for record in records.iter().filter(|r| options.policy.shows(r, first_cycle)) {
        shown += 1;
        let average = tracker
            .stats(&record.symbol)
            .map(|_| tracker.average(&record.symbol));
        let _ = writeln!(
            out,
            "{:<cw$}{:<sw$} {} {} {} {} {:>4}",
            truncate(&record.company, COMPANY_WIDTH - 1),
            truncate(&record.symbol, SYMBOL_WIDTH - 1),
            price_cell(tracker.baseline(&record.symbol)),
            price_cell(record.price),
            change_cell(record.percent_change),
            price_cell(average),
            truncate(&record.currency, 4),
            cw = COMPANY_WIDTH,
            sw = SYMBOL_WIDTH,
        );
    }

    if shown == 0 {
        let _ = writeln!(out, "(no changes above threshold)");
    }

    out
}

/// The end-of-run summary table.
pub fn render_summary(entries: &[SummaryEntry], tz: Tz) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{}",
        header(&[
            ("Company", COMPANY_WIDTH, true),
            ("Symbol", SYMBOL_WIDTH, true),
            ("Average", NUMBER_WIDTH, false),
            ("Min", NUMBER_WIDTH, false),
            ("At", 8, false),
            ("Max", NUMBER_WIDTH, false),
            ("At", 8, false),
        ])
    );

    for entry in entries {
        let _ = writeln!(
            out,
            "{:<cw$}{:<sw$} {} {} {:>8} {} {:>8}",
            truncate(&entry.company, COMPANY_WIDTH - 1),
            truncate(&entry.symbol, SYMBOL_WIDTH - 1),
            price_cell(Some(entry.average_price)),
            price_cell(Some(entry.min_price)),
            entry.min_time.with_timezone(&tz).format("%H:%M:%S"),
            price_cell(Some(entry.max_price)),
            entry.max_time.with_timezone(&tz).format("%H:%M:%S"),
            cw = COMPANY_WIDTH,
            sw = SYMBOL_WIDTH,
        );
    }

    if entries.is_empty() {
        let _ = writeln!(out, "(no successful quotes recorded)");
    }

    out
}

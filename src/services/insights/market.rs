use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Utc};

use super::types::{Candle, Granularity, MarketFieldMap};
use super::utils::{format_date, is_missing, parse_number, parse_timestamp, sort_key};
use crate::config::InsightConfig;
use crate::models::SampleRow;

#[derive(Debug, Clone)]
struct PricedRow {
    timestamp: Option<DateTime<Utc>>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl PricedRow {
    fn from_row(row: &SampleRow, fields: &MarketFieldMap) -> Option<Self> {
        if is_missing(row.get(&fields.open)) {
            return None;
        }
        let value = |col: &str| row.get(col).map(parse_number).unwrap_or(0.0);
        Some(Self {
            timestamp: fields
                .date
                .as_deref()
                .and_then(|d| row.get(d))
                .and_then(parse_timestamp),
            open: value(&fields.open),
            high: value(&fields.high),
            low: value(&fields.low),
            close: value(&fields.close),
        })
    }
}

/// Bucket key (sortable) and display label for a timestamp. `None` when the
/// bucket start falls outside the representable range.
pub fn bucket_key(ts: &DateTime<Utc>, granularity: Granularity) -> Option<(String, String)> {
    let key = match granularity {
        Granularity::Day => (format_date(ts), format_date(ts)),
        Granularity::Week => {
            let start = week_start(ts)?;
            (format_date(&start), format!("Wk {}", start.format("%b %-d")))
        }
        Granularity::Month => (ts.format("%Y-%m").to_string(), ts.format("%b %Y").to_string()),
        Granularity::Year => {
            let year = ts.year().to_string();
            (year.clone(), year)
        }
    };
    Some(key)
}

/// The Sunday on or before `ts`.
pub fn week_start(ts: &DateTime<Utc>) -> Option<DateTime<Utc>> {
    ts.checked_sub_signed(Duration::days(i64::from(ts.weekday().num_days_from_sunday())))
}

#[derive(Debug, Clone)]
pub struct MarketAggregator {
    day_candle_limit: usize,
}

impl Default for MarketAggregator {
    fn default() -> Self {
        Self::from_config(&InsightConfig::default())
    }
}

impl MarketAggregator {
    pub fn new(day_candle_limit: usize) -> Self {
        Self { day_candle_limit }
    }

    pub fn from_config(config: &InsightConfig) -> Self {
        Self::new(config.day_candle_limit)
    }

    pub fn aggregate(
        &self,
        rows: &[SampleRow],
        fields: &MarketFieldMap,
        granularity: Granularity,
    ) -> Vec<Candle> {
        let mut priced: Vec<PricedRow> = rows
            .iter()
            .filter_map(|row| PricedRow::from_row(row, fields))
            .collect();
        priced.sort_by_key(|r| sort_key(r.timestamp.as_ref()));

        if priced.is_empty() {
            return Vec::new();
        }

        let candles = if granularity == Granularity::Day || fields.date.is_none() {
            self.per_row(&priced)
        } else {
            bucketed(&priced, granularity)
        };

        tracing::debug!(
            "Aggregated {} of {} rows into {} {} candles",
            priced.len(),
            rows.len(),
            candles.len(),
            granularity
        );
        candles
    }

    fn per_row(&self, sorted: &[PricedRow]) -> Vec<Candle> {
        let skip = sorted.len().saturating_sub(self.day_candle_limit);
        sorted[skip..]
            .iter()
            .enumerate()
            .map(|(i, r)| Candle {
                bucket_label: r
                    .timestamp
                    .as_ref()
                    .map(format_date)
                    .unwrap_or_else(|| format!("P{}", i)),
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
            })
            .collect()
    }
}

fn bucketed(sorted: &[PricedRow], granularity: Granularity) -> Vec<Candle> {
    let mut buckets: BTreeMap<String, Candle> = BTreeMap::new();

    for row in sorted {
        let Some(ts) = row.timestamp.as_ref() else {
            continue;
        };
        let Some((key, label)) = bucket_key(ts, granularity) else {
            continue;
        };
        buckets
            .entry(key)
            .and_modify(|c| {
                c.high = c.high.max(row.high);
                c.low = c.low.min(row.low);
                c.close = row.close;
            })
            .or_insert_with(|| Candle {
                bucket_label: label,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
            });
    }

    buckets.into_values().collect()
}

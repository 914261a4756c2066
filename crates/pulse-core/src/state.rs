//! Shared market state: the single source of truth for the published file.
//!
//! Two producers write here concurrently: the periodic summary fetcher
//! ([`upsert_summary`](SharedMarketState::upsert_summary)) and the trade stream
//! ([`apply_trade`](SharedMarketState::apply_trade)). Both take the same lock
//! over the whole map, so a record is always replaced or merged as a unit and
//! [`read_snapshot`](SharedMarketState::read_snapshot) can never see half of
//! an update.
//!
//! Merge rules:
//!
//! | field        | summary                         | trade                    |
//! |--------------|---------------------------------|--------------------------|
//! | `raw_volume` | seeds it on first sight only    | `+= volume`              |
//! | `volume_24h` | re-rendered from `raw_volume`   | re-rendered              |
//! | `price`      | overwritten (class precision)   | overwritten (5 decimals) |
//! | other fields | overwritten                     | untouched                |

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::format;
use crate::types::{MarketSnapshot, SummaryUpdate, SymbolMetrics, TrackedSymbols};

#[derive(Debug, Default)]
struct Inner {
    /// Kept sorted so a snapshot is a plain clone in output order.
    metrics: BTreeMap<String, SymbolMetrics>,
    news: Option<Vec<String>>,
}

/// Synchronized symbol → metrics map plus the news ticker.
///
/// Wrap in an `Arc` to share between the fetcher, the stream consumer and the
/// publisher. The map itself is never handed out.
#[derive(Debug)]
pub struct SharedMarketState {
    tracked: TrackedSymbols,
    max_headlines: usize,
    inner: Mutex<Inner>,
}

impl SharedMarketState {
    /// Default number of headlines kept by [`replace_news`](Self::replace_news).
    pub const MAX_HEADLINES: usize = 10;

    pub fn new(tracked: TrackedSymbols) -> Self {
        Self::with_max_headlines(tracked, Self::MAX_HEADLINES)
    }

    pub fn with_max_headlines(tracked: TrackedSymbols, max_headlines: usize) -> Self {
        Self { tracked, max_headlines, inner: Mutex::new(Inner::default()) }
    }

    /// The configured symbol set.
    pub fn tracked(&self) -> &TrackedSymbols {
        &self.tracked
    }

    #[inline]
    pub fn is_tracked(&self, symbol: &str) -> bool {
        self.tracked.contains(symbol)
    }

    // Every critical section below is a plain field update, so a poisoned lock
    // still guards a consistent map.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge a periodic summary into `symbol`'s record.
    ///
    /// Creates the record (seeding `raw_volume` from `summary.volume`) the
    /// first time the symbol is seen; afterwards `summary.volume` is ignored
    /// so accumulated trade volume is never overwritten. A negative or
    /// non-finite seed counts as `0.0`.
    ///
    /// Returns `false` without touching the state if `symbol` is not tracked.
    pub fn upsert_summary(&self, symbol: &str, summary: SummaryUpdate) -> bool {
        if !self.is_tracked(symbol) {
            return false;
        }

        let mut inner = self.lock();
        let SummaryUpdate { volume, price, open_24h, prev_close, day_range, change_24h } = summary;
        match inner.metrics.get_mut(symbol) {
            Some(m) => {
                m.price = price;
                m.open_24h = open_24h;
                m.prev_close = prev_close;
                m.day_range = day_range;
                m.change_24h = change_24h;
                m.volume_24h = format::volume(m.raw_volume);
            }
            None => {
                let volume = if is_valid_volume(volume) { volume } else { 0.0 };
                inner.metrics.insert(
                    symbol.to_string(),
                    SymbolMetrics {
                        raw_volume: volume,
                        price,
                        open_24h,
                        prev_close,
                        day_range,
                        change_24h,
                        volume_24h: format::volume(volume),
                    },
                );
            }
        }
        true
    }

    /// Apply one trade execution to `symbol`'s record.
    ///
    /// No-op (returns `false`) until the symbol has received its first
    /// summary, since `raw_volume` has no base to accumulate onto before that.
    /// Trades with a negative or non-finite volume, or a non-finite price, are
    /// rejected so `raw_volume` never decreases.
    pub fn apply_trade(&self, symbol: &str, price: f64, volume: f64) -> bool {
        if !is_valid_volume(volume) || !price.is_finite() {
            return false;
        }
        let mut inner = self.lock();
        let Some(m) = inner.metrics.get_mut(symbol) else {
            return false;
        };
        m.raw_volume += volume;
        m.volume_24h = format::volume(m.raw_volume);
        m.price = format::trade_price(price);
        true
    }

    /// Replace the news ticker wholesale, keeping at most the configured
    /// number of headlines.
    pub fn replace_news(&self, mut headlines: Vec<String>) {
        headlines.truncate(self.max_headlines);
        self.lock().news = Some(headlines);
    }

    /// Consistent owned copy of every record (sorted by symbol) and the news
    /// ticker.
    ///
    /// The lock is held only for the clone; callers serialize and write
    /// without blocking the producers.
    pub fn read_snapshot(&self) -> MarketSnapshot {
        let inner = self.lock();
        MarketSnapshot { symbols: inner.metrics.clone(), news_ticker: inner.news.clone() }
    }

    /// Copy of a single record.
    pub fn metrics(&self, symbol: &str) -> Option<SymbolMetrics> {
        self.lock().metrics.get(symbol).cloned()
    }

    /// Current news ticker, if one was ever fetched.
    pub fn news(&self) -> Option<Vec<String>> {
        self.lock().news.clone()
    }

    /// Number of symbols that have a record.
    pub fn len(&self) -> usize {
        self.lock().metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A volume that may be added to `raw_volume`.
#[inline]
pub fn is_valid_volume(volume: f64) -> bool {
    volume.is_finite() && volume >= 0.0
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::PriceClass;

    const BTC: &str = "BINANCE:BTCUSDT";
    const DOGE: &str = "BINANCE:DOGEUSDT";

    fn state() -> SharedMarketState {
        SharedMarketState::new(TrackedSymbols::new([BTC, DOGE], [DOGE]))
    }

    fn summary(volume: f64, price: f64) -> SummaryUpdate {
        let class = PriceClass::Standard;
        SummaryUpdate {
            volume,
            price: format::quote_price(price, class),
            open_24h: format::dollars(price - 1.0, class),
            prev_close: price - 2.0,
            day_range: format::day_range(price - 5.0, price + 5.0, class),
            change_24h: format::change(1.0),
        }
    }

    #[test]
    fn first_summary_seeds_raw_volume() {
        let st = state();
        assert!(st.upsert_summary(BTC, summary(1500.25, 100.0)));

        let m = st.metrics(BTC).unwrap();
        assert_eq!(m.raw_volume, 1500.25);
        assert_eq!(m.volume_24h, "1,500.25");
        assert_eq!(m.price, "100.00");
    }

    #[test]
    fn later_summaries_do_not_reset_volume() {
        let st = state();
        st.upsert_summary(BTC, summary(1000.0, 100.0));
        st.apply_trade(BTC, 101.0, 5.0);
        st.upsert_summary(BTC, summary(99999.0, 102.0));

        let m = st.metrics(BTC).unwrap();
        assert_eq!(m.raw_volume, 1005.0);
        assert_eq!(m.volume_24h, "1,005.00");
        assert_eq!(m.price, "102.00");
        assert_eq!(m.open_24h, "$101.00");
    }

    #[test]
    fn trades_accumulate_on_seed() {
        let st = state();
        st.upsert_summary(BTC, summary(100.0, 50.0));
        for v in [0.5, 1.25, 2.25] {
            assert!(st.apply_trade(BTC, 51.123456, v));
        }

        let m = st.metrics(BTC).unwrap();
        assert_eq!(m.raw_volume, 104.0);
        assert_eq!(m.volume_24h, "104.00");
        assert_eq!(m.price, "51.12346");
    }

    #[test]
    fn summary_after_trade_keeps_both() {
        let st = state();
        st.upsert_summary(BTC, summary(10.0, 50.0));
        st.apply_trade(BTC, 60.0, 2.0);
        assert_eq!(st.metrics(BTC).unwrap().price, "60.00000");

        st.upsert_summary(BTC, summary(10.0, 55.0));
        let m = st.metrics(BTC).unwrap();
        assert_eq!(m.raw_volume, 12.0);
        assert_eq!(m.price, "55.00");
    }

    #[test]
    fn trade_before_first_summary_is_ignored() {
        let st = state();
        assert!(!st.apply_trade(BTC, 1.0, 1.0));
        assert!(st.is_empty());
    }

    #[test]
    fn negative_or_non_finite_trades_are_rejected() {
        let st = state();
        st.upsert_summary(BTC, summary(100.0, 50.0));

        assert!(!st.apply_trade(BTC, 51.0, -40.0));
        assert!(!st.apply_trade(BTC, 51.0, f64::NAN));
        assert!(!st.apply_trade(BTC, 51.0, f64::INFINITY));
        assert!(!st.apply_trade(BTC, f64::NAN, 1.0));
        assert!(st.apply_trade(BTC, 52.0, 5.0));

        let m = st.metrics(BTC).unwrap();
        assert_eq!(m.raw_volume, 105.0);
        assert_eq!(m.volume_24h, "105.00");
        assert_eq!(m.price, "52.00000");
    }

    #[test]
    fn invalid_seed_volume_counts_as_zero() {
        let st = state();
        st.upsert_summary(BTC, summary(f64::NAN, 50.0));
        st.upsert_summary(DOGE, summary(-3.0, 0.1));

        assert_eq!(st.metrics(BTC).unwrap().raw_volume, 0.0);
        assert_eq!(st.metrics(DOGE).unwrap().volume_24h, "0.00");
    }

    #[test]
    fn snapshot_is_sorted_by_symbol() {
        let st = state();
        st.upsert_summary(DOGE, summary(1.0, 0.1));
        st.upsert_summary(BTC, summary(1.0, 50.0));

        let keys: Vec<_> = st.read_snapshot().symbols.into_keys().collect();
        assert_eq!(keys, vec![BTC.to_string(), DOGE.to_string()]);
    }

    #[test]
    fn untracked_symbols_never_enter() {
        let st = state();
        assert!(!st.upsert_summary("BINANCE:XRPUSDT", summary(1.0, 1.0)));
        assert!(!st.apply_trade("BINANCE:XRPUSDT", 1.0, 1.0));
        assert!(st.read_snapshot().is_empty());
    }

    #[test]
    fn news_is_truncated_and_replaced() {
        let st = state();
        assert!(st.news().is_none());

        st.replace_news((0..15).map(|i| format!("h{i}")).collect());
        let news = st.news().unwrap();
        assert_eq!(news.len(), 10);
        assert_eq!(news[0], "h0");

        st.replace_news(vec!["only".into()]);
        assert_eq!(st.read_snapshot().news_ticker, Some(vec!["only".to_string()]));
    }

    #[test]
    fn concurrent_trades_are_not_lost() {
        let st = Arc::new(state());
        st.upsert_summary(BTC, summary(0.0, 1.0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let st = Arc::clone(&st);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        st.apply_trade(BTC, 1.0, 1.0);
                    }
                })
            })
            .collect();
        for _ in 0..50 {
            st.upsert_summary(BTC, summary(123.0, 1.0));
        }
        for h in handles {
            h.join().unwrap();
        }

        let m = st.metrics(BTC).unwrap();
        assert_eq!(m.raw_volume, 8000.0);
        assert_eq!(m.volume_24h, "8,000.00");
    }

    #[test]
    fn snapshot_volume_always_matches_raw() {
        let st = Arc::new(state());
        st.upsert_summary(BTC, summary(0.0, 1.0));

        let writer = {
            let st = Arc::clone(&st);
            std::thread::spawn(move || {
                for _ in 0..2000 {
                    st.apply_trade(BTC, 2.0, 0.5);
                }
            })
        };
        for _ in 0..200 {
            let snap = st.read_snapshot();
            let m = snap.get(BTC).unwrap();
            assert_eq!(m.volume_24h, format::volume(m.raw_volume));
        }
        writer.join().unwrap();
    }
}

use std::collections::VecDeque;

use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::config::SessionConfig;
use crate::engine::PriceEngine;
use crate::error::{EngineError, EngineResult};
use crate::types::{AssetClass, DepositView, QuoteView, TickReport, HISTORY_LEN, PRICE_FLOOR};

// ─── Quotes ───────────────────────────────────────────────────────────────────

/// Live pricing state of one oscillating asset.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetQuote {
    pub name: String,
    pub class: AssetClass,
    pub current: f64,
    /// Price at the start of the last tick
    pub previous: f64,
    pub baseline: f64,
    pub volatility: f64,
    history: VecDeque<f64>,
}

impl AssetQuote {
    pub fn new(name: &str, class: AssetClass, price: f64, baseline: f64, volatility: f64) -> Self {
        let mut history = VecDeque::with_capacity(HISTORY_LEN);
        history.push_back(price);
        Self {
            name: name.to_string(),
            class,
            current: price,
            previous: price,
            baseline,
            volatility,
            history,
        }
    }

    /// Set the current price, clamped to the floor.
    #[inline]
    pub fn set_price(&mut self, price: f64) {
        self.current = price.max(PRICE_FLOOR);
    }

    #[inline]
    pub fn delta(&self) -> f64 {
        self.current - self.previous
    }

    /// Oldest first, at most `HISTORY_LEN` samples.
    pub fn history(&self) -> &VecDeque<f64> {
        &self.history
    }

    fn record(&mut self) {
        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(self.current);
    }
}

/// A fixed-income deposit. Its balance is money, not a unit count.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedIncomeBalance {
    pub name: String,
    pub label: String,
    pub rate: f64,
    pub balance: f64,
}

impl FixedIncomeBalance {
    pub fn compound(&mut self) {
        self.balance *= 1.0 + self.rate;
    }
}

// ─── MarketState ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct MarketState {
    quotes: Vec<AssetQuote>,
    fixed_income: Vec<FixedIncomeBalance>,
    /// Ticks since the last compounding
    cycle: u32,
    period: u32,
}

impl MarketState {
    pub fn from_config(config: &SessionConfig) -> Self {
        let quotes = config
            .assets
            .iter()
            .map(|a| AssetQuote::new(&a.name, a.class, a.initial_price, a.baseline(), a.volatility()))
            .collect();
        let fixed_income = config
            .fixed_income
            .iter()
            .map(|f| FixedIncomeBalance {
                name: f.name.clone(),
                label: f.label.clone(),
                rate: f.rate,
                balance: 0.0,
            })
            .collect();

        Self {
            quotes,
            fixed_income,
            cycle: 0,
            period: config.compounding_period_ticks,
        }
    }

    /// Advance one tick: roll previous prices, let `engine` move the market,
    /// then append every new price to its history.
    pub fn tick(&mut self, engine: &dyn PriceEngine, rng: &mut ChaCha8Rng) -> TickReport {
        for q in &mut self.quotes {
            q.previous = q.current;
        }
        self.cycle += 1;

        let report = engine.advance(self, rng);

        for q in &mut self.quotes {
            q.set_price(q.current);
            q.record();
        }
        debug!(cycle = self.cycle, compounded = report.compounded, "market advanced");
        report
    }

    /// Compound every fixed-income balance once the cycle counter reaches the
    /// period, resetting the counter. Returns whether compounding happened.
    pub fn compound_if_due(&mut self) -> bool {
        if self.cycle < self.period {
            return false;
        }
        for fi in &mut self.fixed_income {
            fi.compound();
        }
        self.cycle = 0;
        true
    }

    pub fn snapshot(&self) -> Vec<QuoteView> {
        self.quotes
            .iter()
            .map(|q| QuoteView {
                asset: q.name.clone(),
                class: q.class,
                price: q.current,
                previous: q.previous,
                delta: q.delta(),
            })
            .collect()
    }

    pub fn price_of(&self, asset: &str) -> EngineResult<f64> {
        self.quote(asset).map(|q| q.current)
    }

    pub fn quote(&self, asset: &str) -> EngineResult<&AssetQuote> {
        self.quotes
            .iter()
            .find(|q| q.name == asset)
            .ok_or_else(|| EngineError::UnknownAsset(asset.to_string()))
    }

    pub fn quote_mut(&mut self, asset: &str) -> EngineResult<&mut AssetQuote> {
        self.quotes
            .iter_mut()
            .find(|q| q.name == asset)
            .ok_or_else(|| EngineError::UnknownAsset(asset.to_string()))
    }

    pub fn quotes(&self) -> &[AssetQuote] {
        &self.quotes
    }

    pub fn quotes_mut(&mut self) -> &mut [AssetQuote] {
        &mut self.quotes
    }

    pub fn fixed_income(&self, instrument: &str) -> EngineResult<&FixedIncomeBalance> {
        self.fixed_income
            .iter()
            .find(|f| f.name == instrument)
            .ok_or_else(|| EngineError::UnknownAsset(instrument.to_string()))
    }

    pub fn fixed_income_mut(&mut self, instrument: &str) -> EngineResult<&mut FixedIncomeBalance> {
        self.fixed_income
            .iter_mut()
            .find(|f| f.name == instrument)
            .ok_or_else(|| EngineError::UnknownAsset(instrument.to_string()))
    }

    pub fn instruments(&self) -> &[FixedIncomeBalance] {
        &self.fixed_income
    }

    pub fn deposits(&self) -> Vec<DepositView> {
        self.fixed_income
            .iter()
            .map(|f| DepositView {
                instrument: f.name.clone(),
                label: f.label.clone(),
                balance: f.balance,
            })
            .collect()
    }

    pub fn fixed_income_total(&self) -> f64 {
        self.fixed_income.iter().map(|f| f.balance).sum()
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    /// Fraction of the current compounding period already elapsed.
    pub fn cycle_progress(&self) -> f64 {
        self.cycle as f64 / self.period as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_evicts_oldest_beyond_bound() {
        let mut q = AssetQuote::new("X", AssetClass::Equity, 1.0, 1.0, 0.01);
        for i in 0..(HISTORY_LEN + 5) {
            q.set_price(2.0 + i as f64);
            q.record();
        }
        assert_eq!(q.history().len(), HISTORY_LEN);
        assert_eq!(*q.history().back().unwrap(), 2.0 + (HISTORY_LEN + 4) as f64);
        assert_eq!(*q.history().front().unwrap(), 2.0 + 5.0);
    }

    #[test]
    fn set_price_applies_floor() {
        let mut q = AssetQuote::new("X", AssetClass::Equity, 1.0, 1.0, 0.01);
        q.set_price(-4.0);
        assert_eq!(q.current, PRICE_FLOOR);
        q.set_price(f64::NAN);
        assert_eq!(q.current, PRICE_FLOOR);
    }

    #[test]
    fn price_of_unknown_asset_fails() {
        let market = MarketState::from_config(&SessionConfig::classic());
        assert_eq!(market.price_of("AAPL"), Ok(150.0));
        assert_eq!(
            market.price_of("NOPE"),
            Err(EngineError::UnknownAsset("NOPE".into()))
        );
        // fixed income has no quote
        assert!(market.price_of("TESOURO SELIC").is_err());
    }

    #[test]
    fn compounding_waits_for_full_period() {
        let mut market = MarketState::from_config(&SessionConfig::classic());
        market.fixed_income_mut("POUPANCA").unwrap().balance = 1000.0;

        market.cycle = 11;
        assert!(!market.compound_if_due());
        market.cycle = 12;
        assert!(market.compound_if_due());
        assert_eq!(market.cycle(), 0);
        let balance = market.fixed_income("POUPANCA").unwrap().balance;
        assert!((balance - 1005.0).abs() < 1e-9);
    }

    #[test]
    fn fresh_snapshot_has_zero_deltas() {
        let market = MarketState::from_config(&SessionConfig::arcade());
        let snap = market.snapshot();
        assert_eq!(snap.len(), 5);
        assert!(snap.iter().all(|v| v.delta == 0.0));
        assert_eq!(market.cycle_progress(), 0.0);
    }
}

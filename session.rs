//! One player's game session.
//!
//! `SessionState` owns everything a session needs: the market, the ledger, the
//! selected price policy and its seeded random source. The presentation layer
//! keeps one instance per player and drives it with `tick` on its own timer and
//! with trade commands in between. Every operation runs to completion before the
//! next one starts, so a tick never observes a half-applied trade.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::engine::PricePolicy;
use crate::error::EngineResult;
use crate::ledger::{Ledger, LedgerPolicy};
use crate::market::MarketState;
use crate::types::{DepositView, PositionView, QuoteView, TickReport, TradeReceipt};

/// Serializable picture of a session for rendering.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionView {
    pub tick: u64,
    pub running: bool,
    pub news: String,
    pub cash: f64,
    pub total_equity: f64,
    pub realized_pnl: f64,
    pub cycle: u32,
    pub period: u32,
    pub quotes: Vec<QuoteView>,
    pub positions: Vec<PositionView>,
    pub deposits: Vec<DepositView>,
}

#[derive(Clone, Debug)]
pub struct SessionState {
    config: SessionConfig,
    policy: PricePolicy,
    market: MarketState,
    ledger: Ledger,
    rng: ChaCha8Rng,
    news: String,
    running: bool,
    ticks: u64,
}

/// Build a fresh session from `config`. Fails only on invalid configuration.
pub fn initialize(config: SessionConfig) -> EngineResult<SessionState> {
    SessionState::initialize(config)
}

impl SessionState {
    pub fn initialize(config: SessionConfig) -> EngineResult<Self> {
        config.validate()?;
        let policy = PricePolicy::from_config(&config)?;
        let market = MarketState::from_config(&config);
        let ledger = Ledger::new(config.initial_cash, LedgerPolicy::from_config(&config));
        let rng = ChaCha8Rng::seed_from_u64(config.seed);

        info!(
            policy = policy.name(),
            seed = config.seed,
            assets = config.assets.len(),
            cash = config.initial_cash,
            "session initialized"
        );

        Ok(Self {
            news: config.opening_news.clone(),
            config,
            policy,
            market,
            ledger,
            rng,
            running: false,
            ticks: 0,
        })
    }

    /// Throw away all state and start over from the stored configuration.
    pub fn reset(&mut self) {
        self.market = MarketState::from_config(&self.config);
        self.ledger = Ledger::new(self.config.initial_cash, LedgerPolicy::from_config(&self.config));
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.news = self.config.opening_news.clone();
        self.running = false;
        self.ticks = 0;
        info!("session reset");
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advance the market one tick. Does nothing while the session is stopped.
    pub fn tick(&mut self) -> Option<TickReport> {
        if !self.running {
            return None;
        }
        let mut report = self.market.tick(&self.policy, &mut self.rng);
        self.ticks += 1;
        report.tick = self.ticks;
        if let Some(news) = &report.news {
            self.news = news.clone();
        }
        debug!(tick = self.ticks, "tick");
        Some(report)
    }

    /// Buy at the current market price.
    pub fn buy(&mut self, asset: &str, quantity: f64) -> EngineResult<TradeReceipt> {
        let price = self.market.price_of(asset);
        price
            .and_then(|p| self.ledger.buy(asset, quantity, p))
            .inspect_err(|e| warn!(asset, quantity, error = %e, "buy rejected"))
    }

    /// Sell at the current market price.
    pub fn sell(&mut self, asset: &str, quantity: f64) -> EngineResult<TradeReceipt> {
        let price = self.market.price_of(asset);
        price
            .and_then(|p| self.ledger.sell(asset, quantity, p))
            .inspect_err(|e| warn!(asset, quantity, error = %e, "sell rejected"))
    }

    pub fn deposit(&mut self, instrument: &str, amount: f64) -> EngineResult<()> {
        let result = match self.market.fixed_income_mut(instrument) {
            Ok(account) => self.ledger.deposit(account, amount),
            Err(e) => Err(e),
        };
        result.inspect_err(|e| warn!(instrument, amount, error = %e, "deposit rejected"))
    }

    pub fn withdraw(&mut self, instrument: &str, amount: f64) -> EngineResult<()> {
        let result = match self.market.fixed_income_mut(instrument) {
            Ok(account) => self.ledger.withdraw(account, amount),
            Err(e) => Err(e),
        };
        result.inspect_err(|e| warn!(instrument, amount, error = %e, "withdraw rejected"))
    }

    pub fn price_of(&self, asset: &str) -> EngineResult<f64> {
        self.market.price_of(asset)
    }

    pub fn snapshot(&self) -> Vec<QuoteView> {
        self.market.snapshot()
    }

    /// Cash + market value of positions + fixed-income balances.
    pub fn total_equity(&self) -> f64 {
        self.ledger.cash() + self.ledger.holdings_value(&self.market) + self.market.fixed_income_total()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            tick: self.ticks,
            running: self.running,
            news: self.news.clone(),
            cash: self.ledger.cash(),
            total_equity: self.total_equity(),
            realized_pnl: self.ledger.realized_pnl(),
            cycle: self.market.cycle(),
            period: self.market.period(),
            quotes: self.market.snapshot(),
            positions: self.ledger.position_views(&self.market),
            deposits: self.market.deposits(),
        }
    }

    pub fn market(&self) -> &MarketState {
        &self.market
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn policy(&self) -> &PricePolicy {
        &self.policy
    }

    pub fn news(&self) -> &str {
        &self.news
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Seconds the presentation layer should wait between ticks.
    pub fn tick_interval_secs(&self) -> f64 {
        self.config.tick_interval_secs
    }
}

//! Price engine.
//!
//! Two policies move the market forward one tick at a time:
//!   1. `CompoundingWalk`: each price is multiplied by `1 + u`, `u ~ U[-v, v]`
//!   2. `MeanRevertingWalk`: additive noise, occasional bot jumps and a pull back
//!      toward the baseline, plus a small chance per tick of a scripted headline
//!
//! Both pay fixed-income balances once every compounding period. The random
//! source is always passed in, so a seeded `ChaCha8Rng` replays a session exactly.

use std::fmt::Debug;

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Bernoulli, Distribution, Uniform};
use tracing::{info, warn};

use crate::config::{MeanReversionConfig, PolicyConfig, SessionConfig};
use crate::error::{EngineError, EngineResult};
use crate::market::MarketState;
use crate::types::{NewsEvent, TickReport};

pub trait PriceEngine: Debug + Send + Sync {
    /// Move every oscillating price and pay fixed income when due.
    ///
    /// The caller has already rolled `previous` prices and bumped the cycle
    /// counter; history is appended after this returns.
    fn advance(&self, market: &mut MarketState, rng: &mut ChaCha8Rng) -> TickReport;
}

// ─── Shared steps ─────────────────────────────────────────────────────────────

/// One multiplicative step: price * (1 + u), u ~ U[-volatility, volatility].
#[inline]
pub fn multiplicative_step(price: f64, volatility: f64, rng: &mut ChaCha8Rng) -> f64 {
    let u = rng.gen_range(-volatility..=volatility);
    price * (1.0 + u)
}

/// Apply a scripted event to its asset. Returns the new price.
pub fn apply_event(market: &mut MarketState, event: &NewsEvent) -> EngineResult<f64> {
    let quote = market.quote_mut(&event.asset)?;
    quote.set_price(quote.current * event.impact);
    Ok(quote.current)
}

/// Boards without fixed income still roll the cycle over but report no payout.
fn pay_fixed_income(market: &mut MarketState) -> (bool, Option<String>) {
    if !market.compound_if_due() || market.instruments().is_empty() {
        return (false, None);
    }
    let paid: Vec<String> = market
        .instruments()
        .iter()
        .map(|fi| format!("{} paid {:.2}%", fi.name, fi.rate * 100.0))
        .collect();
    let news = format!("Payday! {}.", paid.join(", "));
    info!(%news, "fixed income compounded");
    (true, Some(news))
}

// ─── Policy A ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
pub struct CompoundingWalk;

impl PriceEngine for CompoundingWalk {
    fn advance(&self, market: &mut MarketState, rng: &mut ChaCha8Rng) -> TickReport {
        let (compounded, news) = pay_fixed_income(market);

        for q in market.quotes_mut() {
            let next = multiplicative_step(q.current, q.volatility, rng);
            q.set_price(next);
        }

        TickReport {
            compounded,
            news,
            ..TickReport::default()
        }
    }
}

// ─── Policy B ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct MeanRevertingWalk {
    noise: Uniform<f64>,
    bot: Bernoulli,
    bot_jump: f64,
    reversion: f64,
    event_roll: Bernoulli,
    events: Vec<NewsEvent>,
}

impl MeanRevertingWalk {
    pub fn new(params: &MeanReversionConfig) -> EngineResult<Self> {
        let bad = |e: rand::distributions::BernoulliError| EngineError::InvalidConfiguration(e.to_string());
        // the sampled range is 2 * noise wide and must stay finite
        if !(params.noise >= 0.0 && (2.0 * params.noise).is_finite()) {
            return Err(EngineError::InvalidConfiguration(format!(
                "noise must be >= 0 and finite, got {}",
                params.noise
            )));
        }
        Ok(Self {
            noise: Uniform::new_inclusive(-params.noise, params.noise),
            bot: Bernoulli::new(params.bot_probability).map_err(bad)?,
            bot_jump: params.bot_jump,
            reversion: params.reversion,
            event_roll: Bernoulli::new(params.event_probability).map_err(bad)?,
            events: params.events.clone(),
        })
    }

    /// Additive move for one asset: noise + bot pressure + reversion pull.
    fn step(&self, price: f64, baseline: f64, rng: &mut ChaCha8Rng) -> f64 {
        let mut delta = self.noise.sample(rng);
        if self.bot.sample(rng) {
            delta += if rng.gen_bool(0.5) { self.bot_jump } else { -self.bot_jump };
        }
        delta += self.reversion * (baseline - price);
        price + delta
    }

    pub fn events(&self) -> &[NewsEvent] {
        &self.events
    }
}

impl PriceEngine for MeanRevertingWalk {
    fn advance(&self, market: &mut MarketState, rng: &mut ChaCha8Rng) -> TickReport {
        let (compounded, mut news) = pay_fixed_income(market);

        for q in market.quotes_mut() {
            let next = self.step(q.current, q.baseline, rng);
            q.set_price(next);
        }

        let mut fired = None;
        if !self.events.is_empty() && self.event_roll.sample(rng) {
            if let Some(event) = self.events.choose(rng) {
                match apply_event(market, event) {
                    Ok(price) => {
                        info!(asset = %event.asset, impact = event.impact, price, "news event");
                        news = Some(event.message.clone());
                        fired = Some(event.clone());
                    }
                    Err(e) => warn!(error = %e, "skipping news event"),
                }
            }
        }

        TickReport {
            compounded,
            event: fired,
            news,
            ..TickReport::default()
        }
    }
}

// ─── Selection ────────────────────────────────────────────────────────────────

/// The policy a session runs with, fixed at initialization.
#[derive(Clone, Debug)]
pub enum PricePolicy {
    Compounding(CompoundingWalk),
    MeanReverting(MeanRevertingWalk),
}

impl PricePolicy {
    pub fn from_config(config: &SessionConfig) -> EngineResult<Self> {
        match &config.policy {
            PolicyConfig::Compounding => Ok(Self::Compounding(CompoundingWalk)),
            PolicyConfig::MeanReverting(p) => Ok(Self::MeanReverting(MeanRevertingWalk::new(p)?)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Compounding(_) => "compounding",
            Self::MeanReverting(_) => "mean_reverting",
        }
    }
}

impl PriceEngine for PricePolicy {
    fn advance(&self, market: &mut MarketState, rng: &mut ChaCha8Rng) -> TickReport {
        match self {
            Self::Compounding(p) => p.advance(market, rng),
            Self::MeanReverting(p) => p.advance(market, rng),
        }
    }
}

//! Session configuration.
//!
//! A `SessionConfig` fully determines a fresh session: starting cash, fee and
//! tax rates, the asset board, fixed-income instruments and which price policy
//! drives the market. Two profiles ship built in (`classic`, `arcade`); any other
//! board can be described in TOML and loaded with [`SessionConfig::load`].

use std::collections::HashSet;
use std::fs;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::{
    AssetClass, CostBasis, NewsEvent, DEFAULT_COMPOUNDING_PERIOD, DEFAULT_FEE_RATE,
    DEFAULT_INITIAL_CASH, DEFAULT_TAX_RATE, DEFAULT_TICK_INTERVAL_SECS, PRICE_FLOOR,
};

// ─── Tables ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub name: String,
    pub class: AssetClass,
    pub initial_price: f64,
    /// Half-width of the uniform perturbation band (Policy A)
    #[serde(default)]
    pub volatility: Option<f64>,
    /// Mean-reversion anchor (Policy B); defaults to the initial price
    #[serde(default)]
    pub baseline: Option<f64>,
}

impl AssetSpec {
    pub fn new(name: &str, class: AssetClass, initial_price: f64) -> Self {
        Self {
            name: name.to_string(),
            class,
            initial_price,
            volatility: None,
            baseline: None,
        }
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = Some(volatility);
        self
    }

    pub fn volatility(&self) -> f64 {
        self.volatility.unwrap_or_else(|| self.class.default_volatility())
    }

    pub fn baseline(&self) -> f64 {
        self.baseline.unwrap_or(self.initial_price)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixedIncomeSpec {
    pub name: String,
    /// Growth per compounding period, e.g. 0.0102 = +1.02%
    pub rate: f64,
    /// Human-readable yield description
    #[serde(default)]
    pub label: String,
}

impl FixedIncomeSpec {
    pub fn new(name: &str, rate: f64, label: &str) -> Self {
        Self {
            name: name.to_string(),
            rate,
            label: label.to_string(),
        }
    }
}

/// Parameters of the mean-reverting walk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanReversionConfig {
    /// Uniform noise band, absolute price units
    pub noise: f64,
    /// Chance per tick per asset of a bot jump
    pub bot_probability: f64,
    /// Size of a bot jump, absolute price units
    pub bot_jump: f64,
    /// Fraction of (baseline - price) recovered each tick
    pub reversion: f64,
    /// Chance per tick that one scripted event fires
    pub event_probability: f64,
    pub events: Vec<NewsEvent>,
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            noise: 0.03,
            bot_probability: 0.3,
            bot_jump: 0.02,
            reversion: 0.005,
            event_probability: 0.05,
            events: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Policy A: bounded multiplicative walk
    Compounding,
    /// Policy B: mean reversion, bot pressure and scripted shocks
    MeanReverting(MeanReversionConfig),
}

// ─── SessionConfig ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub initial_cash: f64,
    pub fee_rate: f64,
    /// Sell-side tax on gross proceeds
    pub tax_rate: f64,
    pub cost_basis: CostBasis,
    pub compounding_period_ticks: u32,
    /// Wall-clock spacing the presentation layer should use between ticks
    pub tick_interval_secs: f64,
    pub seed: u64,
    /// Empty unless the board sets one
    #[serde(default)]
    pub opening_news: String,
    pub assets: Vec<AssetSpec>,
    /// Empty unless the board declares `[[fixed_income]]` tables
    #[serde(default)]
    pub fixed_income: Vec<FixedIncomeSpec>,
    pub policy: PolicyConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::classic()
    }
}

impl SessionConfig {
    /// Stocks, currencies, gold and bitcoin on a multiplicative walk, plus two
    /// fixed-income deposits that pay every `compounding_period_ticks`.
    pub fn classic() -> Self {
        use AssetClass::*;

        let assets = vec![
            AssetSpec::new("AAPL", Equity, 150.0),
            AssetSpec::new("NVDA", Equity, 120.0).with_volatility(0.025),
            AssetSpec::new("TSLA", Equity, 90.0),
            AssetSpec::new("BYD", Equity, 45.0),
            AssetSpec::new("PETR4", Equity, 35.0),
            AssetSpec::new("VALE3", Equity, 65.0),
            AssetSpec::new("MGLU3", Equity, 3.0).with_volatility(0.025),
            AssetSpec::new("ABEV3", Equity, 12.0),
            AssetSpec::new("NFLX", Equity, 110.0),
            AssetSpec::new("AMZN", Equity, 85.0),
            AssetSpec::new("GOOGL", Equity, 70.0),
            AssetSpec::new("META", Equity, 95.0),
            AssetSpec::new("BITCOIN", Crypto, 350_000.0),
            AssetSpec::new("DOLAR", Currency, 5.10),
            AssetSpec::new("EURO", Currency, 5.50),
            AssetSpec::new("OURO (1g)", Commodity, 380.0),
        ];

        Self {
            initial_cash: DEFAULT_INITIAL_CASH,
            fee_rate: DEFAULT_FEE_RATE,
            tax_rate: 0.0,
            cost_basis: CostBasis::ExcludeFees,
            compounding_period_ticks: DEFAULT_COMPOUNDING_PERIOD,
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            seed: 0,
            opening_news: "Market open! TESOURO SELIC (13% p.a.) vs POUPANCA (0.5% p.m.)".into(),
            assets,
            fixed_income: vec![
                FixedIncomeSpec::new("TESOURO SELIC", 0.0102, "13% p.a."),
                FixedIncomeSpec::new("POUPANCA", 0.005, "0.5% p.m."),
            ],
            policy: PolicyConfig::Compounding,
        }
    }

    /// A small sector board that oscillates around fixed baselines and gets
    /// knocked around by scripted headlines. Fees are part of the cost basis and
    /// sells pay an extra tax.
    pub fn arcade() -> Self {
        use AssetClass::Equity;

        let assets = vec![
            AssetSpec::new("TECH", Equity, 15.0),
            AssetSpec::new("BANK", Equity, 22.0),
            AssetSpec::new("ENERGY", Equity, 30.0),
            AssetSpec::new("RETAIL", Equity, 8.0),
            AssetSpec::new("PHARMA", Equity, 18.0),
        ];

        let events = vec![
            NewsEvent::new("TECH", 1.10, "TECH unveils a breakthrough chip, shares soar"),
            NewsEvent::new("TECH", 0.92, "TECH hit by a data breach"),
            NewsEvent::new("BANK", 1.05, "BANK posts record quarterly profit"),
            NewsEvent::new("BANK", 0.90, "Regulators open an inquiry into BANK"),
            NewsEvent::new("ENERGY", 1.08, "Oil prices spike, ENERGY rallies"),
            NewsEvent::new("ENERGY", 0.94, "ENERGY refinery shut down after accident"),
            NewsEvent::new("RETAIL", 1.06, "Holiday sales beat forecasts for RETAIL"),
            NewsEvent::new("RETAIL", 0.93, "RETAIL warns of weak consumer demand"),
            NewsEvent::new("PHARMA", 1.09, "PHARMA drug wins approval"),
            NewsEvent::new("PHARMA", 0.91, "PHARMA trial fails in late stage"),
        ];

        Self {
            initial_cash: DEFAULT_INITIAL_CASH,
            fee_rate: DEFAULT_FEE_RATE,
            tax_rate: DEFAULT_TAX_RATE,
            cost_basis: CostBasis::IncludeFees,
            compounding_period_ticks: DEFAULT_COMPOUNDING_PERIOD,
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            seed: 0,
            opening_news: "Trading floor open. Watch the headlines.".into(),
            assets,
            fixed_income: Vec::new(),
            policy: PolicyConfig::MeanReverting(MeanReversionConfig {
                events,
                ..MeanReversionConfig::default()
            }),
        }
    }

    /// Look up a built-in profile by name.
    pub fn profile(name: &str) -> EngineResult<Self> {
        match name {
            "classic" => Ok(Self::classic()),
            "arcade" => Ok(Self::arcade()),
            other => Err(EngineError::InvalidConfiguration(format!(
                "unknown profile '{other}' (expected 'classic' or 'arcade')"
            ))),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> EngineResult<Self> {
        let config: SessionConfig = toml::from_str(contents)
            .map_err(|e| EngineError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file from disk.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Check every table for values the engine cannot run with.
    pub fn validate(&self) -> EngineResult<()> {
        let invalid = |msg: String| Err(EngineError::InvalidConfiguration(msg));

        if !(self.initial_cash.is_finite() && self.initial_cash >= 0.0) {
            return invalid(format!("initial_cash must be >= 0, got {}", self.initial_cash));
        }
        if !(0.0..1.0).contains(&self.fee_rate) {
            return invalid(format!("fee_rate must be in [0, 1), got {}", self.fee_rate));
        }
        if !(0.0..1.0).contains(&self.tax_rate) || self.fee_rate + self.tax_rate >= 1.0 {
            return invalid(format!("tax_rate must be in [0, 1 - fee_rate), got {}", self.tax_rate));
        }
        if self.compounding_period_ticks == 0 {
            return invalid("compounding_period_ticks must be positive".into());
        }
        if !(self.tick_interval_secs.is_finite() && self.tick_interval_secs > 0.0) {
            return invalid(format!(
                "tick_interval_secs must be positive, got {}",
                self.tick_interval_secs
            ));
        }
        if self.assets.is_empty() {
            return invalid("at least one asset is required".into());
        }

        let mut names = HashSet::new();
        for asset in &self.assets {
            if !names.insert(asset.name.as_str()) {
                return invalid(format!("duplicate asset '{}'", asset.name));
            }
            if asset.class.is_fixed_income() {
                return invalid(format!(
                    "asset '{}' is fixed income; declare it under [[fixed_income]]",
                    asset.name
                ));
            }
            if !(asset.initial_price.is_finite() && asset.initial_price >= PRICE_FLOOR) {
                return invalid(format!(
                    "asset '{}' initial_price must be at least {PRICE_FLOOR}, got {}",
                    asset.name, asset.initial_price
                ));
            }
            let v = asset.volatility();
            if !(v > 0.0 && v < 1.0) {
                return invalid(format!("asset '{}' volatility must be in (0, 1), got {v}", asset.name));
            }
            let b = asset.baseline();
            if !(b.is_finite() && b >= PRICE_FLOOR) {
                return invalid(format!(
                    "asset '{}' baseline must be at least {PRICE_FLOOR}, got {b}",
                    asset.name
                ));
            }
        }

        for fi in &self.fixed_income {
            if !names.insert(fi.name.as_str()) {
                return invalid(format!("duplicate instrument '{}'", fi.name));
            }
            if !(fi.rate.is_finite() && fi.rate > 0.0) {
                return invalid(format!("instrument '{}' rate must be positive, got {}", fi.name, fi.rate));
            }
        }

        if let PolicyConfig::MeanReverting(p) = &self.policy {
            if !(p.noise >= 0.0 && (2.0 * p.noise).is_finite()) {
                return invalid(format!("noise must be >= 0 and finite, got {}", p.noise));
            }
            if !(p.bot_jump.is_finite() && p.bot_jump >= 0.0) {
                return invalid(format!("bot_jump must be >= 0, got {}", p.bot_jump));
            }
            if !(0.0..=1.0).contains(&p.reversion) {
                return invalid(format!("reversion must be in [0, 1], got {}", p.reversion));
            }
            for (label, prob) in [
                ("bot_probability", p.bot_probability),
                ("event_probability", p.event_probability),
            ] {
                if !(0.0..=1.0).contains(&prob) {
                    return invalid(format!("{label} must be in [0, 1], got {prob}"));
                }
            }
            for event in &p.events {
                if !self.assets.iter().any(|a| a.name == event.asset) {
                    return invalid(format!("event references unknown asset '{}'", event.asset));
                }
                if !(event.impact.is_finite() && event.impact > 0.0) {
                    return invalid(format!(
                        "event on '{}' needs a positive impact, got {}",
                        event.asset, event.impact
                    ));
                }
            }
        }

        Ok(())
    }
}

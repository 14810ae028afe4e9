use serde::{Deserialize, Serialize};

/// Samples kept per asset for charting.
pub const HISTORY_LEN: usize = 30;

/// No price is ever allowed below this after a tick.
pub const PRICE_FLOOR: f64 = 0.01;

/// Position remainders smaller than this are float dust and count as zero.
pub const QUANTITY_EPSILON: f64 = 1e-9;

pub const DEFAULT_INITIAL_CASH: f64 = 10_000.0;
pub const DEFAULT_FEE_RATE: f64 = 0.001;
pub const DEFAULT_TAX_RATE: f64 = 0.007;
pub const DEFAULT_COMPOUNDING_PERIOD: u32 = 12;
pub const DEFAULT_TICK_INTERVAL_SECS: f64 = 2.0;

/// Volatility band for high-risk assets when none is configured
pub const HIGH_RISK_VOLATILITY: f64 = 0.025;
/// Volatility band for everything else
pub const BASE_VOLATILITY: f64 = 0.015;

// ─── Assets ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Equity,
    Crypto,
    Currency,
    Commodity,
    FixedIncome,
}

impl AssetClass {
    pub fn is_fixed_income(self) -> bool {
        matches!(self, AssetClass::FixedIncome)
    }

    /// Volatility used when an asset does not configure its own.
    pub fn default_volatility(self) -> f64 {
        match self {
            AssetClass::Crypto => HIGH_RISK_VOLATILITY,
            _ => BASE_VOLATILITY,
        }
    }
}

/// Whether the buy-side fee is folded into the weighted average cost.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostBasis {
    /// average_cost tracks the bare execution price
    #[default]
    ExcludeFees,
    /// average_cost tracks execution price * (1 + fee_rate)
    IncludeFees,
}

/// One entry of a scripted news table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewsEvent {
    pub asset: String,
    /// Multiplier applied to the asset's price when the event fires
    pub impact: f64,
    pub message: String,
}

impl NewsEvent {
    pub fn new(asset: &str, impact: f64, message: &str) -> Self {
        Self {
            asset: asset.to_string(),
            impact,
            message: message.to_string(),
        }
    }

    pub fn is_good_news(&self) -> bool {
        self.impact >= 1.0
    }
}

// ─── Reports ──────────────────────────────────────────────────────────────────

/// What happened during one price-engine advance.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TickReport {
    /// Session tick number after the advance (1-based)
    pub tick: u64,
    /// Fixed-income balances compounded on this tick
    pub compounded: bool,
    /// Scripted event that fired on this tick, if any
    pub event: Option<NewsEvent>,
    /// New headline, when the tick produced one
    pub news: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Settlement details of an accepted trade.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TradeReceipt {
    pub asset: String,
    pub side: TradeSide,
    pub quantity: f64,
    pub unit_price: f64,
    /// quantity * unit_price
    pub gross: f64,
    pub fee: f64,
    /// Sell-side tax; always 0 on buys
    pub tax: f64,
    pub cash_after: f64,
}

impl TradeReceipt {
    /// Net cash movement: negative for buys, positive for sells.
    pub fn cash_delta(&self) -> f64 {
        match self.side {
            TradeSide::Buy => -(self.gross + self.fee),
            TradeSide::Sell => self.gross - self.fee - self.tax,
        }
    }
}

// ─── Read-only views ──────────────────────────────────────────────────────────

/// Per-asset price movement over the last tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuoteView {
    pub asset: String,
    pub class: AssetClass,
    pub price: f64,
    pub previous: f64,
    /// price - previous
    pub delta: f64,
}

/// One row of the portfolio table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PositionView {
    pub asset: String,
    pub quantity: f64,
    pub average_cost: f64,
    pub price: f64,
    /// (price - average_cost) * quantity
    pub unrealized_pnl: f64,
}

/// A fixed-income balance as shown to the player.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DepositView {
    pub instrument: String,
    pub label: String,
    pub balance: f64,
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SessionConfig;
use crate::error::{ensure_positive_amount, EngineError, EngineResult};
use crate::market::{FixedIncomeBalance, MarketState};
use crate::types::{CostBasis, PositionView, TradeReceipt, TradeSide, QUANTITY_EPSILON};

/// Fee and tax schedule applied to every trade.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerPolicy {
    pub fee_rate: f64,
    /// Charged on gross sell proceeds only
    pub tax_rate: f64,
    pub cost_basis: CostBasis,
}

impl LedgerPolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            fee_rate: config.fee_rate,
            tax_rate: config.tax_rate,
            cost_basis: config.cost_basis,
        }
    }

    /// Cash required to buy `quantity` at `unit_price`, fee included.
    #[inline]
    pub fn buy_cost(&self, quantity: f64, unit_price: f64) -> f64 {
        quantity * unit_price * (1.0 + self.fee_rate)
    }

    /// Per-unit price recorded in the weighted average.
    #[inline]
    pub fn basis_price(&self, unit_price: f64) -> f64 {
        match self.cost_basis {
            CostBasis::ExcludeFees => unit_price,
            CostBasis::IncludeFees => unit_price * (1.0 + self.fee_rate),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Position {
    pub quantity: f64,
    /// 0 whenever quantity is 0
    pub average_cost: f64,
}

/// Cash account plus holdings of oscillating assets.
#[derive(Clone, Debug, PartialEq)]
pub struct Ledger {
    cash: f64,
    positions: BTreeMap<String, Position>,
    realized_pnl: f64,
    policy: LedgerPolicy,
}

impl Ledger {
    pub fn new(cash: f64, policy: LedgerPolicy) -> Self {
        Self {
            cash,
            positions: BTreeMap::new(),
            realized_pnl: 0.0,
            policy,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    /// Sum of net sell proceeds minus cost basis of the units sold.
    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn position(&self, asset: &str) -> Position {
        self.positions.get(asset).copied().unwrap_or_default()
    }

    pub fn positions(&self) -> impl Iterator<Item = (&str, &Position)> {
        self.positions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Buy at `unit_price`. All-or-nothing: a rejected buy changes nothing.
    ///
    /// average' = (q0 * avg0 + q * basis) / (q0 + q)
    pub fn buy(&mut self, asset: &str, quantity: f64, unit_price: f64) -> EngineResult<TradeReceipt> {
        ensure_positive_amount(quantity)?;
        ensure_positive_amount(unit_price)?;

        let gross = quantity * unit_price;
        let needed = self.policy.buy_cost(quantity, unit_price);
        if self.cash < needed {
            return Err(EngineError::InsufficientFunds {
                needed,
                available: self.cash,
            });
        }

        let basis = self.policy.basis_price(unit_price);
        let pos = self.positions.entry(asset.to_string()).or_default();
        let new_quantity = pos.quantity + quantity;
        pos.average_cost = (pos.quantity * pos.average_cost + quantity * basis) / new_quantity;
        pos.quantity = new_quantity;
        self.cash -= needed;

        info!(asset, quantity, unit_price, cash = self.cash, "buy filled");
        Ok(TradeReceipt {
            asset: asset.to_string(),
            side: TradeSide::Buy,
            quantity,
            unit_price,
            gross,
            fee: needed - gross,
            tax: 0.0,
            cash_after: self.cash,
        })
    }

    /// Sell at `unit_price`. Selling the whole position resets its average cost;
    /// a remainder within `QUANTITY_EPSILON` of zero closes the position.
    pub fn sell(&mut self, asset: &str, quantity: f64, unit_price: f64) -> EngineResult<TradeReceipt> {
        ensure_positive_amount(quantity)?;
        ensure_positive_amount(unit_price)?;

        let held = self.position(asset).quantity;
        if quantity - held > QUANTITY_EPSILON {
            return Err(EngineError::InsufficientHoldings {
                asset: asset.to_string(),
                needed: quantity,
                held,
            });
        }

        let gross = quantity * unit_price;
        let fee = gross * self.policy.fee_rate;
        let tax = gross * self.policy.tax_rate;
        let proceeds = gross - fee - tax;

        let emptied = match self.positions.get_mut(asset) {
            Some(pos) => {
                self.realized_pnl += proceeds - quantity * pos.average_cost;
                pos.quantity -= quantity;
                pos.quantity.abs() < QUANTITY_EPSILON
            }
            None => false,
        };
        if emptied {
            self.positions.remove(asset);
        }
        self.cash += proceeds;

        info!(asset, quantity, unit_price, cash = self.cash, "sell filled");
        Ok(TradeReceipt {
            asset: asset.to_string(),
            side: TradeSide::Sell,
            quantity,
            unit_price,
            gross,
            fee,
            tax,
            cash_after: self.cash,
        })
    }

    /// Move cash into a fixed-income balance, 1:1 and fee free.
    pub fn deposit(&mut self, account: &mut FixedIncomeBalance, amount: f64) -> EngineResult<()> {
        ensure_positive_amount(amount)?;
        if self.cash < amount {
            return Err(EngineError::InsufficientFunds {
                needed: amount,
                available: self.cash,
            });
        }
        self.cash -= amount;
        account.balance += amount;
        info!(instrument = %account.name, amount, cash = self.cash, "deposit");
        Ok(())
    }

    /// Move money from a fixed-income balance back to cash.
    pub fn withdraw(&mut self, account: &mut FixedIncomeBalance, amount: f64) -> EngineResult<()> {
        ensure_positive_amount(amount)?;
        if account.balance < amount {
            return Err(EngineError::InsufficientHoldings {
                asset: account.name.clone(),
                needed: amount,
                held: account.balance,
            });
        }
        account.balance -= amount;
        self.cash += amount;
        info!(instrument = %account.name, amount, cash = self.cash, "withdraw");
        Ok(())
    }

    /// Market value of all held units at current prices.
    pub fn holdings_value(&self, market: &MarketState) -> f64 {
        self.positions
            .iter()
            .filter_map(|(asset, pos)| market.price_of(asset).ok().map(|p| p * pos.quantity))
            .sum()
    }

    /// Portfolio rows in board order.
    pub fn position_views(&self, market: &MarketState) -> Vec<PositionView> {
        market
            .quotes()
            .iter()
            .filter_map(|q| {
                self.positions.get(&q.name).map(|pos| PositionView {
                    asset: q.name.clone(),
                    quantity: pos.quantity,
                    average_cost: pos.average_cost,
                    price: q.current,
                    unrealized_pnl: (q.current - pos.average_cost) * pos.quantity,
                })
            })
            .collect()
    }
}

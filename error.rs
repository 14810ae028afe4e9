/// Every way an engine operation can be rejected.
///
/// A rejected command leaves the session untouched; nothing here is fatal once
/// `initialize` has succeeded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("insufficient funds: need {needed:.2}, have {available:.2}")]
    InsufficientFunds { needed: f64, available: f64 },

    #[error("insufficient holdings of {asset}: need {needed}, hold {held}")]
    InsufficientHoldings { asset: String, needed: f64, held: f64 },

    #[error("unknown asset: {0}")]
    UnknownAsset(String),

    /// Zero, negative or non-finite quantity/amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Reject anything that is not a strictly positive finite number.
pub(crate) fn ensure_positive_amount(amount: f64) -> EngineResult<()> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidAmount(amount))
    }
}

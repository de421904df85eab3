//! Decision making, risk validation, and simulated execution.

pub mod decision;
pub mod execution;
pub mod risk;

pub use decision::{DecisionEngine, PriceSource, StaticPriceSource};
pub use execution::{
    BookLevel, BookSummary, ExecutionEngine, ExecutionError, ExecutionRecord, ExecutionStats,
    OrderBook, SlippageStats,
};
pub use risk::{DailyLossTracker, RiskValidator, ValidationError};

use serde::{Deserialize, Serialize};

use crate::agents::TradeAction;

/// Risk context attached to every trading decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Market volatility at decision time, in [0, 1]
    pub volatility: f64,
    /// Existing portfolio concentration in the decision's symbol
    pub concentration: f64,
    pub correlation_risk: f64,
    pub liquidity_risk: f64,
}

/// A risk-sized trading decision produced by the decision engine.
///
/// `quantity` is in base-asset units; the notional value of the trade is
/// `quantity * target_price`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingDecision {
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: f64,
    pub target_price: f64,
    /// Consensus confidence in [0, 1]
    pub confidence: f64,
    pub reasoning: String,
    pub risk_assessment: RiskAssessment,
}

impl TradingDecision {
    pub fn notional(&self) -> f64 {
        self.quantity * self.target_price
    }

    pub fn is_actionable(&self) -> bool {
        self.action != TradeAction::Hold && self.quantity > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(action: TradeAction, quantity: f64) -> TradingDecision {
        TradingDecision {
            symbol: "BTC-USD".to_string(),
            action,
            quantity,
            target_price: 50_000.0,
            confidence: 0.8,
            reasoning: "test".to_string(),
            risk_assessment: RiskAssessment {
                volatility: 0.5,
                concentration: 0.1,
                correlation_risk: 0.3,
                liquidity_risk: 0.1,
            },
        }
    }

    #[test]
    fn test_notional() {
        let d = decision(TradeAction::Buy, 0.02);
        assert!((d.notional() - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_hold_is_not_actionable() {
        assert!(!decision(TradeAction::Hold, 0.02).is_actionable());
        assert!(!decision(TradeAction::Buy, 0.0).is_actionable());
        assert!(decision(TradeAction::Buy, 0.02).is_actionable());
    }
}

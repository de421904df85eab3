//! Pre-trade risk validation and the daily loss circuit breaker.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::agents::TradeAction;
use crate::config::Config;
use crate::portfolio::PortfolioSnapshot;

use super::TradingDecision;

/// Extra margin required over a buy's target-price cost, covering the
/// worst-case fill slippage (5x half-spread with 1.2 jitter is ~0.3%
/// of the reference price)
const SLIPPAGE_HEADROOM: f64 = 0.01;

/// Why a decision was rejected before execution
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("confidence {confidence:.2} below threshold {threshold:.2}")]
    LowConfidence { confidence: f64, threshold: f64 },

    #[error("buy cost {cost:.2} exceeds available balance {available:.2}")]
    InsufficientFunds { cost: f64, available: f64 },

    #[error("risk exposure {exposure:.4} exceeds per-trade limit {limit:.4}")]
    ExcessiveRisk { exposure: f64, limit: f64 },

    #[error("HOLD decisions are not executable")]
    NotActionable,
}

/// Stateless per-decision risk gate. Every decision is re-validated
/// against a fresh snapshot immediately before execution.
pub struct RiskValidator {
    min_confidence_threshold: f64,
    max_risk_per_trade: f64,
}

impl RiskValidator {
    pub fn new(config: &Config) -> Self {
        Self {
            min_confidence_threshold: config.min_confidence_threshold,
            max_risk_per_trade: config.max_risk_per_trade,
        }
    }

    pub fn validate(
        &self,
        decision: &TradingDecision,
        snapshot: &PortfolioSnapshot,
    ) -> Result<(), ValidationError> {
        if !decision.is_actionable() {
            return Err(ValidationError::NotActionable);
        }

        if decision.confidence < self.min_confidence_threshold {
            return Err(ValidationError::LowConfidence {
                confidence: decision.confidence,
                threshold: self.min_confidence_threshold,
            });
        }

        let exposure = decision.quantity * decision.risk_assessment.volatility;
        if exposure >= self.max_risk_per_trade {
            return Err(ValidationError::ExcessiveRisk {
                exposure,
                limit: self.max_risk_per_trade,
            });
        }

        if decision.action == TradeAction::Buy {
            let cost = decision.notional();
            // The fill will land above target_price, so the balance must
            // cover the cost with headroom or apply_fill rejects it after
            // the book has already mutated
            if cost * (1.0 + SLIPPAGE_HEADROOM) > snapshot.available_balance {
                return Err(ValidationError::InsufficientFunds {
                    cost,
                    available: snapshot.available_balance,
                });
            }
        }

        Ok(())
    }
}

/// Tracks the portfolio's drawdown since the start of the UTC day and
/// halts trading once it exceeds the configured limit. Resets on date
/// change.
#[derive(Debug, Clone)]
pub struct DailyLossTracker {
    day: NaiveDate,
    start_value: f64,
    realized_pnl: f64,
    limit: f64,
}

impl DailyLossTracker {
    pub fn new(limit: f64, now: DateTime<Utc>, portfolio_value: f64) -> Self {
        Self {
            day: now.date_naive(),
            start_value: portfolio_value,
            realized_pnl: 0.0,
            limit,
        }
    }

    /// Roll to a new trading day if the UTC date changed. The current
    /// portfolio value becomes the new day's baseline.
    pub fn observe(&mut self, now: DateTime<Utc>, portfolio_value: f64) {
        let today = now.date_naive();
        if today != self.day {
            info!(
                %today,
                baseline = portfolio_value,
                "daily loss tracker reset for new trading day"
            );
            self.day = today;
            self.start_value = portfolio_value;
            self.realized_pnl = 0.0;
        }
    }

    pub fn record_realized(&mut self, pnl: f64) {
        self.realized_pnl += pnl;
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    /// True once the day's losses exceed the limit. Checks both the
    /// value drawdown from the day's baseline (realized plus unrealized)
    /// and the realized losses alone, so locked-in losses trip the
    /// breaker even when open positions have since recovered.
    pub fn is_breached(&self, portfolio_value: f64) -> bool {
        if self.start_value <= 0.0 {
            return false;
        }
        let drawdown = (self.start_value - portfolio_value) / self.start_value;
        let realized_loss = -self.realized_pnl / self.start_value;
        if drawdown.max(realized_loss) > self.limit {
            warn!(
                drawdown,
                realized_pnl = self.realized_pnl,
                limit = self.limit,
                "daily loss limit breached"
            );
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::PortfolioState;
    use crate::trading::RiskAssessment;

    fn decision(action: TradeAction, quantity: f64, confidence: f64) -> TradingDecision {
        TradingDecision {
            symbol: "BTC-USD".to_string(),
            action,
            quantity,
            target_price: 50_000.0,
            confidence,
            reasoning: "test".to_string(),
            risk_assessment: RiskAssessment {
                volatility: 0.5,
                concentration: 0.0,
                correlation_risk: 0.3,
                liquidity_risk: 0.1,
            },
        }
    }

    fn validator() -> RiskValidator {
        RiskValidator::new(&Config::for_tests())
    }

    #[test]
    fn test_reasonable_buy_passes() {
        let snapshot = PortfolioState::with_holdings(100_000.0, Vec::new()).snapshot();
        // 0.01 BTC at 50k = $500 cost; exposure 0.01 * 0.5 = 0.005 < 0.02
        let result = validator().validate(&decision(TradeAction::Buy, 0.01, 0.8), &snapshot);
        assert!(result.is_ok());
    }

    #[test]
    fn test_hold_rejected() {
        let snapshot = PortfolioState::new().snapshot();
        assert_eq!(
            validator().validate(&decision(TradeAction::Hold, 0.0, 0.9), &snapshot),
            Err(ValidationError::NotActionable)
        );
    }

    #[test]
    fn test_low_confidence_rejected() {
        let snapshot = PortfolioState::with_holdings(100_000.0, Vec::new()).snapshot();
        let result = validator().validate(&decision(TradeAction::Buy, 0.01, 0.5), &snapshot);
        assert!(matches!(
            result,
            Err(ValidationError::LowConfidence { .. })
        ));
    }

    #[test]
    fn test_insufficient_funds_rejected() {
        let snapshot = PortfolioState::with_holdings(100.0, Vec::new()).snapshot();
        let result = validator().validate(&decision(TradeAction::Buy, 0.01, 0.8), &snapshot);
        assert!(matches!(
            result,
            Err(ValidationError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_buy_inside_slippage_margin_of_balance_rejected() {
        let snapshot = PortfolioState::with_holdings(1_000.0, Vec::new()).snapshot();

        // 0.0199 BTC at 50k costs 995: nominally affordable, but a
        // slipped fill would overdraw the 1000 balance
        let result = validator().validate(&decision(TradeAction::Buy, 0.0199, 0.8), &snapshot);
        assert!(matches!(
            result,
            Err(ValidationError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_excessive_risk_exposure_rejected() {
        let snapshot = PortfolioState::with_holdings(10_000_000.0, Vec::new()).snapshot();

        // 1.0 units * 0.5 volatility = 0.5 >= 0.02 limit
        let result = validator().validate(&decision(TradeAction::Buy, 1.0, 0.8), &snapshot);
        assert!(matches!(result, Err(ValidationError::ExcessiveRisk { .. })));
    }

    #[test]
    fn test_sell_exempt_from_balance_check() {
        // Sells free up cash, so a zero-cash portfolio can still sell
        let snapshot = PortfolioState::with_holdings(0.0, Vec::new()).snapshot();
        let result = validator().validate(&decision(TradeAction::Sell, 0.01, 0.8), &snapshot);
        assert!(result.is_ok());
    }

    #[test]
    fn test_daily_loss_tracker_breach_and_reset() {
        let day_one = "2026-08-20T10:00:00Z".parse::<DateTime<Utc>>().expect("ts");
        let mut tracker = DailyLossTracker::new(0.03, day_one, 100_000.0);

        assert!(!tracker.is_breached(98_000.0)); // -2%
        assert!(tracker.is_breached(96_000.0)); // -4%

        // New day re-baselines at the current value
        let day_two = "2026-08-21T00:05:00Z".parse::<DateTime<Utc>>().expect("ts");
        tracker.observe(day_two, 96_000.0);
        assert!(!tracker.is_breached(96_000.0));
        assert_eq!(tracker.realized_pnl(), 0.0);
    }

    #[test]
    fn test_realized_losses_breach_despite_recovered_value() {
        let now = Utc::now();
        let mut tracker = DailyLossTracker::new(0.03, now, 100_000.0);

        // -4% locked in; open positions have since rallied back
        tracker.record_realized(-4_000.0);
        assert!(tracker.is_breached(100_000.0));

        // Realized gains never trip the breaker
        let mut tracker = DailyLossTracker::new(0.03, now, 100_000.0);
        tracker.record_realized(4_000.0);
        assert!(!tracker.is_breached(100_000.0));
    }

    #[test]
    fn test_daily_loss_tracker_accumulates_realized() {
        let now = Utc::now();
        let mut tracker = DailyLossTracker::new(0.03, now, 50_000.0);
        tracker.record_realized(-120.0);
        tracker.record_realized(40.0);
        assert!((tracker.realized_pnl() + 80.0).abs() < 1e-9);

        // Same day: no reset
        tracker.observe(now, 49_000.0);
        assert!((tracker.realized_pnl() + 80.0).abs() < 1e-9);
    }
}

//! Consensus decision engine: consolidates worker recommendations into
//! confidence-weighted votes and sizes the winners against portfolio
//! risk limits.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::agents::{ResearchReport, TradeAction};
use crate::config::Config;
use crate::portfolio::PortfolioSnapshot;

use super::{RiskAssessment, TradingDecision};

/// Source of reference prices used for sizing and order targeting
pub trait PriceSource: Send + Sync {
    fn price(&self, symbol: &str) -> f64;
}

/// Fixed reference prices for the simulated market
#[derive(Debug, Default, Clone)]
pub struct StaticPriceSource;

impl PriceSource for StaticPriceSource {
    fn price(&self, symbol: &str) -> f64 {
        if symbol.contains("BTC") {
            50_000.0
        } else {
            3_000.0
        }
    }
}

/// Per-symbol confidence-weighted vote tally
#[derive(Debug, Default, Clone)]
struct VoteTally {
    buy: f64,
    sell: f64,
    hold: f64,
}

impl VoteTally {
    fn total(&self) -> f64 {
        self.buy + self.sell + self.hold
    }

    /// Strict-max winner with its normalized score. Any tie for the top
    /// score resolves to HOLD.
    fn winner(&self) -> (TradeAction, f64) {
        let total = self.total();
        if total <= 0.0 {
            return (TradeAction::Hold, 0.0);
        }

        let (buy, sell, hold) = (self.buy / total, self.sell / total, self.hold / total);
        if buy > sell && buy > hold {
            (TradeAction::Buy, buy)
        } else if sell > buy && sell > hold {
            (TradeAction::Sell, sell)
        } else {
            (TradeAction::Hold, hold)
        }
    }
}

/// Turns batches of research reports into risk-sized trading decisions.
pub struct DecisionEngine {
    min_confidence_threshold: f64,
    max_risk_per_trade: f64,
    max_position_size: f64,
    prices: Box<dyn PriceSource>,
}

impl DecisionEngine {
    pub fn new(config: &Config) -> Self {
        Self::with_price_source(config, Box::new(StaticPriceSource))
    }

    pub fn with_price_source(config: &Config, prices: Box<dyn PriceSource>) -> Self {
        Self {
            min_confidence_threshold: config.min_confidence_threshold,
            max_risk_per_trade: config.max_risk_per_trade,
            max_position_size: config.max_position_size,
            prices,
        }
    }

    /// Consolidate a batch of research reports into trading decisions.
    ///
    /// Failed (zero-confidence) reports contribute no votes. Symbols
    /// whose consensus falls below the confidence threshold produce no
    /// decision at all.
    pub fn consolidate(
        &self,
        reports: &[ResearchReport],
        snapshot: &PortfolioSnapshot,
    ) -> Vec<TradingDecision> {
        // BTreeMap keeps decision order stable across runs
        let mut tallies: BTreeMap<String, VoteTally> = BTreeMap::new();

        for report in reports {
            if report.is_failure() {
                continue;
            }
            for recommendation in &report.recommendations {
                let weight = recommendation.confidence * report.confidence;
                let tally = tallies.entry(recommendation.symbol.clone()).or_default();
                match recommendation.action {
                    TradeAction::Buy => tally.buy += weight,
                    TradeAction::Sell => tally.sell += weight,
                    TradeAction::Hold => tally.hold += weight,
                }
            }
        }

        let mut decisions = Vec::new();
        for (symbol, tally) in &tallies {
            let (action, confidence) = tally.winner();
            debug!(
                symbol,
                %action,
                confidence,
                buy = tally.buy,
                sell = tally.sell,
                hold = tally.hold,
                "consensus tallied"
            );

            if confidence < self.min_confidence_threshold {
                debug!(
                    symbol,
                    confidence,
                    threshold = self.min_confidence_threshold,
                    "consensus below confidence threshold, no decision"
                );
                continue;
            }

            let target_price = self.prices.price(symbol);
            let quantity = if action == TradeAction::Hold {
                0.0
            } else {
                self.sized_quantity(snapshot, symbol, confidence, target_price)
            };

            let decision = TradingDecision {
                symbol: symbol.clone(),
                action,
                quantity,
                target_price,
                confidence,
                reasoning: format!("Consensus: {} (Confidence: {:.2})", action, confidence),
                risk_assessment: RiskAssessment {
                    volatility: snapshot.market_conditions.volatility,
                    concentration: snapshot.concentration(symbol),
                    correlation_risk: 0.3,
                    liquidity_risk: 0.1,
                },
            };

            info!(
                symbol,
                action = %decision.action,
                quantity = decision.quantity,
                confidence = decision.confidence,
                "trading decision produced"
            );
            decisions.push(decision);
        }

        decisions
    }

    /// Size a position in base-asset units.
    ///
    /// Base risk notional is a fixed fraction of portfolio value, scaled
    /// down by consensus confidence, market volatility, and existing
    /// concentration in the symbol, then capped at the maximum position
    /// size.
    fn sized_quantity(
        &self,
        snapshot: &PortfolioSnapshot,
        symbol: &str,
        confidence: f64,
        target_price: f64,
    ) -> f64 {
        let portfolio_value = snapshot.portfolio_value;
        let volatility = snapshot.market_conditions.volatility;

        let volatility_factor = if volatility > 0.0 {
            (1.0 / (10.0 * volatility)).min(1.0)
        } else {
            1.0
        };
        let concentration_factor = 1.0 - snapshot.concentration(symbol).min(0.5);

        let notional = portfolio_value
            * self.max_risk_per_trade
            * confidence
            * volatility_factor
            * concentration_factor;
        let capped = notional.min(portfolio_value * self.max_position_size);

        if target_price > 0.0 {
            capped / target_price
        } else {
            0.0
        }
    }
}

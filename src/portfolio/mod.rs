//! Portfolio state: cash, open positions, and the derived market/risk
//! signals the master polls every cycle.
//!
//! `PortfolioState` is the single mutable owner; everything downstream
//! consumes immutable `PortfolioSnapshot` values (copy-on-read), so
//! readers never observe a partially-updated portfolio.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::agents::TradeAction;

/// Quantity below which a position is considered fully closed
const CLOSED_EPSILON: f64 = 1e-9;

/// An open position. Owned exclusively by `PortfolioState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub avg_price: f64,
    pub current_price: f64,
    /// quantity * current_price
    pub value: f64,
    /// value - quantity * avg_price
    pub pnl: f64,
    /// Unrealized P&L as a percent of cost basis (e.g. -5.0 = -5%)
    pub pnl_percent: f64,
}

impl Position {
    pub fn new(symbol: impl Into<String>, quantity: f64, avg_price: f64, current_price: f64) -> Self {
        let mut position = Self {
            symbol: symbol.into(),
            quantity,
            avg_price,
            current_price,
            value: 0.0,
            pnl: 0.0,
            pnl_percent: 0.0,
        };
        position.revalue(current_price);
        position
    }

    /// Re-derive value and P&L from a fresh market price
    pub fn revalue(&mut self, current_price: f64) {
        self.current_price = current_price;
        self.value = self.quantity * current_price;
        let cost_basis = self.quantity * self.avg_price;
        self.pnl = self.value - cost_basis;
        self.pnl_percent = if cost_basis > 0.0 {
            (self.pnl / cost_basis) * 100.0
        } else {
            0.0
        };
    }
}

/// Derived market-condition signals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConditions {
    /// Market volatility in [0, 1]
    pub volatility: f64,
    pub trend: String,
    pub sentiment: String,
    pub regime: String,
}

/// Simplified portfolio risk metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Largest single-symbol concentration as a fraction of portfolio value
    pub max_concentration: f64,
    /// Largest absolute position drawdown in percent
    pub max_drawdown: f64,
    /// Simplified 95% value-at-risk
    pub var_95: f64,
}

/// Conditions that cause the master to dispatch research workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResearchTrigger {
    /// Cash above 15% of portfolio value - room for new investments
    SufficientFunds,
    /// Some position is down more than 8%
    LosingPositions,
    /// Market volatility above 0.8
    HighVolatility,
}

/// Immutable per-cycle view of the portfolio. Never mutated after
/// creation; consumed by the orchestrator and decision engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub timestamp: DateTime<Utc>,
    pub available_balance: f64,
    /// available_balance + sum of position values
    pub portfolio_value: f64,
    pub positions: Vec<Position>,
    pub market_conditions: MarketConditions,
    pub risk_metrics: RiskMetrics,
    pub research_triggers: Vec<ResearchTrigger>,
}

impl PortfolioSnapshot {
    /// Cash as a fraction of total portfolio value
    pub fn cash_fraction(&self) -> f64 {
        if self.portfolio_value > 0.0 {
            self.available_balance / self.portfolio_value
        } else {
            0.0
        }
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }

    /// Fraction of portfolio value currently held in this symbol (0 if none)
    pub fn concentration(&self, symbol: &str) -> f64 {
        match (self.position(symbol), self.portfolio_value > 0.0) {
            (Some(position), true) => position.value / self.portfolio_value,
            _ => 0.0,
        }
    }

    /// Total unrealized P&L across open positions
    pub fn unrealized_pnl(&self) -> f64 {
        self.positions.iter().map(|p| p.pnl).sum()
    }
}

/// Aggregate performance view over open positions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_pnl: f64,
    pub total_pnl_percent: f64,
    pub winning_positions: usize,
    pub total_positions: usize,
    pub win_rate: f64,
}

/// Mutable portfolio state plus the simulated market feed behind it.
///
/// Prices drift randomly per refresh; the random source is injectable
/// so tests can run deterministic sequences.
pub struct PortfolioState {
    available_balance: f64,
    positions: Vec<Position>,
    market_volatility: f64,
    fear_greed_index: u32,
    rng: StdRng,
}

impl PortfolioState {
    /// Default simulated portfolio: $25k cash plus seeded BTC and ETH
    /// positions.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            available_balance: 25_000.0,
            positions: vec![
                Position::new("BTC-USD", 0.2, 48_000.0, 49_500.0),
                Position::new("ETH-USD", 3.5, 2_900.0, 2_850.0),
            ],
            market_volatility: 0.5,
            fear_greed_index: 50,
            rng,
        }
    }

    /// Build a portfolio with explicit holdings (test/fixture support)
    pub fn with_holdings(available_balance: f64, positions: Vec<Position>) -> Self {
        Self {
            available_balance,
            positions,
            market_volatility: 0.5,
            fear_greed_index: 50,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn available_balance(&self) -> f64 {
        self.available_balance
    }

    pub fn portfolio_value(&self) -> f64 {
        self.available_balance + self.positions.iter().map(|p| p.value).sum::<f64>()
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Override the derived market volatility (test/fixture support)
    pub fn set_market_volatility(&mut self, volatility: f64) {
        self.market_volatility = volatility.clamp(0.0, 1.0);
    }

    /// Simulate one market-data refresh: drift position prices, resample
    /// market volatility and the fear/greed index, re-derive P&L.
    pub fn refresh_market(&mut self) {
        for position in &mut self.positions {
            // BTC-class symbols move -2%..+3%, everything else -1.5%..+2.5%
            let drift = if position.symbol.contains("BTC") {
                self.rng.gen_range(-0.02..0.03)
            } else {
                self.rng.gen_range(-0.015..0.025)
            };
            let new_price = position.current_price * (1.0 + drift);
            position.revalue(new_price);
        }

        self.market_volatility = self.rng.gen_range(0.3..0.8);
        self.fear_greed_index = self.rng.gen_range(40..=75);

        debug!(
            volatility = self.market_volatility,
            fear_greed = self.fear_greed_index,
            "market refreshed"
        );
    }

    fn market_conditions(&self) -> MarketConditions {
        let volatility = self.market_volatility;
        MarketConditions {
            volatility,
            trend: if volatility < 0.6 { "bullish" } else { "neutral" }.to_string(),
            sentiment: if self.fear_greed_index > 55 {
                "positive"
            } else {
                "neutral"
            }
            .to_string(),
            regime: match volatility {
                v if v < 0.4 => "low_volatility",
                v if v < 0.7 => "normal",
                _ => "high_volatility",
            }
            .to_string(),
        }
    }

    fn risk_metrics(&self, portfolio_value: f64) -> RiskMetrics {
        let max_concentration = self
            .positions
            .iter()
            .map(|p| {
                if portfolio_value > 0.0 {
                    p.value / portfolio_value
                } else {
                    0.0
                }
            })
            .fold(0.0, f64::max);

        let max_drawdown = self
            .positions
            .iter()
            .map(|p| p.pnl_percent.abs())
            .fold(0.0, f64::max);

        RiskMetrics {
            max_concentration,
            max_drawdown,
            var_95: portfolio_value * 0.05,
        }
    }

    fn research_triggers(&self, portfolio_value: f64) -> Vec<ResearchTrigger> {
        let mut triggers = Vec::new();

        if self.available_balance > portfolio_value * 0.15 {
            triggers.push(ResearchTrigger::SufficientFunds);
        }
        if self.positions.iter().any(|p| p.pnl_percent < -8.0) {
            triggers.push(ResearchTrigger::LosingPositions);
        }
        if self.market_volatility > 0.8 {
            triggers.push(ResearchTrigger::HighVolatility);
        }

        triggers
    }

    /// Produce the immutable per-cycle snapshot
    pub fn snapshot(&self) -> PortfolioSnapshot {
        let portfolio_value = self.portfolio_value();
        PortfolioSnapshot {
            timestamp: Utc::now(),
            available_balance: self.available_balance,
            portfolio_value,
            positions: self.positions.clone(),
            market_conditions: self.market_conditions(),
            risk_metrics: self.risk_metrics(portfolio_value),
            research_triggers: self.research_triggers(portfolio_value),
        }
    }

    /// Apply an executed fill to the portfolio. Buys merge into existing
    /// positions at a volume-weighted average price; sells realize P&L
    /// and remove the position once fully closed.
    ///
    /// Returns the realized P&L of the fill (0 for buys).
    pub fn apply_fill(
        &mut self,
        symbol: &str,
        action: TradeAction,
        quantity: f64,
        fill_price: f64,
    ) -> Result<f64> {
        if quantity <= 0.0 || !quantity.is_finite() {
            bail!("Invalid fill quantity: {}", quantity);
        }
        if fill_price <= 0.0 || !fill_price.is_finite() {
            bail!("Invalid fill price: {}", fill_price);
        }

        match action {
            TradeAction::Buy => {
                let cost = quantity * fill_price;
                if cost > self.available_balance + 1e-6 {
                    bail!(
                        "Insufficient funds for buy: cost {:.2} exceeds balance {:.2}",
                        cost,
                        self.available_balance
                    );
                }

                if let Some(position) = self.positions.iter_mut().find(|p| p.symbol == symbol) {
                    let total_quantity = position.quantity + quantity;
                    let total_cost = position.quantity * position.avg_price + cost;
                    position.avg_price = total_cost / total_quantity;
                    position.quantity = total_quantity;
                    position.revalue(fill_price);
                } else {
                    self.positions
                        .push(Position::new(symbol, quantity, fill_price, fill_price));
                }

                self.available_balance -= cost;
                info!(symbol, quantity, fill_price, "buy fill applied");
                Ok(0.0)
            }
            TradeAction::Sell => {
                let Some(index) = self.positions.iter().position(|p| p.symbol == symbol) else {
                    bail!("No position found for {}", symbol);
                };

                let position = &mut self.positions[index];
                let sell_quantity = if quantity > position.quantity {
                    warn!(
                        symbol,
                        requested = quantity,
                        held = position.quantity,
                        "sell quantity clamped to held quantity"
                    );
                    position.quantity
                } else {
                    quantity
                };

                let realized = (fill_price - position.avg_price) * sell_quantity;
                position.quantity -= sell_quantity;
                self.available_balance += sell_quantity * fill_price;

                if position.quantity <= CLOSED_EPSILON {
                    self.positions.remove(index);
                } else {
                    self.positions[index].revalue(fill_price);
                }

                info!(
                    symbol,
                    quantity = sell_quantity,
                    fill_price,
                    realized,
                    "sell fill applied"
                );
                Ok(realized)
            }
            TradeAction::Hold => bail!("HOLD decisions are not executable fills"),
        }
    }

    pub fn performance_summary(&self) -> PerformanceSummary {
        let total_pnl: f64 = self.positions.iter().map(|p| p.pnl).sum();
        let total_positions = self.positions.len();
        let winning_positions = self.positions.iter().filter(|p| p.pnl > 0.0).count();
        let portfolio_value = self.portfolio_value();

        PerformanceSummary {
            total_pnl,
            total_pnl_percent: if portfolio_value > 0.0 {
                (total_pnl / portfolio_value) * 100.0
            } else {
                0.0
            },
            winning_positions,
            total_positions,
            win_rate: if total_positions > 0 {
                (winning_positions as f64 / total_positions as f64) * 100.0
            } else {
                0.0
            },
        }
    }
}

impl Default for PortfolioState {
    fn default() -> Self {
        Self::new()
    }
}

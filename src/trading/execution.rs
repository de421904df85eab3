//! Simulated order-book execution.
//!
//! Fills walk a per-symbol limit book: price impact scales with order
//! size relative to top-of-book depth, consumed levels replenish around
//! the last traded price.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agents::TradeAction;
use crate::config::Config;

use super::TradingDecision;

/// Depth below which a level is considered exhausted and replenished
const REPLENISH_THRESHOLD: f64 = 0.1;

const BOOK_DEPTH: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("no order book available for {0}")]
    UnknownSymbol(String),

    #[error("order book for {0} has no liquidity")]
    EmptyBook(String),
}

/// One price level of the simulated book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub quantity: f64,
}

/// Simulated limit order book for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    pub symbol: String,
    /// Best bid first, descending prices
    pub bids: Vec<BookLevel>,
    /// Best ask first, ascending prices
    pub asks: Vec<BookLevel>,
    pub last_price: f64,
    /// Absolute per-level price increment (0.1% of the seed price)
    pub spread: f64,
    pub volume_24h: u64,
    pub updated_at: DateTime<Utc>,
}

impl OrderBook {
    /// Seed a fresh book around a base price: five levels per side,
    /// spaced one spread apart, with random depth per level.
    fn seeded(symbol: &str, base_price: f64, rng: &mut StdRng) -> Self {
        let spread = base_price * 0.001;
        let mut bids = Vec::with_capacity(BOOK_DEPTH);
        let mut asks = Vec::with_capacity(BOOK_DEPTH);

        for i in 0..BOOK_DEPTH {
            let offset = spread * (i + 1) as f64;
            bids.push(BookLevel {
                price: base_price - offset,
                quantity: level_quantity(symbol, rng),
            });
            asks.push(BookLevel {
                price: base_price + offset,
                quantity: level_quantity(symbol, rng),
            });
        }

        Self {
            symbol: symbol.to_string(),
            bids,
            asks,
            last_price: base_price,
            spread,
            volume_24h: rng.gen_range(1_000_000..5_000_000),
            updated_at: Utc::now(),
        }
    }

    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    /// Consume liquidity from one side, front levels first
    fn consume(&mut self, action: TradeAction, quantity: f64) {
        let levels = match action {
            TradeAction::Buy => &mut self.asks,
            TradeAction::Sell => &mut self.bids,
            TradeAction::Hold => return,
        };

        let mut remaining = quantity;
        for level in levels.iter_mut() {
            if remaining <= 0.0 {
                break;
            }
            let taken = level.quantity.min(remaining);
            level.quantity -= taken;
            remaining -= taken;
        }
    }

    /// Refill exhausted levels with fresh depth, re-priced around the
    /// last traded price with a little jitter.
    fn replenish(&mut self, rng: &mut StdRng) {
        let base_price = self.last_price;
        let spread = self.spread;
        let symbol = self.symbol.clone();

        for (i, bid) in self.bids.iter_mut().enumerate() {
            if bid.quantity < REPLENISH_THRESHOLD {
                bid.quantity = level_quantity(&symbol, rng);
                bid.price = base_price - spread * (i + 1) as f64 * rng.gen_range(0.9..1.1);
            }
        }
        for (i, ask) in self.asks.iter_mut().enumerate() {
            if ask.quantity < REPLENISH_THRESHOLD {
                ask.quantity = level_quantity(&symbol, rng);
                ask.price = base_price + spread * (i + 1) as f64 * rng.gen_range(0.9..1.1);
            }
        }
    }
}

fn level_quantity(symbol: &str, rng: &mut StdRng) -> f64 {
    if symbol.contains("BTC") {
        rng.gen_range(0.5..2.0)
    } else {
        rng.gen_range(10.0..50.0)
    }
}

/// Record of one execution attempt. Failed attempts carry a zero
/// execution price so success-rate stats stay meaningful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub order_id: String,
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: f64,
    pub target_price: f64,
    pub execution_price: f64,
    /// Slippage from the reference (best bid/ask) price, in percent
    pub slippage_percent: f64,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn succeeded(&self) -> bool {
        self.execution_price > 0.0
    }
}

/// Per-symbol slippage aggregates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlippageStats {
    pub total_trades: usize,
    pub total_slippage: f64,
    pub max_slippage: f64,
    pub min_slippage: f64,
}

impl SlippageStats {
    pub fn average_slippage(&self) -> f64 {
        if self.total_trades == 0 {
            0.0
        } else {
            self.total_slippage / self.total_trades as f64
        }
    }
}

/// Aggregate execution statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub total_trades: usize,
    pub successful_trades: usize,
    /// Percent of attempts that filled
    pub success_rate: f64,
    pub average_slippage: f64,
    pub slippage_by_symbol: HashMap<String, SlippageStats>,
}

/// Top-of-book view for status reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSummary {
    pub symbol: String,
    pub best_bid: f64,
    pub best_ask: f64,
    pub spread: f64,
    pub mid_price: f64,
    pub bid_depth: f64,
    pub ask_depth: f64,
    pub last_price: f64,
    pub volume_24h: u64,
}

/// Single-writer execution engine: owns the simulated books and the
/// execution history.
pub struct ExecutionEngine {
    books: HashMap<String, OrderBook>,
    history: Vec<ExecutionRecord>,
    slippage_stats: HashMap<String, SlippageStats>,
    rng: StdRng,
    sim_time_scale: f64,
}

impl ExecutionEngine {
    pub fn new(config: &Config) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: &Config, mut rng: StdRng) -> Self {
        let books = HashMap::from([
            (
                "BTC-USD".to_string(),
                OrderBook::seeded("BTC-USD", 49_500.0, &mut rng),
            ),
            (
                "ETH-USD".to_string(),
                OrderBook::seeded("ETH-USD", 2_850.0, &mut rng),
            ),
        ]);

        Self {
            books,
            history: Vec::new(),
            slippage_stats: HashMap::new(),
            rng,
            sim_time_scale: config.sim_time_scale,
        }
    }

    /// Install a book directly (test/fixture support)
    pub fn insert_book(&mut self, book: OrderBook) {
        self.books.insert(book.symbol.clone(), book);
    }

    pub fn book_summary(&self, symbol: &str) -> Option<BookSummary> {
        let book = self.books.get(symbol)?;
        let best_bid = book.best_bid().map(|l| l.price).unwrap_or(0.0);
        let best_ask = book.best_ask().map(|l| l.price).unwrap_or(0.0);

        Some(BookSummary {
            symbol: symbol.to_string(),
            best_bid,
            best_ask,
            spread: best_ask - best_bid,
            mid_price: (best_bid + best_ask) / 2.0,
            bid_depth: book.bids.iter().map(|l| l.quantity).sum(),
            ask_depth: book.asks.iter().map(|l| l.quantity).sum(),
            last_price: book.last_price,
            volume_24h: book.volume_24h,
        })
    }

    /// Execute a trading decision against its symbol's book.
    ///
    /// On success the book is mutated (liquidity consumed, last price
    /// updated, exhausted levels replenished). Failures leave the books
    /// untouched but are still recorded.
    pub async fn execute(
        &mut self,
        decision: &TradingDecision,
    ) -> Result<ExecutionRecord, ExecutionError> {
        let order_id = format!("ORD-{}", Uuid::new_v4());

        let priced = self.price_fill(decision);
        let (execution_price, slippage_percent) = match priced {
            Ok(fill) => fill,
            Err(error) => {
                warn!(
                    symbol = %decision.symbol,
                    %error,
                    "execution failed"
                );
                self.record(ExecutionRecord {
                    order_id,
                    symbol: decision.symbol.clone(),
                    action: decision.action,
                    quantity: decision.quantity,
                    target_price: decision.target_price,
                    execution_price: 0.0,
                    slippage_percent: 0.0,
                    confidence: decision.confidence,
                    timestamp: Utc::now(),
                });
                return Err(error);
            }
        };

        // Simulated fill latency
        if self.sim_time_scale > 0.0 {
            let delay = self.rng.gen_range(0.1..0.5) * self.sim_time_scale;
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        }

        if let Some(book) = self.books.get_mut(&decision.symbol) {
            book.consume(decision.action, decision.quantity);
            book.last_price = execution_price;
            book.replenish(&mut self.rng);
            book.updated_at = Utc::now();
        }

        let record = ExecutionRecord {
            order_id,
            symbol: decision.symbol.clone(),
            action: decision.action,
            quantity: decision.quantity,
            target_price: decision.target_price,
            execution_price,
            slippage_percent,
            confidence: decision.confidence,
            timestamp: Utc::now(),
        };

        info!(
            order_id = %record.order_id,
            symbol = %record.symbol,
            action = %record.action,
            quantity = record.quantity,
            execution_price = record.execution_price,
            slippage_percent = record.slippage_percent,
            "order filled"
        );

        self.record(record.clone());
        Ok(record)
    }

    /// Compute the fill price for a decision without mutating the book.
    ///
    /// Slippage is half the spread, scaled by the order's size relative
    /// to top-of-book depth (capped at 5x) and a random volatility
    /// factor. Buys fill above the best ask, sells below the best bid.
    fn price_fill(&mut self, decision: &TradingDecision) -> Result<(f64, f64), ExecutionError> {
        let book = self
            .books
            .get(&decision.symbol)
            .ok_or_else(|| ExecutionError::UnknownSymbol(decision.symbol.clone()))?;

        let top = match decision.action {
            TradeAction::Buy => book.best_ask(),
            _ => book.best_bid(),
        }
        .ok_or_else(|| ExecutionError::EmptyBook(decision.symbol.clone()))?;

        let reference_price = top.price;
        let size_ratio = if top.quantity > 0.0 {
            decision.quantity / top.quantity
        } else {
            0.0
        };

        let base_slippage = book.spread * 0.5;
        let size_slippage = base_slippage * (size_ratio * 2.0).min(5.0);
        let volatility_factor = self.rng.gen_range(0.8..1.2);
        let total_slippage = size_slippage * volatility_factor;

        let execution_price = match decision.action {
            TradeAction::Buy => reference_price + total_slippage,
            _ => reference_price - total_slippage,
        };
        let slippage_percent = (execution_price - reference_price).abs() / reference_price * 100.0;

        debug!(
            symbol = %decision.symbol,
            reference_price,
            size_ratio,
            total_slippage,
            "fill priced"
        );

        Ok((execution_price, slippage_percent))
    }

    fn record(&mut self, record: ExecutionRecord) {
        if record.succeeded() {
            let stats = self.slippage_stats.entry(record.symbol.clone()).or_insert(
                SlippageStats {
                    min_slippage: f64::INFINITY,
                    ..SlippageStats::default()
                },
            );
            stats.total_trades += 1;
            stats.total_slippage += record.slippage_percent;
            stats.max_slippage = stats.max_slippage.max(record.slippage_percent);
            stats.min_slippage = stats.min_slippage.min(record.slippage_percent);
        }
        self.history.push(record);
    }

    pub fn history(&self) -> &[ExecutionRecord] {
        &self.history
    }

    pub fn stats(&self) -> ExecutionStats {
        let total_trades = self.history.len();
        if total_trades == 0 {
            return ExecutionStats {
                total_trades: 0,
                successful_trades: 0,
                success_rate: 0.0,
                average_slippage: 0.0,
                slippage_by_symbol: HashMap::new(),
            };
        }

        let successful_trades = self.history.iter().filter(|r| r.succeeded()).count();
        let total_slippage: f64 = self.history.iter().map(|r| r.slippage_percent).sum();

        ExecutionStats {
            total_trades,
            successful_trades,
            success_rate: successful_trades as f64 / total_trades as f64 * 100.0,
            average_slippage: total_slippage / total_trades as f64,
            slippage_by_symbol: self.slippage_stats.clone(),
        }
    }
}

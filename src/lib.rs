// Maestro - Master/Slave Coordinated Trading System
// A central master agent polls portfolio state, fans research out to
// specialized worker agents, consolidates their recommendations into
// risk-sized trading decisions, and fills them against a simulated
// limit order book.

#![deny(clippy::unwrap_used)]

pub mod agents;
pub mod config;
pub mod health;
pub mod orchestrator;
pub mod portfolio;
pub mod trading;

// Re-export commonly used items
pub use config::Config;
pub use orchestrator::{MasterLoop, ResearchOrchestrator};
pub use portfolio::{PortfolioSnapshot, PortfolioState};
pub use trading::TradingDecision;

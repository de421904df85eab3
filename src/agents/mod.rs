//! Research agent types: specialist identifiers, task labels, and the
//! standardized report shape every worker produces.

mod workers;

pub use workers::ResearchWorker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// The four research specialties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentType {
    Technical,
    Fundamental,
    Sentiment,
    Risk,
}

impl AgentType {
    pub const ALL: [AgentType; 4] = [
        AgentType::Technical,
        AgentType::Fundamental,
        AgentType::Sentiment,
        AgentType::Risk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Technical => "technical",
            AgentType::Fundamental => "fundamental",
            AgentType::Sentiment => "sentiment",
            AgentType::Risk => "risk",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels for the research tasks the master can assign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResearchTask {
    ResearchBuyOpportunities,
    AssessMarketFundamentals,
    AnalyzeMarketSentiment,
    AnalyzeLossRecovery,
    FindExitStrategies,
    AssessVolatilityRisk,
    AnalyzeVolatilityPatterns,
}

impl fmt::Display for ResearchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResearchTask::ResearchBuyOpportunities => "research_buy_opportunities",
            ResearchTask::AssessMarketFundamentals => "assess_market_fundamentals",
            ResearchTask::AnalyzeMarketSentiment => "analyze_market_sentiment",
            ResearchTask::AnalyzeLossRecovery => "analyze_loss_recovery",
            ResearchTask::FindExitStrategies => "find_exit_strategies",
            ResearchTask::AssessVolatilityRisk => "assess_volatility_risk",
            ResearchTask::AnalyzeVolatilityPatterns => "analyze_volatility_patterns",
        };
        f.write_str(label)
    }
}

/// Trade direction carried by recommendations and decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::Hold => "HOLD",
        };
        f.write_str(label)
    }
}

/// A single per-symbol recommendation inside a research report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub symbol: String,
    pub action: TradeAction,
    /// Recommendation-level confidence in [0, 1]
    pub confidence: f64,
    pub reasoning: String,
}

/// Standardized research report produced by every worker invocation.
///
/// Immutable once produced. A zero-confidence report with no
/// recommendations denotes a failed invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    pub agent_type: AgentType,
    /// Opaque structured findings, keyed by topic
    pub findings: HashMap<String, Value>,
    pub recommendations: Vec<Recommendation>,
    /// Report-level confidence in [0, 1]
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl ResearchReport {
    /// Fallback report substituted when a worker errors or exceeds its
    /// time budget. Never aborts the batch it belongs to.
    pub fn failed(agent_type: AgentType) -> Self {
        Self {
            agent_type,
            findings: HashMap::new(),
            recommendations: Vec::new(),
            confidence: 0.0,
            timestamp: Utc::now(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.confidence == 0.0 && self.recommendations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_report_shape() {
        let report = ResearchReport::failed(AgentType::Technical);
        assert_eq!(report.agent_type, AgentType::Technical);
        assert_eq!(report.confidence, 0.0);
        assert!(report.recommendations.is_empty());
        assert!(report.findings.is_empty());
        assert!(report.is_failure());
    }

    #[test]
    fn test_agent_type_labels() {
        assert_eq!(AgentType::Technical.to_string(), "technical");
        assert_eq!(AgentType::Risk.to_string(), "risk");
        assert_eq!(AgentType::ALL.len(), 4);
    }

    #[test]
    fn test_action_labels() {
        assert_eq!(TradeAction::Buy.to_string(), "BUY");
        assert_eq!(TradeAction::Hold.to_string(), "HOLD");
    }
}

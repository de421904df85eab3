//! Simulated specialist research workers.
//!
//! Each worker stands in for an LLM-backed analyst: it "thinks" for a
//! fixed delay, then returns canned findings and recommendations keyed
//! off the task label. The master only depends on the `ResearchReport`
//! shape, so a real research backend can replace these wholesale.

use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::portfolio::PortfolioSnapshot;

use super::{AgentType, Recommendation, ResearchReport, ResearchTask, TradeAction};

/// One research specialist, selected by its `AgentType` tag.
#[derive(Debug, Clone)]
pub struct ResearchWorker {
    agent_type: AgentType,
    think_delay: Duration,
}

impl ResearchWorker {
    /// Build a worker with its specialty-specific simulated think time,
    /// scaled by `sim_time_scale` (0 disables the delay).
    pub fn new(agent_type: AgentType, sim_time_scale: f64) -> Self {
        let base_secs = match agent_type {
            AgentType::Technical => 1.0,
            AgentType::Fundamental => 1.5,
            AgentType::Sentiment => 1.2,
            AgentType::Risk => 1.3,
        };
        Self {
            agent_type,
            think_delay: Duration::from_secs_f64(base_secs * sim_time_scale),
        }
    }

    pub fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    /// Run one research task against the given portfolio snapshot.
    pub async fn execute(
        &self,
        task: ResearchTask,
        snapshot: Arc<PortfolioSnapshot>,
    ) -> Result<ResearchReport> {
        debug!(agent = %self.agent_type, task = %task, "research task started");

        // Stand-in for network/LLM latency
        if !self.think_delay.is_zero() {
            tokio::time::sleep(self.think_delay).await;
        }

        let report = match self.agent_type {
            AgentType::Technical => self.technical_report(task),
            AgentType::Fundamental => self.fundamental_report(),
            AgentType::Sentiment => self.sentiment_report(),
            AgentType::Risk => self.risk_report(task, &snapshot),
        };

        debug!(
            agent = %self.agent_type,
            confidence = report.confidence,
            recommendations = report.recommendations.len(),
            "research task completed"
        );

        Ok(report)
    }

    fn technical_report(&self, task: ResearchTask) -> ResearchReport {
        let buy_research = task == ResearchTask::ResearchBuyOpportunities;

        let mut findings: HashMap<String, Value> = HashMap::new();
        findings.insert(
            "rsi_levels".to_string(),
            json!({ "BTC-USD": 45.2, "ETH-USD": 62.8 }),
        );
        findings.insert(
            "support_resistance".to_string(),
            json!({
                "BTC-USD": { "support": 48_000, "resistance": 52_000 },
                "ETH-USD": { "support": 2_800, "resistance": 3_200 },
            }),
        );
        findings.insert(
            "trend_direction".to_string(),
            json!({ "BTC-USD": "bullish", "ETH-USD": "neutral" }),
        );
        findings.insert(
            "entry_signals".to_string(),
            json!({
                "BTC-USD": if buy_research { "strong_buy" } else { "hold" },
                "ETH-USD": if buy_research { "buy" } else { "hold" },
            }),
        );

        let recommendations = match task {
            ResearchTask::ResearchBuyOpportunities => vec![
                Recommendation {
                    symbol: "BTC-USD".to_string(),
                    action: TradeAction::Buy,
                    confidence: 0.85,
                    reasoning: "RSI oversold, strong support at 48k, bullish trend".to_string(),
                },
                Recommendation {
                    symbol: "ETH-USD".to_string(),
                    action: TradeAction::Buy,
                    confidence: 0.70,
                    reasoning: "Neutral trend but good risk/reward near support".to_string(),
                },
            ],
            ResearchTask::FindExitStrategies => vec![Recommendation {
                symbol: "BTC-USD".to_string(),
                action: TradeAction::Hold,
                confidence: 0.60,
                reasoning: "No clear exit signal, wait for resistance test".to_string(),
            }],
            _ => Vec::new(),
        };

        ResearchReport {
            agent_type: self.agent_type,
            findings,
            recommendations,
            confidence: if buy_research { 0.78 } else { 0.65 },
            timestamp: Utc::now(),
        }
    }

    fn fundamental_report(&self) -> ResearchReport {
        let mut findings: HashMap<String, Value> = HashMap::new();
        findings.insert(
            "market_cap_analysis".to_string(),
            json!({
                "BTC-USD": "dominant_position",
                "ETH-USD": "strong_fundamentals",
            }),
        );
        findings.insert(
            "adoption_metrics".to_string(),
            json!({
                "BTC-USD": "institutional_adoption_increasing",
                "ETH-USD": "defi_growth_strong",
            }),
        );
        findings.insert(
            "regulatory_environment".to_string(),
            json!("neutral_to_positive"),
        );
        findings.insert("macro_factors".to_string(), json!("favorable_for_crypto"));

        ResearchReport {
            agent_type: self.agent_type,
            findings,
            recommendations: vec![
                Recommendation {
                    symbol: "BTC-USD".to_string(),
                    action: TradeAction::Buy,
                    confidence: 0.80,
                    reasoning: "Strong fundamentals, institutional adoption increasing".to_string(),
                },
                Recommendation {
                    symbol: "ETH-USD".to_string(),
                    action: TradeAction::Buy,
                    confidence: 0.75,
                    reasoning: "DeFi ecosystem growth, strong developer activity".to_string(),
                },
            ],
            confidence: 0.75,
            timestamp: Utc::now(),
        }
    }

    fn sentiment_report(&self) -> ResearchReport {
        let mut findings: HashMap<String, Value> = HashMap::new();
        findings.insert(
            "social_sentiment".to_string(),
            json!({ "BTC-USD": 0.72, "ETH-USD": 0.65 }),
        );
        findings.insert(
            "news_sentiment".to_string(),
            json!({ "BTC-USD": 0.68, "ETH-USD": 0.62 }),
        );
        findings.insert("fear_greed_index".to_string(), json!(65));
        findings.insert("market_mood".to_string(), json!("optimistic"));

        ResearchReport {
            agent_type: self.agent_type,
            findings,
            recommendations: vec![
                Recommendation {
                    symbol: "BTC-USD".to_string(),
                    action: TradeAction::Buy,
                    confidence: 0.70,
                    reasoning: "Positive social sentiment, greed index suggests momentum"
                        .to_string(),
                },
                Recommendation {
                    symbol: "ETH-USD".to_string(),
                    action: TradeAction::Hold,
                    confidence: 0.55,
                    reasoning: "Moderate sentiment, wait for clearer signals".to_string(),
                },
            ],
            confidence: 0.68,
            timestamp: Utc::now(),
        }
    }

    fn risk_report(&self, task: ResearchTask, snapshot: &PortfolioSnapshot) -> ResearchReport {
        let mut findings: HashMap<String, Value> = HashMap::new();
        findings.insert(
            "market_volatility".to_string(),
            json!(snapshot.market_conditions.volatility),
        );
        findings.insert("portfolio_risk".to_string(), json!("moderate"));
        findings.insert(
            "correlation_analysis".to_string(),
            json!({ "BTC-USD": 0.85, "ETH-USD": 0.78 }),
        );
        findings.insert("liquidity_analysis".to_string(), json!("high_liquidity"));
        findings.insert("systemic_risks".to_string(), json!("low"));

        let recommendations = if task == ResearchTask::AnalyzeLossRecovery {
            vec![Recommendation {
                symbol: "BTC-USD".to_string(),
                action: TradeAction::Hold,
                confidence: 0.65,
                reasoning: "Risk of selling at bottom, better to hold through volatility"
                    .to_string(),
            }]
        } else {
            vec![
                Recommendation {
                    symbol: "BTC-USD".to_string(),
                    action: TradeAction::Buy,
                    confidence: 0.72,
                    reasoning: "Acceptable risk levels, good risk/reward ratio".to_string(),
                },
                Recommendation {
                    symbol: "ETH-USD".to_string(),
                    action: TradeAction::Buy,
                    confidence: 0.68,
                    reasoning: "Moderate risk, suitable for current portfolio".to_string(),
                },
            ]
        };

        ResearchReport {
            agent_type: self.agent_type,
            findings,
            recommendations,
            confidence: 0.70,
            timestamp: Utc::now(),
        }
    }
}

//! Consensus and sizing behavior of the decision engine, driven through
//! the public API with hand-built research reports.

use std::collections::HashMap;

use chrono::Utc;

use maestro::agents::{AgentType, Recommendation, ResearchReport, TradeAction};
use maestro::portfolio::PortfolioState;
use maestro::trading::DecisionEngine;
use maestro::Config;

fn report(
    agent_type: AgentType,
    confidence: f64,
    recommendations: &[(&str, TradeAction, f64)],
) -> ResearchReport {
    ResearchReport {
        agent_type,
        findings: HashMap::new(),
        recommendations: recommendations
            .iter()
            .map(|(symbol, action, confidence)| Recommendation {
                symbol: symbol.to_string(),
                action: *action,
                confidence: *confidence,
                reasoning: "fixture".to_string(),
            })
            .collect(),
        confidence,
        timestamp: Utc::now(),
    }
}

#[test]
fn unanimous_buy_reports_reach_full_confidence() {
    let engine = DecisionEngine::new(&Config::for_tests());
    let snapshot = PortfolioState::with_holdings(100_000.0, Vec::new()).snapshot();

    let reports = vec![
        report(
            AgentType::Technical,
            0.78,
            &[("BTC-USD", TradeAction::Buy, 0.85)],
        ),
        report(
            AgentType::Fundamental,
            0.75,
            &[("BTC-USD", TradeAction::Buy, 0.80)],
        ),
    ];

    let decisions = engine.consolidate(&reports, &snapshot);
    assert_eq!(decisions.len(), 1);

    let decision = &decisions[0];
    assert_eq!(decision.symbol, "BTC-USD");
    assert_eq!(decision.action, TradeAction::Buy);
    assert!((decision.confidence - 1.0).abs() < 1e-9);
    assert_eq!(decision.target_price, 50_000.0);
    assert!(decision.reasoning.contains("Consensus: BUY"));
}

#[test]
fn every_emitted_decision_clears_the_confidence_gate() {
    let engine = DecisionEngine::new(&Config::for_tests());
    let snapshot = PortfolioState::with_holdings(100_000.0, Vec::new()).snapshot();

    // A spread of agreement levels across symbols
    let reports = vec![
        report(
            AgentType::Technical,
            0.78,
            &[
                ("BTC-USD", TradeAction::Buy, 0.85),
                ("ETH-USD", TradeAction::Buy, 0.70),
                ("SOL-USD", TradeAction::Buy, 0.50),
            ],
        ),
        report(
            AgentType::Sentiment,
            0.68,
            &[
                ("BTC-USD", TradeAction::Buy, 0.70),
                ("ETH-USD", TradeAction::Hold, 0.55),
                ("SOL-USD", TradeAction::Sell, 0.60),
            ],
        ),
    ];

    for decision in engine.consolidate(&reports, &snapshot) {
        assert!(decision.confidence >= 0.65, "{:?}", decision);
    }
}

#[test]
fn contested_symbol_with_no_strict_winner_is_dropped() {
    let engine = DecisionEngine::new(&Config::for_tests());
    let snapshot = PortfolioState::with_holdings(100_000.0, Vec::new()).snapshot();

    // Identical weight on BUY and SELL
    let reports = vec![
        report(
            AgentType::Technical,
            0.8,
            &[("BTC-USD", TradeAction::Buy, 0.6)],
        ),
        report(
            AgentType::Risk,
            0.8,
            &[("BTC-USD", TradeAction::Sell, 0.6)],
        ),
    ];

    assert!(engine.consolidate(&reports, &snapshot).is_empty());
}

#[test]
fn sizing_never_exceeds_the_position_cap() {
    // A deliberately aggressive risk budget so the cap is what binds
    let config = Config {
        max_risk_per_trade: 0.5,
        ..Config::for_tests()
    };
    let engine = DecisionEngine::new(&config);

    let mut portfolio = PortfolioState::with_holdings(1_000_000.0, Vec::new());
    // Volatility low enough that the raw size formula is unconstrained
    portfolio.set_market_volatility(0.01);
    let snapshot = portfolio.snapshot();

    let reports = vec![report(
        AgentType::Technical,
        1.0,
        &[("BTC-USD", TradeAction::Buy, 1.0)],
    )];

    let decisions = engine.consolidate(&reports, &snapshot);
    let notional = decisions[0].notional();
    assert!(notional > 0.0);
    assert!(notional <= snapshot.portfolio_value * config.max_position_size + 1e-6);
}

#[test]
fn failed_reports_are_ignored_in_consensus() {
    let engine = DecisionEngine::new(&Config::for_tests());
    let snapshot = PortfolioState::with_holdings(100_000.0, Vec::new()).snapshot();

    let reports = vec![
        ResearchReport::failed(AgentType::Technical),
        ResearchReport::failed(AgentType::Risk),
    ];

    assert!(engine.consolidate(&reports, &snapshot).is_empty());
}

//! The master trading loop: polls the portfolio, dispatches research,
//! consolidates decisions, validates, executes, and records health
//! samples throughout.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::health::HealthMonitor;
use crate::portfolio::{PerformanceSummary, PortfolioSnapshot, PortfolioState};
use crate::trading::{
    DailyLossTracker, DecisionEngine, ExecutionEngine, ExecutionStats, RiskValidator,
};

use super::ResearchOrchestrator;

/// Outcome of a single master cycle
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleReport {
    /// Whether this cycle dispatched research at all
    pub researched: bool,
    pub reports: usize,
    pub decisions: usize,
    pub executed: usize,
}

/// Point-in-time view of the whole system
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub last_research_time: Option<DateTime<Utc>>,
    pub trades_executed: usize,
    pub available_agents: usize,
    pub health_score: f64,
    pub portfolio_value: f64,
    pub performance: PerformanceSummary,
    pub execution: ExecutionStats,
}

/// Central coordinator. Owns every component; nothing else mutates the
/// portfolio or the books.
pub struct MasterLoop {
    config: Config,
    portfolio: PortfolioState,
    orchestrator: ResearchOrchestrator,
    decision_engine: DecisionEngine,
    validator: RiskValidator,
    execution: ExecutionEngine,
    health: HealthMonitor,
    loss_tracker: DailyLossTracker,
    last_research_time: Option<DateTime<Utc>>,
    trades_executed: usize,
}

impl MasterLoop {
    pub fn new(config: Config) -> Self {
        Self::with_portfolio(config, PortfolioState::new())
    }

    /// Build with an explicit portfolio (test/fixture support)
    pub fn with_portfolio(config: Config, portfolio: PortfolioState) -> Self {
        let loss_tracker = DailyLossTracker::new(
            config.daily_loss_limit,
            Utc::now(),
            portfolio.portfolio_value(),
        );

        Self {
            orchestrator: ResearchOrchestrator::new(&config),
            decision_engine: DecisionEngine::new(&config),
            validator: RiskValidator::new(&config),
            execution: ExecutionEngine::new(&config),
            health: HealthMonitor::new(),
            loss_tracker,
            last_research_time: None,
            trades_executed: 0,
            portfolio,
            config,
        }
    }

    pub fn portfolio(&self) -> &PortfolioState {
        &self.portfolio
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn trades_executed(&self) -> usize {
        self.trades_executed
    }

    /// Whether any condition calls for a research pass this cycle
    fn needs_research(&self, snapshot: &PortfolioSnapshot) -> bool {
        let mut conditions: Vec<&str> = Vec::new();

        if snapshot.available_balance > snapshot.portfolio_value * 0.1 {
            conditions.push("sufficient_funds_available");
        }
        if snapshot.positions.len() < 8 {
            conditions.push("portfolio_not_full");
        }
        if snapshot.positions.iter().any(|p| p.pnl_percent < -5.0) {
            conditions.push("losing_positions_present");
        }
        match self.last_research_time {
            None => conditions.push("regular_research_interval"),
            Some(last) if Utc::now() - last > self.config.research_interval() => {
                conditions.push("regular_research_interval");
            }
            Some(_) => {}
        }
        if snapshot.market_conditions.volatility > 0.7 {
            conditions.push("high_volatility_environment");
        }

        if conditions.is_empty() {
            false
        } else {
            debug!(?conditions, "research conditions met");
            true
        }
    }

    /// One full iteration: refresh the market, dispatch research if
    /// warranted, consolidate and execute decisions.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.portfolio.refresh_market();
        let snapshot = self.portfolio.snapshot();
        let now = Utc::now();
        self.loss_tracker.observe(now, snapshot.portfolio_value);

        if !self.needs_research(&snapshot) {
            debug!("no research conditions met, idle cycle");
            return Ok(CycleReport::default());
        }

        info!(
            portfolio_value = snapshot.portfolio_value,
            triggers = snapshot.research_triggers.len(),
            "research needed, activating workers"
        );

        let research_started = Instant::now();
        let assignments = self.orchestrator.plan_tasks(&snapshot);
        let snapshot = Arc::new(snapshot);
        let reports = self
            .orchestrator
            .dispatch(assignments, Arc::clone(&snapshot))
            .await;
        let failures = reports.iter().filter(|r| r.is_failure()).count();
        self.health.record(
            "slave_research",
            research_started.elapsed().as_secs_f64(),
            failures == 0,
            failures as u32,
        );

        let decision_started = Instant::now();
        let decisions = self.decision_engine.consolidate(&reports, &snapshot);
        self.health.record(
            "decision_interpretation",
            decision_started.elapsed().as_secs_f64(),
            true,
            0,
        );

        let mut executed = 0;
        for decision in &decisions {
            if !decision.is_actionable() {
                debug!(symbol = %decision.symbol, "skipping non-actionable decision");
                continue;
            }

            // Re-validate against a fresh snapshot: earlier fills this
            // cycle may have consumed the balance.
            let fresh = self.portfolio.snapshot();
            if self.loss_tracker.is_breached(fresh.portfolio_value) {
                warn!("daily loss limit breached, halting execution for this cycle");
                break;
            }
            if let Err(rejection) = self.validator.validate(decision, &fresh) {
                info!(symbol = %decision.symbol, %rejection, "decision rejected by risk gate");
                continue;
            }

            let execution_started = Instant::now();
            match self.execution.execute(decision).await {
                Ok(record) => {
                    match self.portfolio.apply_fill(
                        &decision.symbol,
                        decision.action,
                        decision.quantity,
                        record.execution_price,
                    ) {
                        Ok(realized) => {
                            self.loss_tracker.record_realized(realized);
                            self.trades_executed += 1;
                            executed += 1;
                            self.health.record(
                                "trade_execution",
                                execution_started.elapsed().as_secs_f64(),
                                true,
                                0,
                            );
                        }
                        Err(error) => {
                            error!(
                                symbol = %decision.symbol,
                                %error,
                                "fill could not be applied to the portfolio"
                            );
                            self.health.record(
                                "trade_execution",
                                execution_started.elapsed().as_secs_f64(),
                                false,
                                1,
                            );
                        }
                    }
                }
                Err(error) => {
                    warn!(symbol = %decision.symbol, %error, "trade execution failed");
                    self.health.record(
                        "trade_execution",
                        execution_started.elapsed().as_secs_f64(),
                        false,
                        1,
                    );
                }
            }
        }

        self.last_research_time = Some(now);
        Ok(CycleReport {
            researched: true,
            reports: reports.len(),
            decisions: decisions.len(),
            executed,
        })
    }

    /// Run forever: cycle, sleep, repeat; back off after a failed cycle.
    pub async fn run(&mut self) -> Result<()> {
        info!("master trading loop started");

        loop {
            match self.run_cycle().await {
                Ok(report) => {
                    debug!(
                        researched = report.researched,
                        decisions = report.decisions,
                        executed = report.executed,
                        "cycle complete"
                    );
                    tokio::time::sleep(self.config.cycle_interval()).await;
                }
                Err(error) => {
                    error!(%error, "trading cycle failed");
                    tokio::time::sleep(self.config.error_backoff()).await;
                }
            }
        }
    }

    pub fn system_status(&self) -> SystemStatus {
        SystemStatus {
            last_research_time: self.last_research_time,
            trades_executed: self.trades_executed,
            available_agents: self.orchestrator.available_agents(),
            health_score: self.health.health_score(),
            portfolio_value: self.portfolio.portfolio_value(),
            performance: self.portfolio.performance_summary(),
            execution: self.execution.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_research_on_fresh_system() {
        let master = MasterLoop::with_portfolio(Config::for_tests(), PortfolioState::new());
        let snapshot = master.portfolio.snapshot();

        // Never researched and the portfolio has room: research is due
        assert!(master.needs_research(&snapshot));
    }

    #[test]
    fn test_no_research_when_all_conditions_clear() {
        let mut portfolio = PortfolioState::with_holdings(
            0.0,
            (0..8)
                .map(|i| {
                    crate::portfolio::Position::new(format!("SYM{i}-USD"), 1.0, 100.0, 100.0)
                })
                .collect(),
        );
        portfolio.set_market_volatility(0.4);

        let mut master = MasterLoop::with_portfolio(Config::for_tests(), portfolio);
        master.last_research_time = Some(Utc::now());

        // No cash, full book, no losers, calm market, recent research
        let snapshot = master.portfolio.snapshot();
        assert!(!master.needs_research(&snapshot));
    }

    #[tokio::test]
    async fn test_research_cycle_records_health_samples() {
        let mut master = MasterLoop::with_portfolio(Config::for_tests(), PortfolioState::new());
        let report = master.run_cycle().await.expect("cycle");

        assert!(report.researched);
        assert!(report.reports > 0);
        // At least research and decision samples land every research cycle
        assert!(master.health().sample_count() >= 2);
        assert!(master.system_status().last_research_time.is_some());
    }
}

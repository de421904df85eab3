//! Research fan-out: maps portfolio triggers to worker assignments,
//! runs the assigned workers in parallel under a time budget, and
//! tracks per-worker performance history.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, warn};

use crate::agents::{AgentType, ResearchReport, ResearchTask, ResearchWorker};
use crate::config::Config;
use crate::portfolio::{PortfolioSnapshot, ResearchTrigger};

/// Score assumed for workers with no recorded history yet
const DEFAULT_PERFORMANCE_SCORE: f64 = 0.7;

/// Owns the research workers and their performance history.
pub struct ResearchOrchestrator {
    workers: HashMap<AgentType, ResearchWorker>,
    performance_history: HashMap<AgentType, Vec<f64>>,
    worker_budget: Duration,
}

impl ResearchOrchestrator {
    pub fn new(config: &Config) -> Self {
        let workers = AgentType::ALL
            .into_iter()
            .map(|agent_type| {
                (
                    agent_type,
                    ResearchWorker::new(agent_type, config.sim_time_scale),
                )
            })
            .collect();

        Self {
            workers,
            performance_history: HashMap::new(),
            worker_budget: config.worker_budget(),
        }
    }

    pub fn available_agents(&self) -> usize {
        self.workers.len()
    }

    /// Map the snapshot's research triggers to worker assignments.
    ///
    /// Triggers are applied in a fixed order and each agent holds at
    /// most one task, so a later trigger reassigns an agent claimed by
    /// an earlier one.
    pub fn plan_tasks(&self, snapshot: &PortfolioSnapshot) -> HashMap<AgentType, ResearchTask> {
        let mut assignments = HashMap::new();

        if snapshot
            .research_triggers
            .contains(&ResearchTrigger::SufficientFunds)
        {
            assignments.insert(AgentType::Technical, ResearchTask::ResearchBuyOpportunities);
            assignments.insert(
                AgentType::Fundamental,
                ResearchTask::AssessMarketFundamentals,
            );
            assignments.insert(AgentType::Sentiment, ResearchTask::AnalyzeMarketSentiment);
        }

        if snapshot
            .research_triggers
            .contains(&ResearchTrigger::LosingPositions)
        {
            assignments.insert(AgentType::Risk, ResearchTask::AnalyzeLossRecovery);
            assignments.insert(AgentType::Technical, ResearchTask::FindExitStrategies);
        }

        if snapshot
            .research_triggers
            .contains(&ResearchTrigger::HighVolatility)
        {
            assignments.insert(AgentType::Risk, ResearchTask::AssessVolatilityRisk);
            assignments.insert(AgentType::Technical, ResearchTask::AnalyzeVolatilityPatterns);
        }

        assignments
    }

    /// Run the assigned workers in parallel and collect their reports.
    ///
    /// A worker that errors or exceeds the time budget is replaced by a
    /// zero-confidence failure report; one bad worker never aborts the
    /// batch. Successful confidences feed the performance history.
    pub async fn dispatch(
        &mut self,
        assignments: HashMap<AgentType, ResearchTask>,
        snapshot: Arc<PortfolioSnapshot>,
    ) -> Vec<ResearchReport> {
        let mut handles = Vec::with_capacity(assignments.len());

        for (agent_type, task) in assignments {
            let Some(worker) = self.workers.get(&agent_type).cloned() else {
                warn!(agent = %agent_type, "no worker registered, skipping task");
                continue;
            };
            let snapshot = Arc::clone(&snapshot);
            let budget = self.worker_budget;

            handles.push((
                agent_type,
                task,
                tokio::spawn(async move { timeout(budget, worker.execute(task, snapshot)).await }),
            ));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (agent_type, task, handle) in handles {
            let report = match handle.await {
                Ok(Ok(Ok(report))) => {
                    info!(
                        agent = %agent_type,
                        %task,
                        confidence = report.confidence,
                        "research completed"
                    );
                    self.performance_history
                        .entry(agent_type)
                        .or_default()
                        .push(report.confidence);
                    report
                }
                Ok(Ok(Err(error))) => {
                    warn!(agent = %agent_type, %task, %error, "research failed");
                    ResearchReport::failed(agent_type)
                }
                Ok(Err(_elapsed)) => {
                    warn!(agent = %agent_type, %task, "research timed out");
                    ResearchReport::failed(agent_type)
                }
                Err(join_error) => {
                    warn!(agent = %agent_type, %task, %join_error, "research task panicked");
                    ResearchReport::failed(agent_type)
                }
            };
            reports.push(report);
        }

        reports
    }

    /// Historical average of a worker's report confidences
    pub fn performance_score(&self, agent_type: AgentType) -> f64 {
        match self.performance_history.get(&agent_type) {
            Some(history) if !history.is_empty() => {
                history.iter().sum::<f64>() / history.len() as f64
            }
            _ => DEFAULT_PERFORMANCE_SCORE,
        }
    }
}

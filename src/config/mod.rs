use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Runtime configuration for the master loop and its components.
///
/// Every option has a default; env vars override. Validation happens at
/// construction so components never see out-of-range thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Minimum consensus confidence required to emit a trading decision
    pub min_confidence_threshold: f64,

    /// Maximum risk per trade as fraction of portfolio value (e.g. 0.02 = 2%)
    pub max_risk_per_trade: f64,

    /// Maximum single-position size as fraction of portfolio value
    pub max_position_size: f64,

    /// Daily loss limit as fraction of start-of-day portfolio value
    pub daily_loss_limit: f64,

    /// Regular research interval in seconds (research is forced after this)
    pub research_interval_secs: u64,

    /// Sleep between healthy master-loop cycles, in seconds
    pub cycle_interval_secs: u64,

    /// Sleep after a failed cycle, in seconds
    pub error_backoff_secs: u64,

    /// Per-worker research time budget in seconds
    pub worker_budget_secs: u64,

    /// Multiplier for simulated latencies (worker think time, fill delay).
    /// 0.0 disables simulated delays entirely, which tests rely on.
    pub sim_time_scale: f64,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file - sets env vars that aren't already set
        dotenv::dotenv().ok();

        let config = Config {
            min_confidence_threshold: env::var("MAESTRO_MIN_CONFIDENCE")
                .unwrap_or_else(|_| "0.65".to_string())
                .parse()
                .context("Invalid MAESTRO_MIN_CONFIDENCE value")?,
            max_risk_per_trade: env::var("MAESTRO_MAX_RISK_PER_TRADE")
                .unwrap_or_else(|_| "0.02".to_string())
                .parse()
                .context("Invalid MAESTRO_MAX_RISK_PER_TRADE value")?,
            max_position_size: env::var("MAESTRO_MAX_POSITION_SIZE")
                .unwrap_or_else(|_| "0.15".to_string())
                .parse()
                .context("Invalid MAESTRO_MAX_POSITION_SIZE value")?,
            daily_loss_limit: env::var("MAESTRO_DAILY_LOSS_LIMIT")
                .unwrap_or_else(|_| "0.03".to_string())
                .parse()
                .context("Invalid MAESTRO_DAILY_LOSS_LIMIT value")?,
            research_interval_secs: env::var("MAESTRO_RESEARCH_INTERVAL_SECS")
                .unwrap_or_else(|_| "7200".to_string())
                .parse()
                .context("Invalid MAESTRO_RESEARCH_INTERVAL_SECS value")?,
            cycle_interval_secs: env::var("MAESTRO_CYCLE_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("Invalid MAESTRO_CYCLE_INTERVAL_SECS value")?,
            error_backoff_secs: env::var("MAESTRO_ERROR_BACKOFF_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid MAESTRO_ERROR_BACKOFF_SECS value")?,
            worker_budget_secs: env::var("MAESTRO_WORKER_BUDGET_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid MAESTRO_WORKER_BUDGET_SECS value")?,
            sim_time_scale: env::var("MAESTRO_SIM_TIME_SCALE")
                .unwrap_or_else(|_| "1.0".to_string())
                .parse()
                .context("Invalid MAESTRO_SIM_TIME_SCALE value")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate option ranges. Fractional limits must sit in (0, 1];
    /// intervals and budgets must be non-zero.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("min_confidence_threshold", self.min_confidence_threshold),
            ("max_risk_per_trade", self.max_risk_per_trade),
            ("max_position_size", self.max_position_size),
            ("daily_loss_limit", self.daily_loss_limit),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                bail!("{} must be in (0, 1], got {}", name, value);
            }
        }

        if self.research_interval_secs == 0 {
            bail!("research_interval_secs must be non-zero");
        }
        if self.cycle_interval_secs == 0 {
            bail!("cycle_interval_secs must be non-zero");
        }
        if self.error_backoff_secs == 0 {
            bail!("error_backoff_secs must be non-zero");
        }
        if self.worker_budget_secs == 0 {
            bail!("worker_budget_secs must be non-zero");
        }
        if self.sim_time_scale < 0.0 {
            bail!("sim_time_scale must be >= 0, got {}", self.sim_time_scale);
        }

        Ok(())
    }

    pub fn research_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.research_interval_secs as i64)
    }

    pub fn cycle_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn error_backoff(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.error_backoff_secs)
    }

    pub fn worker_budget(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.worker_budget_secs)
    }

    /// Configuration for tests: defaults with simulated delays disabled.
    pub fn for_tests() -> Self {
        Self {
            sim_time_scale: 0.0,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_confidence_threshold: 0.65,
            max_risk_per_trade: 0.02,
            max_position_size: 0.15,
            daily_loss_limit: 0.03,
            research_interval_secs: 7200,
            cycle_interval_secs: 60,
            error_backoff_secs: 30,
            worker_budget_secs: 10,
            sim_time_scale: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_confidence_threshold, 0.65);
        assert_eq!(config.max_risk_per_trade, 0.02);
        assert_eq!(config.max_position_size, 0.15);
        assert_eq!(config.daily_loss_limit, 0.03);
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let config = Config {
            min_confidence_threshold: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            max_risk_per_trade: 0.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = Config {
            cycle_interval_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_time_scale_rejected() {
        let config = Config {
            sim_time_scale: -1.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_test_config_disables_delays() {
        let config = Config::for_tests();
        assert_eq!(config.sim_time_scale, 0.0);
        assert!(config.validate().is_ok());
    }
}

//! System health monitoring: per-component performance samples, an
//! aggregate health score, and tuning recommendations.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Minimum sample count before trend analysis says anything
const TREND_MIN_SAMPLES: usize = 10;
/// Hourly buckets considered when classifying a trend
const TREND_RECENT_HOURS: usize = 6;

const EXECUTION_TIME_WARNING: f64 = 2.0;
const EXECUTION_TIME_CRITICAL: f64 = 5.0;
const SUCCESS_RATE_WARNING: f64 = 0.85;
const SUCCESS_RATE_CRITICAL: f64 = 0.70;
const ERROR_RATE_WARNING: f64 = 0.05;
const ERROR_RATE_CRITICAL: f64 = 0.10;

/// One timing/outcome sample for a named component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub component: String,
    /// Wall-clock duration of the operation in seconds
    pub execution_time: f64,
    pub success: bool,
    pub error_count: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Medium,
    High,
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Impact {
    Performance,
    Reliability,
}

/// A suggested operational followup derived from recent metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRecommendation {
    pub component: String,
    pub issue: String,
    pub recommendation: String,
    pub priority: Priority,
    pub impact: Impact,
}

/// Windowed aggregates for one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentMetrics {
    pub component: String,
    pub total_executions: usize,
    pub avg_execution_time: f64,
    pub max_execution_time: f64,
    pub min_execution_time: f64,
    pub avg_success_rate: f64,
    pub total_errors: u32,
    /// Errors per sample
    pub error_rate: f64,
}

/// Direction a metric is moving over recent hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Improving,
    Stable,
    Deteriorating,
}

/// One hourly bucket of aggregated samples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPoint {
    pub hour: DateTime<Utc>,
    pub avg_execution_time: f64,
    pub avg_success_rate: f64,
}

/// Hour-over-hour performance movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceTrends {
    /// Oldest first, at most the last 24 hourly buckets
    pub hourly: Vec<TrendPoint>,
    pub execution_trend: Trend,
    pub success_trend: Trend,
}

/// Point-in-time health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    /// 0-100, higher is healthier
    pub health_score: f64,
    pub total_samples: usize,
    pub components: HashMap<String, ComponentMetrics>,
    pub recommendations: Vec<HealthRecommendation>,
    /// `None` until enough history has accumulated
    pub trends: Option<PerformanceTrends>,
}

/// Collects performance samples from the master loop and derives an
/// overall health score plus per-component recommendations.
#[derive(Debug, Default)]
pub struct HealthMonitor {
    samples: Vec<MetricSample>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, component: &str, execution_time: f64, success: bool, error_count: u32) {
        self.record_sample(MetricSample {
            component: component.to_string(),
            execution_time,
            success,
            error_count,
            timestamp: Utc::now(),
        });
    }

    pub fn record_sample(&mut self, sample: MetricSample) {
        self.samples.push(sample);
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn windowed<'a>(
        &'a self,
        component: Option<&'a str>,
        window: Option<Duration>,
    ) -> impl Iterator<Item = &'a MetricSample> {
        let now = Utc::now();
        self.samples.iter().filter(move |s| {
            component.map_or(true, |c| s.component == c)
                && window.map_or(true, |w| now - s.timestamp <= w)
        })
    }

    /// Aggregate metrics for one component, optionally restricted to a
    /// recent time window. `None` if no samples match.
    pub fn component_metrics(
        &self,
        component: &str,
        window: Option<Duration>,
    ) -> Option<ComponentMetrics> {
        let samples: Vec<&MetricSample> = self.windowed(Some(component), window).collect();
        if samples.is_empty() {
            return None;
        }

        let count = samples.len() as f64;
        let total_errors: u32 = samples.iter().map(|s| s.error_count).sum();

        Some(ComponentMetrics {
            component: component.to_string(),
            total_executions: samples.len(),
            avg_execution_time: samples.iter().map(|s| s.execution_time).sum::<f64>() / count,
            max_execution_time: samples
                .iter()
                .map(|s| s.execution_time)
                .fold(f64::NEG_INFINITY, f64::max),
            min_execution_time: samples
                .iter()
                .map(|s| s.execution_time)
                .fold(f64::INFINITY, f64::min),
            avg_success_rate: samples.iter().filter(|s| s.success).count() as f64 / count,
            total_errors,
            error_rate: total_errors as f64 / count,
        })
    }

    /// Overall health score in [0, 100] over the last 30 minutes.
    ///
    /// Weighted blend of execution time (30%, capped at 10s), success
    /// rate (50%), and error rate (20%, capped at 10% errors/sample).
    /// No recent samples scores as fully healthy.
    pub fn health_score(&self) -> f64 {
        let recent: Vec<&MetricSample> = self.windowed(None, Some(Duration::minutes(30))).collect();
        if recent.is_empty() {
            return 100.0;
        }

        let count = recent.len() as f64;
        let avg_execution_time = recent.iter().map(|s| s.execution_time).sum::<f64>() / count;
        let execution_score = (1.0 - avg_execution_time / 10.0).max(0.0);

        let success_score = recent.iter().filter(|s| s.success).count() as f64 / count;

        let total_errors: u32 = recent.iter().map(|s| s.error_count).sum();
        let error_score = (1.0 - (total_errors as f64 / count) / 0.1).max(0.0);

        let score = (execution_score * 0.3 + success_score * 0.5 + error_score * 0.2) * 100.0;
        score.clamp(0.0, 100.0)
    }

    /// Threshold-based recommendations over the last hour of samples
    pub fn recommendations(&self) -> Vec<HealthRecommendation> {
        let window = Some(Duration::hours(1));
        let components: HashSet<String> =
            self.samples.iter().map(|s| s.component.clone()).collect();

        let mut recommendations = Vec::new();
        let mut names: Vec<String> = components.into_iter().collect();
        names.sort();

        for component in names {
            let Some(metrics) = self.component_metrics(&component, window) else {
                continue;
            };

            if metrics.avg_execution_time > EXECUTION_TIME_CRITICAL {
                recommendations.push(HealthRecommendation {
                    component: component.clone(),
                    issue: format!("Critical execution time: {:.2}s", metrics.avg_execution_time),
                    recommendation: "Optimize algorithm or add caching".to_string(),
                    priority: Priority::Critical,
                    impact: Impact::Performance,
                });
            } else if metrics.avg_execution_time > EXECUTION_TIME_WARNING {
                recommendations.push(HealthRecommendation {
                    component: component.clone(),
                    issue: format!("High execution time: {:.2}s", metrics.avg_execution_time),
                    recommendation: "Consider performance improvements".to_string(),
                    priority: Priority::High,
                    impact: Impact::Performance,
                });
            }

            if metrics.avg_success_rate < SUCCESS_RATE_CRITICAL {
                recommendations.push(HealthRecommendation {
                    component: component.clone(),
                    issue: format!(
                        "Critical success rate: {:.1}%",
                        metrics.avg_success_rate * 100.0
                    ),
                    recommendation: "Investigate and fix reliability issues".to_string(),
                    priority: Priority::Critical,
                    impact: Impact::Reliability,
                });
            } else if metrics.avg_success_rate < SUCCESS_RATE_WARNING {
                recommendations.push(HealthRecommendation {
                    component: component.clone(),
                    issue: format!("Low success rate: {:.1}%", metrics.avg_success_rate * 100.0),
                    recommendation: "Monitor and improve reliability".to_string(),
                    priority: Priority::Medium,
                    impact: Impact::Reliability,
                });
            }

            if metrics.error_rate > ERROR_RATE_CRITICAL {
                recommendations.push(HealthRecommendation {
                    component: component.clone(),
                    issue: format!("Critical error rate: {:.1}%", metrics.error_rate * 100.0),
                    recommendation: "Implement better error handling".to_string(),
                    priority: Priority::Critical,
                    impact: Impact::Reliability,
                });
            } else if metrics.error_rate > ERROR_RATE_WARNING {
                recommendations.push(HealthRecommendation {
                    component,
                    issue: format!("High error rate: {:.1}%", metrics.error_rate * 100.0),
                    recommendation: "Improve error handling and logging".to_string(),
                    priority: Priority::High,
                    impact: Impact::Reliability,
                });
            }
        }

        recommendations
    }

    /// Hour-over-hour movement of execution time and success rate.
    ///
    /// Samples are bucketed by hour; the trend slope is taken across
    /// the most recent buckets. `None` until at least ten samples span
    /// two or more hours.
    pub fn performance_trends(&self) -> Option<PerformanceTrends> {
        if self.samples.len() < TREND_MIN_SAMPLES {
            return None;
        }

        // BTreeMap keyed by hour index keeps buckets chronological
        let mut buckets: std::collections::BTreeMap<i64, Vec<&MetricSample>> =
            std::collections::BTreeMap::new();
        for sample in &self.samples {
            buckets
                .entry(sample.timestamp.timestamp().div_euclid(3600))
                .or_default()
                .push(sample);
        }
        if buckets.len() < 2 {
            return None;
        }

        let mut hourly: Vec<TrendPoint> = Vec::with_capacity(buckets.len());
        for (hour_index, samples) in &buckets {
            let Some(hour) = DateTime::from_timestamp(hour_index * 3600, 0) else {
                continue;
            };
            let count = samples.len() as f64;
            hourly.push(TrendPoint {
                hour,
                avg_execution_time: samples.iter().map(|s| s.execution_time).sum::<f64>() / count,
                avg_success_rate: samples.iter().filter(|s| s.success).count() as f64 / count,
            });
        }
        if hourly.len() > 24 {
            hourly.drain(..hourly.len() - 24);
        }

        let recent = &hourly[hourly.len().saturating_sub(TREND_RECENT_HOURS)..];
        let span = recent.len() as f64;
        let execution_slope =
            (recent[recent.len() - 1].avg_execution_time - recent[0].avg_execution_time) / span;
        let success_slope =
            (recent[recent.len() - 1].avg_success_rate - recent[0].avg_success_rate) / span;

        // Rising execution time is bad; rising success rate is good
        let execution_trend = if execution_slope > 0.1 {
            Trend::Deteriorating
        } else if execution_slope < -0.1 {
            Trend::Improving
        } else {
            Trend::Stable
        };
        let success_trend = if success_slope > 0.05 {
            Trend::Improving
        } else if success_slope < -0.05 {
            Trend::Deteriorating
        } else {
            Trend::Stable
        };

        Some(PerformanceTrends {
            hourly,
            execution_trend,
            success_trend,
        })
    }

    pub fn report(&self) -> HealthReport {
        let components: HashSet<String> =
            self.samples.iter().map(|s| s.component.clone()).collect();
        let window = Some(Duration::hours(1));

        let component_metrics: HashMap<String, ComponentMetrics> = components
            .into_iter()
            .filter_map(|c| self.component_metrics(&c, window).map(|m| (c, m)))
            .collect();

        let recommendations = self.recommendations();
        for recommendation in recommendations
            .iter()
            .filter(|r| r.priority == Priority::Critical)
        {
            warn!(
                component = %recommendation.component,
                issue = %recommendation.issue,
                "critical health issue detected"
            );
        }

        HealthReport {
            timestamp: Utc::now(),
            health_score: self.health_score(),
            total_samples: self.samples.len(),
            components: component_metrics,
            recommendations,
            trends: self.performance_trends(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(component: &str, execution_time: f64, success: bool, error_count: u32) -> MetricSample {
        MetricSample {
            component: component.to_string(),
            execution_time,
            success,
            error_count,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_empty_monitor_is_fully_healthy() {
        let monitor = HealthMonitor::new();
        assert_eq!(monitor.health_score(), 100.0);
        assert!(monitor.recommendations().is_empty());
    }

    #[test]
    fn test_health_score_weighting() {
        let mut monitor = HealthMonitor::new();
        // One perfect sample: exec 1s, success, no errors
        monitor.record_sample(sample("slave_research", 1.0, true, 0));

        // 0.3 * (1 - 0.1) + 0.5 * 1.0 + 0.2 * 1.0 = 0.97
        assert!((monitor.health_score() - 97.0).abs() < 1e-9);
    }

    #[test]
    fn test_failures_drag_score_down() {
        let mut monitor = HealthMonitor::new();
        monitor.record_sample(sample("trade_execution", 1.0, true, 0));
        monitor.record_sample(sample("trade_execution", 1.0, false, 1));

        // exec score 0.9, success 0.5, error score 1 - (0.5 / 0.1) -> 0
        // 0.3*0.9 + 0.5*0.5 + 0.2*0.0 = 0.52
        assert!((monitor.health_score() - 52.0).abs() < 1e-9);
    }

    #[test]
    fn test_old_samples_fall_out_of_score_window() {
        let mut monitor = HealthMonitor::new();
        monitor.record_sample(MetricSample {
            timestamp: Utc::now() - Duration::hours(2),
            ..sample("slave_research", 9.0, false, 5)
        });

        assert_eq!(monitor.health_score(), 100.0);
    }

    #[test]
    fn test_component_metrics_aggregation() {
        let mut monitor = HealthMonitor::new();
        monitor.record_sample(sample("slave_research", 1.0, true, 0));
        monitor.record_sample(sample("slave_research", 3.0, false, 2));
        monitor.record_sample(sample("trade_execution", 0.2, true, 0));

        let metrics = monitor
            .component_metrics("slave_research", None)
            .expect("metrics");
        assert_eq!(metrics.total_executions, 2);
        assert!((metrics.avg_execution_time - 2.0).abs() < 1e-9);
        assert_eq!(metrics.max_execution_time, 3.0);
        assert_eq!(metrics.min_execution_time, 1.0);
        assert!((metrics.avg_success_rate - 0.5).abs() < 1e-9);
        assert_eq!(metrics.total_errors, 2);
        assert!((metrics.error_rate - 1.0).abs() < 1e-9);

        assert!(monitor.component_metrics("unknown", None).is_none());
    }

    #[test]
    fn test_slow_component_flagged() {
        let mut monitor = HealthMonitor::new();
        monitor.record_sample(sample("slave_research", 6.0, true, 0));

        let recommendations = monitor.recommendations();
        assert!(recommendations.iter().any(|r| {
            r.component == "slave_research"
                && r.priority == Priority::Critical
                && r.impact == Impact::Performance
        }));
    }

    #[test]
    fn test_unreliable_component_flagged() {
        let mut monitor = HealthMonitor::new();
        // 1 of 4 succeeded: 25% success, 75% error rate
        for success in [true, false, false, false] {
            monitor.record_sample(sample(
                "trade_execution",
                0.2,
                success,
                u32::from(!success),
            ));
        }

        let recommendations = monitor.recommendations();
        assert!(recommendations
            .iter()
            .any(|r| r.priority == Priority::Critical && r.impact == Impact::Reliability));
    }

    #[test]
    fn test_trends_need_enough_history() {
        let mut monitor = HealthMonitor::new();
        for _ in 0..9 {
            monitor.record_sample(sample("slave_research", 1.0, true, 0));
        }
        assert!(monitor.performance_trends().is_none());

        // Ten samples all inside one hour still say nothing
        monitor.record_sample(sample("slave_research", 1.0, true, 0));
        assert!(monitor.performance_trends().is_none());
    }

    #[test]
    fn test_rising_execution_times_classified_as_deteriorating() {
        let mut monitor = HealthMonitor::new();
        let base = Utc::now() - Duration::hours(6);

        // Two samples per hour over six hours, each hour a second slower
        for hour in 0..6i64 {
            for _ in 0..2 {
                monitor.record_sample(MetricSample {
                    timestamp: base + Duration::hours(hour),
                    ..sample("trade_execution", 1.0 + hour as f64, true, 0)
                });
            }
        }

        let trends = monitor.performance_trends().expect("trends");
        assert_eq!(trends.hourly.len(), 6);
        assert!((trends.hourly[0].avg_execution_time - 1.0).abs() < 1e-9);
        assert!((trends.hourly[5].avg_execution_time - 6.0).abs() < 1e-9);
        assert_eq!(trends.execution_trend, Trend::Deteriorating);
        assert_eq!(trends.success_trend, Trend::Stable);

        // And the report carries them once history is sufficient
        assert!(monitor.report().trends.is_some());
    }

    #[test]
    fn test_recovering_success_rate_classified_as_improving() {
        let mut monitor = HealthMonitor::new();
        let base = Utc::now() - Duration::hours(5);

        // Early hours all fail, later hours all succeed; timing steady
        for hour in 0..5i64 {
            for _ in 0..2 {
                monitor.record_sample(MetricSample {
                    timestamp: base + Duration::hours(hour),
                    ..sample("slave_research", 1.0, hour >= 2, 0)
                });
            }
        }

        let trends = monitor.performance_trends().expect("trends");
        assert_eq!(trends.execution_trend, Trend::Stable);
        assert_eq!(trends.success_trend, Trend::Improving);
    }

    #[test]
    fn test_report_shape() {
        let mut monitor = HealthMonitor::new();
        monitor.record_sample(sample("slave_research", 1.0, true, 0));
        monitor.record_sample(sample("trade_execution", 0.3, true, 0));

        let report = monitor.report();
        assert_eq!(report.total_samples, 2);
        assert_eq!(report.components.len(), 2);
        assert!(report.health_score > 90.0);
    }
}

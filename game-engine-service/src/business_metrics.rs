// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use slot_common::{BusinessMetricsResponse, BusinessScenario, rtp_percent};
use tracing::{info, warn};

pub const BET_VOLUME: &str = "game.bet_volume";
pub const PAYOUT_VOLUME: &str = "game.payout_volume";
pub const WIN_RATE: &str = "game.win_rate";
pub const RTP: &str = "game.rtp";
pub const RTP_ROLLING: &str = "game.rtp.rolling";
pub const ACTIVE_SESSIONS: &str = "game.active_sessions";

const SPINS_TOTAL: &str = "game_engine_spins_total";
const WINS_TOTAL: &str = "game_engine_wins_total";
const SPIN_FAILURES_TOTAL: &str = "game_engine_spin_failures_total";
const ANOMALIES_TOTAL: &str = "game_engine_anomalies_total";
const BET_VOLUME_SUM: &str = "game_engine_bet_volume";
const PAYOUT_VOLUME_SUM: &str = "game_engine_payout_volume";
const BUSINESS_METRIC: &str = "game_engine_business_metric";

const RTP_LOW_THRESHOLD: f64 = 85.0;
const RTP_HIGH_THRESHOLD: f64 = 98.0;
const WIN_RATE_HIGH_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    Currency,
    Percent,
    None,
}

impl MetricUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricUnit::Currency => "currency",
            MetricUnit::Percent => "percent",
            MetricUnit::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyDirection {
    Low,
    High,
}

impl AnomalyDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            AnomalyDirection::Low => "low",
            AnomalyDirection::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Anomaly {
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub direction: AnomalyDirection,
}

/// Threshold rules for metrics that have one. Metrics without a rule never
/// raise an anomaly.
fn detect_anomaly(metric: &str, value: f64) -> Option<Anomaly> {
    let (threshold, direction) = match metric {
        RTP | RTP_ROLLING if value < RTP_LOW_THRESHOLD => (RTP_LOW_THRESHOLD, AnomalyDirection::Low),
        RTP | RTP_ROLLING if value > RTP_HIGH_THRESHOLD => {
            (RTP_HIGH_THRESHOLD, AnomalyDirection::High)
        }
        WIN_RATE if value > WIN_RATE_HIGH_THRESHOLD => {
            (WIN_RATE_HIGH_THRESHOLD, AnomalyDirection::High)
        }
        _ => return None,
    };
    Some(Anomaly {
        metric: metric.to_string(),
        value,
        threshold,
        direction,
    })
}

/// Registers help text with whichever recorder is current. Call once after
/// installing the exporter.
pub fn describe() {
    describe_counter!(SPINS_TOTAL, "Settled spins.");
    describe_counter!(WINS_TOTAL, "Settled winning spins.");
    describe_counter!(SPIN_FAILURES_TOTAL, "Failed spins.");
    describe_counter!(ANOMALIES_TOTAL, "Business metric anomalies detected.");
    describe_gauge!(BET_VOLUME_SUM, "Sum of settled bets.");
    describe_gauge!(PAYOUT_VOLUME_SUM, "Sum of settled payouts.");
    describe_gauge!(BUSINESS_METRIC, "Latest business metric value.");
}

/// Business metric sink. Every tracked value is logged as a structured
/// event and recorded through the `metrics` facade; `/metrics` renders
/// whatever recorder the process installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct BusinessMetrics;

impl BusinessMetrics {
    pub fn new() -> Self {
        Self
    }

    pub fn track_metric(&self, name: &str, value: f64, unit: MetricUnit, tags: &[(&str, &str)]) {
        info!(metric = %name, value, unit = unit.as_str(), tags = ?tags, "business metric");
        gauge!(BUSINESS_METRIC, "name" => name.to_string()).set(value);
    }

    /// Tracks the RTP percentage for `period` and returns it.
    pub fn track_rtp(&self, total_bets: f64, total_payouts: f64, period: &str) -> f64 {
        let rtp = rtp_percent(total_bets, total_payouts);
        self.track_metric(
            &format!("{RTP}.{period}"),
            rtp,
            MetricUnit::Percent,
            &[("period", period)],
        );
        rtp
    }

    pub fn track_with_anomaly_detection(
        &self,
        name: &str,
        value: f64,
        unit: MetricUnit,
        tags: &[(&str, &str)],
    ) -> Option<Anomaly> {
        self.track_metric(name, value, unit, tags);
        let anomaly = detect_anomaly(name, value)?;
        counter!(
            ANOMALIES_TOTAL,
            "metric" => anomaly.metric.clone(),
            "direction" => anomaly.direction.as_str()
        )
        .increment(1);
        warn!(
            metric = %anomaly.metric,
            value = anomaly.value,
            threshold = anomaly.threshold,
            direction = ?anomaly.direction,
            tags = ?tags,
            "business metric anomaly"
        );
        Some(anomaly)
    }

    pub fn record_spin(&self, win: bool, bet: f64, payout: f64) {
        counter!(SPINS_TOTAL).increment(1);
        if win {
            counter!(WINS_TOTAL).increment(1);
        }
        gauge!(BET_VOLUME_SUM).increment(bet);
        gauge!(PAYOUT_VOLUME_SUM).increment(payout);
    }

    pub fn record_failure(&self) {
        counter!(SPIN_FAILURES_TOTAL).increment(1);
    }

    /// Emits a canned set of metrics so dashboards and alerts can be
    /// exercised without real traffic.
    pub fn run_scenario(&self, scenario: BusinessScenario) -> BusinessMetricsResponse {
        let mut data = serde_json::Map::new();
        let status = match scenario {
            BusinessScenario::RtpAnomaly => {
                let tags = [("scenario", "demo")];
                self.track_with_anomaly_detection(RTP, 75.0, MetricUnit::Percent, &tags);
                self.track_with_anomaly_detection(RTP, 99.5, MetricUnit::Percent, &tags);
                data.insert("lowRtp".to_string(), serde_json::json!(75.0));
                data.insert("highRtp".to_string(), serde_json::json!(99.5));
                "RTP anomaly triggered"
            }
            BusinessScenario::SessionSurge => {
                self.track_metric(ACTIVE_SESSIONS, 150.0, MetricUnit::None, &[]);
                self.track_metric(ACTIVE_SESSIONS, 850.0, MetricUnit::None, &[("surge", "true")]);
                data.insert("normal".to_string(), serde_json::json!(150));
                data.insert("surge".to_string(), serde_json::json!(850));
                "Session surge triggered"
            }
            BusinessScenario::WinRateManipulation => {
                self.track_with_anomaly_detection(
                    WIN_RATE,
                    85.0,
                    MetricUnit::Percent,
                    &[("scenario", "demo"), ("fraud_risk", "high")],
                );
                data.insert("suspiciousRate".to_string(), serde_json::json!(85.0));
                "Win rate anomaly triggered"
            }
            BusinessScenario::Normal => {
                self.track_metric(RTP, 95.5, MetricUnit::Percent, &[]);
                self.track_metric(WIN_RATE, 35.0, MetricUnit::Percent, &[]);
                self.track_metric(ACTIVE_SESSIONS, 250.0, MetricUnit::None, &[]);
                "Normal metrics tracked"
            }
        };
        BusinessMetricsResponse {
            status: status.to_string(),
            data,
            error: None,
        }
    }
}

/// Per-test Prometheus recorders, so tests never touch the process-wide one.
#[cfg(test)]
pub(crate) mod testing {
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

    pub(crate) fn recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    /// Value of one series in the exposition text, e.g.
    /// `game_engine_business_metric{name="game.rtp"}`.
    pub(crate) fn sample(handle: &PrometheusHandle, series: &str) -> Option<f64> {
        handle.render().lines().find_map(|line| {
            let (name, value) = line.rsplit_once(' ')?;
            if name == series {
                value.parse().ok()
            } else {
                None
            }
        })
    }

    pub(crate) fn business_metric(handle: &PrometheusHandle, name: &str) -> Option<f64> {
        sample(handle, &format!("game_engine_business_metric{{name=\"{name}\"}}"))
    }

    /// Sum over every labelled series of `metric`.
    pub(crate) fn total(handle: &PrometheusHandle, metric: &str) -> f64 {
        handle
            .render()
            .lines()
            .filter(|line| {
                line.strip_prefix(metric)
                    .is_some_and(|rest| rest.starts_with('{') || rest.starts_with(' '))
            })
            .filter_map(|line| line.rsplit_once(' ')?.1.parse::<f64>().ok())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{business_metric, recorder, sample, total};
    use super::*;

    #[test]
    fn rtp_thresholds_flag_both_directions() {
        let (recorder, handle) = recorder();
        metrics::with_local_recorder(&recorder, || {
            let metrics = BusinessMetrics::new();
            let low = metrics
                .track_with_anomaly_detection(RTP_ROLLING, 80.0, MetricUnit::Percent, &[])
                .unwrap();
            assert_eq!(low.direction, AnomalyDirection::Low);
            let high = metrics
                .track_with_anomaly_detection(RTP, 99.0, MetricUnit::Percent, &[])
                .unwrap();
            assert_eq!(high.direction, AnomalyDirection::High);
            assert!(
                metrics
                    .track_with_anomaly_detection(RTP, 95.0, MetricUnit::Percent, &[])
                    .is_none()
            );
        });
        assert_eq!(total(&handle, ANOMALIES_TOTAL), 2.0);
        let text = handle.render();
        assert!(text.contains("metric=\"game.rtp.rolling\""));
        assert!(text.contains("direction=\"low\""));
    }

    #[test]
    fn metrics_without_rules_never_alert() {
        let (recorder, handle) = recorder();
        metrics::with_local_recorder(&recorder, || {
            assert!(
                BusinessMetrics::new()
                    .track_with_anomaly_detection(BET_VOLUME, 1e9, MetricUnit::Currency, &[])
                    .is_none()
            );
        });
        assert_eq!(business_metric(&handle, BET_VOLUME), Some(1e9));
        assert_eq!(total(&handle, ANOMALIES_TOTAL), 0.0);
    }

    #[test]
    fn track_rtp_uses_period_suffix() {
        let (recorder, handle) = recorder();
        metrics::with_local_recorder(&recorder, || {
            let metrics = BusinessMetrics::new();
            assert_eq!(metrics.track_rtp(200.0, 190.0, "session"), 95.0);
            assert_eq!(metrics.track_rtp(0.0, 0.0, "24h"), 0.0);
        });
        assert_eq!(business_metric(&handle, "game.rtp.session"), Some(95.0));
        assert_eq!(business_metric(&handle, "game.rtp.24h"), Some(0.0));
    }

    #[test]
    fn rtp_anomaly_scenario_reports_both_readings() {
        let (recorder, handle) = recorder();
        let response = metrics::with_local_recorder(&recorder, || {
            BusinessMetrics::new().run_scenario(BusinessScenario::RtpAnomaly)
        });
        assert_eq!(response.status, "RTP anomaly triggered");
        assert_eq!(response.data["lowRtp"], serde_json::json!(75.0));
        assert_eq!(response.data["highRtp"], serde_json::json!(99.5));
        assert_eq!(total(&handle, ANOMALIES_TOTAL), 2.0);
        assert_eq!(business_metric(&handle, RTP), Some(99.5));
    }

    #[test]
    fn session_surge_and_win_rate_scenarios() {
        let (recorder, handle) = recorder();
        let (surge, win_rate) = metrics::with_local_recorder(&recorder, || {
            let metrics = BusinessMetrics::new();
            (
                metrics.run_scenario(BusinessScenario::SessionSurge),
                metrics.run_scenario(BusinessScenario::WinRateManipulation),
            )
        });
        assert_eq!(surge.status, "Session surge triggered");
        assert_eq!(surge.data["surge"], serde_json::json!(850));
        assert_eq!(business_metric(&handle, ACTIVE_SESSIONS), Some(850.0));

        assert_eq!(win_rate.status, "Win rate anomaly triggered");
        assert_eq!(win_rate.data["suspiciousRate"], serde_json::json!(85.0));
        assert_eq!(total(&handle, ANOMALIES_TOTAL), 1.0);
    }

    #[test]
    fn normal_scenario_has_no_data() {
        let (recorder, handle) = recorder();
        let response = metrics::with_local_recorder(&recorder, || {
            BusinessMetrics::new().run_scenario(BusinessScenario::Normal)
        });
        assert_eq!(response.status, "Normal metrics tracked");
        assert!(response.data.is_empty());
        assert_eq!(total(&handle, ANOMALIES_TOTAL), 0.0);
    }

    #[test]
    fn exposition_lists_counters_and_gauges() {
        let (recorder, handle) = recorder();
        metrics::with_local_recorder(&recorder, || {
            describe();
            let metrics = BusinessMetrics::new();
            metrics.record_spin(true, 10.0, 30.0);
            metrics.record_spin(false, 5.0, 0.0);
            metrics.record_failure();
            metrics.track_metric(WIN_RATE, 100.0, MetricUnit::Percent, &[]);
        });

        let text = handle.render();
        assert!(text.contains("# TYPE game_engine_spins_total counter"));
        assert!(text.contains("# HELP game_engine_spins_total Settled spins."));
        assert_eq!(sample(&handle, SPINS_TOTAL), Some(2.0));
        assert_eq!(sample(&handle, WINS_TOTAL), Some(1.0));
        assert_eq!(sample(&handle, SPIN_FAILURES_TOTAL), Some(1.0));
        assert_eq!(sample(&handle, BET_VOLUME_SUM), Some(15.0));
        assert_eq!(sample(&handle, PAYOUT_VOLUME_SUM), Some(30.0));
        assert_eq!(business_metric(&handle, WIN_RATE), Some(100.0));
    }
}

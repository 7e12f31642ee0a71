// ═══════════════════════════════════════════════════════════════
// ANALYTICS AGGREGATOR - Because if you can't measure it, the bureau wins
// ═══════════════════════════════════════════════════════════════
//
// Read-only derivations over the dispute corpus: which bureau actually
// deletes things when asked, how long resolution takes, how the SLA
// picture looks over rolling 30/60/90-day windows, and how much paper
// is moving week by week.
//
// Everything here is a pure reduction — disputes in, numbers out, no
// side effects, and an empty repository produces zeros and empty lists
// rather than drama. A tiny HTTP server exposes the whole picture as
// JSON so the UI app can check on the engine without asking nicely.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{error, info};

use crate::guard::{EscalationGuard, GuardSnapshot};
use crate::models::{Bureau, Dispute, OutcomeResult};
use crate::repository::DisputeRepository;

/// How one bureau is performing across its disputes. "Success" means the
/// recorded outcome was a deletion or a correction — the two results
/// that actually change the report.
#[derive(Debug, Serialize, Clone)]
pub struct BureauPerformance {
    pub bureau: Bureau,
    pub disputes: usize,
    pub resolved: usize,
    pub favorable: usize,
    /// favorable / resolved. Zero when nothing has resolved yet.
    pub success_rate: f64,
    pub avg_resolution_days: f64,
}

/// The SLA picture over one rolling window: disputes filed in the last
/// `window_days`, how many of those have an outcome, and how many are
/// sitting past their deadline with no resolution in sight.
#[derive(Debug, Serialize, Clone)]
pub struct SlaWindow {
    pub window_days: i64,
    pub filed: usize,
    pub resolved: usize,
    pub overdue: usize,
}

/// Volume in one calendar bucket: disputes filed in it, deadlines that
/// lapsed in it.
#[derive(Debug, Serialize, Clone)]
pub struct VolumeBucket {
    pub bucket: String,
    pub filed: usize,
    pub deadlines_lapsed: usize,
}

/// The full analytics picture at a point in time.
#[derive(Debug, Serialize, Clone)]
pub struct AnalyticsSnapshot {
    pub generated_at: DateTime<Utc>,
    pub total_disputes: usize,
    pub open_disputes: usize,
    pub overdue_disputes: usize,
    pub resolved_disputes: usize,
    pub avg_resolution_days: f64,
    pub bureaus: Vec<BureauPerformance>,
    pub sla_windows: Vec<SlaWindow>,
    pub weekly_volume: Vec<VolumeBucket>,
    pub monthly_volume: Vec<VolumeBucket>,
}

fn is_favorable(result: OutcomeResult) -> bool {
    matches!(result, OutcomeResult::Deleted | OutcomeResult::Corrected)
}

fn is_overdue(dispute: &Dispute, now: DateTime<Utc>) -> bool {
    !dispute.status.is_terminal() && dispute.response_deadline.date_naive() < now.date_naive()
}

fn resolution_days(dispute: &Dispute) -> Option<f64> {
    let outcome = dispute.outcome.as_ref()?;
    Some((outcome.recorded_at - dispute.created_at).num_seconds() as f64 / 86_400.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Reduce the dispute corpus to the full analytics picture as of `now`.
pub fn aggregate(disputes: &[Dispute], now: DateTime<Utc>) -> AnalyticsSnapshot {
    let resolved: Vec<&Dispute> = disputes.iter().filter(|d| d.outcome.is_some()).collect();
    let resolution_times: Vec<f64> = disputes.iter().filter_map(resolution_days).collect();

    let bureaus = [Bureau::Experian, Bureau::Equifax, Bureau::Transunion]
        .into_iter()
        .filter_map(|bureau| {
            let subset: Vec<&Dispute> = disputes
                .iter()
                .filter(|d| d.bureau == Some(bureau))
                .collect();
            if subset.is_empty() {
                return None;
            }

            let resolved: Vec<&&Dispute> =
                subset.iter().filter(|d| d.outcome.is_some()).collect();
            let favorable = resolved
                .iter()
                .filter(|d| {
                    d.outcome
                        .as_ref()
                        .map(|o| is_favorable(o.result))
                        .unwrap_or(false)
                })
                .count();
            let times: Vec<f64> = subset.iter().filter_map(|d| resolution_days(d)).collect();

            Some(BureauPerformance {
                bureau,
                disputes: subset.len(),
                resolved: resolved.len(),
                favorable,
                success_rate: if resolved.is_empty() {
                    0.0
                } else {
                    favorable as f64 / resolved.len() as f64
                },
                avg_resolution_days: mean(&times),
            })
        })
        .collect();

    let sla_windows = [30i64, 60, 90]
        .into_iter()
        .map(|window_days| {
            let cutoff = now - Duration::days(window_days);
            let filed: Vec<&Dispute> =
                disputes.iter().filter(|d| d.created_at >= cutoff).collect();
            SlaWindow {
                window_days,
                filed: filed.len(),
                resolved: filed.iter().filter(|d| d.outcome.is_some()).count(),
                overdue: filed.iter().filter(|d| is_overdue(d, now)).count(),
            }
        })
        .collect();

    AnalyticsSnapshot {
        generated_at: now,
        total_disputes: disputes.len(),
        open_disputes: disputes.iter().filter(|d| !d.status.is_terminal()).count(),
        overdue_disputes: disputes.iter().filter(|d| is_overdue(d, now)).count(),
        resolved_disputes: resolved.len(),
        avg_resolution_days: mean(&resolution_times),
        bureaus,
        sla_windows,
        weekly_volume: volume_buckets(disputes, now, "%G-W%V"),
        monthly_volume: volume_buckets(disputes, now, "%Y-%m"),
    }
}

/// Bucket filing volume by `created_at` and lapsed deadlines by
/// `response_deadline`, keyed by the given chrono format. BTreeMap keys
/// keep the buckets chronologically sorted for free.
fn volume_buckets(disputes: &[Dispute], now: DateTime<Utc>, format: &str) -> Vec<VolumeBucket> {
    let mut buckets: BTreeMap<String, (usize, usize)> = BTreeMap::new();

    for dispute in disputes {
        let filed_key = dispute.created_at.date_naive().format(format).to_string();
        buckets.entry(filed_key).or_default().0 += 1;

        if dispute.response_deadline.date_naive() < now.date_naive() {
            let lapsed_key = dispute
                .response_deadline
                .date_naive()
                .format(format)
                .to_string();
            buckets.entry(lapsed_key).or_default().1 += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(bucket, (filed, deadlines_lapsed))| VolumeBucket {
            bucket,
            filed,
            deadlines_lapsed,
        })
        .collect()
}

/// Everything the status endpoint serves: the dispute analytics plus
/// the engine's own vitals.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub status: String,
    pub uptime_seconds: u64,
    pub analytics: AnalyticsSnapshot,
    pub escalation_guard: GuardSnapshot,
}

/// Serve the status report as JSON over raw TCP. One request, one
/// response, no routing, no framework — the UI app GETs it, we answer it,
/// everyone moves on with their lives.
pub async fn run_analytics_server(
    repo: Arc<dyn DisputeRepository>,
    guard: Arc<EscalationGuard>,
    port: u16,
    shutdown: &mut watch::Receiver<bool>,
) {
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    let addr = format!("0.0.0.0:{}", port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(addr = %addr, error = %e, "Failed to bind analytics server");
            return;
        }
    };

    let start_time = Instant::now();
    info!("Analytics server listening on http://{}", addr);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((mut stream, _addr)) => {
                        let report = StatusReport {
                            status: "operational".to_string(),
                            uptime_seconds: start_time.elapsed().as_secs(),
                            analytics: aggregate(&repo.list(), Utc::now()),
                            escalation_guard: guard.snapshot(),
                        };
                        let json = serde_json::to_string_pretty(&report)
                            .unwrap_or_else(|_| "{}".to_string());

                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nAccess-Control-Allow-Origin: *\r\nContent-Length: {}\r\n\r\n{}",
                            json.len(),
                            json,
                        );

                        let _ = stream.write_all(response.as_bytes()).await;
                    }
                    Err(e) => {
                        error!("Analytics server accept error: {}", e);
                    }
                }
            }
            _ = shutdown.changed() => {
                info!("Analytics server: shutting down");
                break;
            }
        }
    }
}

//! Load test command handler.
//!
//! Each simulated user waits a random interval, posts one question to
//! `/llama`, and repeats until the run duration elapses. Failed requests are
//! logged and counted, never retried. A request still in flight when the run
//! ends is abandoned and not counted.

use clap::Args;
use llamaserve_core::{AppError, AppResult};
use rand::Rng;
use serde::Serialize;
use std::time::{Duration, Instant};

const QUESTION: &str = "What is the meaning of life?";

/// Upper bound for `--min-wait` and `--max-wait`, in seconds.
const MAX_WAIT_SECS: f64 = 3600.0;

/// Drive concurrent simulated users against a running server
#[derive(Args, Debug)]
pub struct LoadTestCommand {
    /// Base URL of the server under test
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    pub host: String,

    /// Number of concurrent users
    #[arg(short, long, default_value = "10")]
    pub users: usize,

    /// Run duration in seconds
    #[arg(short, long, default_value = "60")]
    pub duration: u64,

    /// Minimum wait between a user's requests, in seconds
    #[arg(long, default_value = "1")]
    pub min_wait: f64,

    /// Maximum wait between a user's requests, in seconds
    #[arg(long, default_value = "5")]
    pub max_wait: f64,

    /// Output the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Outcome of one request.
#[derive(Debug, Clone, Copy)]
struct Sample {
    latency: Duration,
    ok: bool,
}

/// Aggregate results of a run. Latencies are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestSummary {
    pub total: usize,
    pub failures: usize,
    pub min_ms: f64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
}

impl LoadTestSummary {
    fn from_samples(samples: &[Sample]) -> Self {
        let mut latencies: Vec<f64> = samples
            .iter()
            .map(|s| s.latency.as_micros() as f64 / 1000.0)
            .collect();
        latencies.sort_by(f64::total_cmp);

        let mean_ms = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        };

        Self {
            total: samples.len(),
            failures: samples.iter().filter(|s| !s.ok).count(),
            min_ms: latencies.first().copied().unwrap_or(0.0),
            mean_ms,
            p50_ms: percentile(&latencies, 50.0),
            p95_ms: percentile(&latencies, 95.0),
            max_ms: latencies.last().copied().unwrap_or(0.0),
        }
    }
}

/// Nearest-rank percentile of an ascending slice; 0 for an empty one.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

impl LoadTestCommand {
    fn validate(&self) -> AppResult<()> {
        if self.users == 0 {
            return Err(AppError::InvalidArgument(
                "--users must be at least 1".to_string(),
            ));
        }
        let in_bounds = |w: f64| w.is_finite() && (0.0..=MAX_WAIT_SECS).contains(&w);
        if !in_bounds(self.min_wait) || !in_bounds(self.max_wait) || self.max_wait < self.min_wait {
            return Err(AppError::InvalidArgument(format!(
                "wait range {}..{} is invalid",
                self.min_wait, self.max_wait
            )));
        }
        Ok(())
    }

    pub async fn execute(&self) -> AppResult<()> {
        tracing::info!("Executing loadtest command");
        tracing::debug!("Load test options: {:?}", self);
        self.validate()?;

        let client = reqwest::Client::new();
        let url = format!("{}/llama", self.host.trim_end_matches('/'));
        let deadline = Instant::now() + Duration::from_secs(self.duration);

        tracing::info!(
            "Starting {} users against {} for {}s",
            self.users,
            url,
            self.duration
        );

        let handles: Vec<_> = (0..self.users)
            .map(|user| {
                let client = client.clone();
                let url = url.clone();
                let (min_wait, max_wait) = (self.min_wait, self.max_wait);
                tokio::spawn(async move {
                    run_user(user, client, url, deadline, min_wait, max_wait).await
                })
            })
            .collect();

        let mut samples = Vec::new();
        for handle in handles {
            let user_samples = handle
                .await
                .map_err(|e| AppError::Other(format!("Load test user task failed: {}", e)))?;
            samples.extend(user_samples);
        }

        let summary = LoadTestSummary::from_samples(&samples);
        tracing::info!(
            "Load test finished: {} requests, {} failures",
            summary.total,
            summary.failures
        );

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!("Requests: {}", summary.total);
            println!("Failures: {}", summary.failures);
            println!(
                "Latency (ms): min {:.1}  mean {:.1}  p50 {:.1}  p95 {:.1}  max {:.1}",
                summary.min_ms, summary.mean_ms, summary.p50_ms, summary.p95_ms, summary.max_ms
            );
        }

        Ok(())
    }
}

async fn run_user(
    user: usize,
    client: reqwest::Client,
    url: String,
    deadline: Instant,
    min_wait: f64,
    max_wait: f64,
) -> Vec<Sample> {
    let mut samples = Vec::new();
    let body = serde_json::json!({ "text": QUESTION });

    loop {
        let wait = Duration::from_secs_f64(rand::thread_rng().gen_range(min_wait..=max_wait));
        if Instant::now() + wait >= deadline {
            break;
        }
        tokio::time::sleep(wait).await;

        let start = Instant::now();
        let request = async {
            match client.post(&url).json(&body).send().await {
                Ok(response) if response.status().is_success() => true,
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    tracing::warn!(user, %status, "Request failed: {}", text);
                    false
                }
                Err(e) => {
                    tracing::warn!(user, "Request error: {}", e);
                    false
                }
            }
        };
        let Ok(ok) = tokio::time::timeout_at(deadline.into(), request).await else {
            tracing::info!(user, "Run ended with a request in flight");
            break;
        };
        samples.push(Sample {
            latency: start.elapsed(),
            ok,
        });
    }

    tracing::debug!(user, "User finished after {} requests", samples.len());
    samples
}

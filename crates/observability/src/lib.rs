use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    predictions_total: AtomicU64,
    combinations_total: AtomicU64,
    rejections_total: AtomicU64,
    inference_batches_total: AtomicU64,
    confirmed_plans_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub predictions_total: u64,
    pub combinations_total: u64,
    pub rejections_total: u64,
    pub inference_batches_total: u64,
    pub confirmed_plans_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_prediction(&self) {
        self.predictions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_combinations(&self, count: usize) {
        self.combinations_total
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn inc_rejection(&self) {
        self.rejections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_inference_batches(&self, batches: usize) {
        self.inference_batches_total
            .fetch_add(batches as u64, Ordering::Relaxed);
    }

    pub fn inc_confirmed_plan(&self) {
        self.confirmed_plans_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let predictions = self.predictions_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            predictions_total: predictions,
            combinations_total: self.combinations_total.load(Ordering::Relaxed),
            rejections_total: self.rejections_total.load(Ordering::Relaxed),
            inference_batches_total: self.inference_batches_total.load(Ordering::Relaxed),
            confirmed_plans_total: self.confirmed_plans_total.load(Ordering::Relaxed),
            avg_latency_millis: if predictions == 0 {
                0.0
            } else {
                latency as f64 / predictions as f64
            },
        }
    }
}

/// Installs the JSON subscriber once per process; `RUST_LOG` overrides the
/// default filter.
pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,trip_service=info,trip_api=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}

use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Counters for content searches, kept in a registry of their own.
#[derive(Clone)]
pub struct SearchMetrics {
    pub files_searched: IntCounter,
    pub files_matched: IntCounter,
    pub provider_failures: IntCounter,
    pub searches_cancelled: IntCounter,
    registry: Arc<Registry>,
}

impl Default for SearchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

const NAMESPACE: &str = "sessiongrep";

fn counter(name: &str, help: &str) -> IntCounter {
    IntCounter::with_opts(Opts::new(name, help).namespace(NAMESPACE))
        .expect("static counter options are valid")
}

impl SearchMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let files_searched = counter("files_searched", "Session files handed to the provider");
        let files_matched = counter("files_matched", "Session files with at least one match");
        let provider_failures = counter(
            "provider_failures",
            "Per-file provider failures treated as no matches",
        );
        let searches_cancelled = counter(
            "searches_cancelled",
            "Content searches ended by cancellation or deadline",
        );

        registry.register(Box::new(files_searched.clone())).ok();
        registry.register(Box::new(files_matched.clone())).ok();
        registry.register(Box::new(provider_failures.clone())).ok();
        registry.register(Box::new(searches_cancelled.clone())).ok();

        SearchMetrics {
            files_searched,
            files_matched,
            provider_failures,
            searches_cancelled,
            registry: Arc::new(registry),
        }
    }

    pub fn gather(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            log::warn!("Failed to encode metrics: {e}");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

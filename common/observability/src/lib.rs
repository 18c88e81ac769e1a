use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Service level metrics for the admin backend, held in a private registry.
#[derive(Clone)]
pub struct AdminMetrics {
    pub registry: Registry,
    pub tokens_issued: IntCounterVec,
    pub login_failures: IntCounter,
    pub product_searches: IntCounter,
    pub search_duration_seconds: Histogram,
}

impl AdminMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let tokens_issued = IntCounterVec::new(
            Opts::new("admin_tokens_issued_total", "Tokens issued grouped by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(tokens_issued.clone()))?;

        let login_failures = IntCounter::new(
            "admin_login_failures_total",
            "Login attempts rejected for bad credentials",
        )?;
        registry.register(Box::new(login_failures.clone()))?;

        let product_searches = IntCounter::new(
            "admin_product_searches_total",
            "Filtered product page queries executed",
        )?;
        registry.register(Box::new(product_searches.clone()))?;

        let search_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "admin_product_search_duration_seconds",
                "Duration of a filtered product page query",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(search_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            tokens_issued,
            login_failures,
            product_searches,
            search_duration_seconds,
        })
    }

    pub fn token_issued(&self, reason: &str) {
        self.tokens_issued.with_label_values(&[reason]).inc();
    }

    /// Text exposition of this registry followed by the process default registry.
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut families = self.registry.gather();
        families.extend(prometheus::gather());
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_service_metrics() {
        let metrics = AdminMetrics::new().expect("metrics");
        metrics.token_issued("login");
        metrics.login_failures.inc();
        metrics.product_searches.inc();
        metrics.search_duration_seconds.observe(0.02);

        let text = metrics.render().expect("render");
        assert!(text.contains("admin_tokens_issued_total{reason=\"login\"} 1"));
        assert!(text.contains("admin_login_failures_total 1"));
        assert!(text.contains("admin_product_search_duration_seconds_count 1"));
    }

    #[test]
    fn instances_do_not_share_counters() {
        let a = AdminMetrics::new().expect("a");
        let b = AdminMetrics::new().expect("b");
        a.login_failures.inc();
        assert_eq!(b.login_failures.get(), 0);
    }
}

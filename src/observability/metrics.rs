use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub rides_created_total: IntCounter,
    pub offers_sent_total: IntCounter,
    pub accept_attempts_total: IntCounterVec,
    pub match_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let rides_created_total =
            IntCounter::new("rides_created_total", "Total rides created by clients")
                .expect("valid rides_created_total metric");

        let offers_sent_total =
            IntCounter::new("offers_sent_total", "Total offers fanned out to drivers")
                .expect("valid offers_sent_total metric");

        let accept_attempts_total = IntCounterVec::new(
            Opts::new(
                "accept_attempts_total",
                "Accept attempts by outcome (won, lost, unavailable)",
            ),
            &["outcome"],
        )
        .expect("valid accept_attempts_total metric");

        let match_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "match_latency_seconds",
                "Latency of candidate search and offer fan-out in seconds",
            ),
            &["outcome"],
        )
        .expect("valid match_latency_seconds metric");

        registry
            .register(Box::new(rides_created_total.clone()))
            .expect("register rides_created_total");
        registry
            .register(Box::new(offers_sent_total.clone()))
            .expect("register offers_sent_total");
        registry
            .register(Box::new(accept_attempts_total.clone()))
            .expect("register accept_attempts_total");
        registry
            .register(Box::new(match_latency_seconds.clone()))
            .expect("register match_latency_seconds");

        Self {
            registry,
            rides_created_total,
            offers_sent_total,
            accept_attempts_total,
            match_latency_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

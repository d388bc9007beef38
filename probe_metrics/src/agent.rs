use probe_core::{CacheStats, ScrapeReport};
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Mutex;

/// The agent's own health metrics, kept apart from service observations.
pub struct AgentMetrics {
    registry: Registry,
    scrapes_total: IntCounter,
    scrape_duration: Histogram,
    collector_errors: IntCounterVec,
    concurrency_limit: IntGauge,
    cache_hits: IntCounter,
    cache_misses: IntCounter,
    cache_backend_errors: IntCounter,
    cache_write_errors: IntCounter,
    last_cache: Mutex<CacheStats>,
}

impl AgentMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let scrapes_total = IntCounter::new("probe_scrapes_total", "Total number of scrapes")?;
        let scrape_duration = Histogram::with_opts(HistogramOpts::new(
            "probe_scrape_duration_seconds",
            "Wall time of a full scrape",
        ))?;
        let collector_errors = IntCounterVec::new(
            Opts::new(
                "probe_collector_errors_total",
                "Failed collector runs by collector",
            ),
            &["collector"],
        )?;
        let concurrency_limit = IntGauge::new(
            "probe_scrape_concurrency_limit",
            "Collectors allowed to run at once",
        )?;
        let cache_hits = IntCounter::new("probe_cache_hits_total", "Cache lookups that hit")?;
        let cache_misses = IntCounter::new("probe_cache_misses_total", "Cache lookups that missed")?;
        let cache_backend_errors = IntCounter::new(
            "probe_cache_backend_errors_total",
            "Cache reads that failed and fell through to the service",
        )?;
        let cache_write_errors = IntCounter::new(
            "probe_cache_write_errors_total",
            "Cache write-backs that failed",
        )?;

        registry.register(Box::new(scrapes_total.clone()))?;
        registry.register(Box::new(scrape_duration.clone()))?;
        registry.register(Box::new(collector_errors.clone()))?;
        registry.register(Box::new(concurrency_limit.clone()))?;
        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(cache_backend_errors.clone()))?;
        registry.register(Box::new(cache_write_errors.clone()))?;

        Ok(Self {
            registry,
            scrapes_total,
            scrape_duration,
            collector_errors,
            concurrency_limit,
            cache_hits,
            cache_misses,
            cache_backend_errors,
            cache_write_errors,
            last_cache: Mutex::new(CacheStats::default()),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn scrapes(&self) -> u64 {
        self.scrapes_total.get()
    }

    pub fn observe_scrape(&self, report: &ScrapeReport) {
        self.scrapes_total.inc();
        self.scrape_duration.observe(report.duration.as_secs_f64());
        self.concurrency_limit
            .set(i64::try_from(report.concurrency_limit).unwrap_or(i64::MAX));

        for outcome in report.failed() {
            self.collector_errors
                .with_label_values(&[outcome.name.as_str()])
                .inc();
        }
    }

    /// Advances the cache counters to the cumulative values in `stats`.
    pub fn observe_cache(&self, stats: CacheStats) {
        let Ok(mut last) = self.last_cache.lock() else {
            return;
        };

        self.cache_hits.inc_by(stats.hits.saturating_sub(last.hits));
        self.cache_misses.inc_by(stats.misses.saturating_sub(last.misses));
        self.cache_backend_errors
            .inc_by(stats.backend_errors.saturating_sub(last.backend_errors));
        self.cache_write_errors
            .inc_by(stats.write_errors.saturating_sub(last.write_errors));

        *last = stats;
    }
}

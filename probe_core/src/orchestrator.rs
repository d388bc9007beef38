use crate::{
    backend::ConnectionLimitProbe,
    collectors::{ConstLabels, DynCollector},
    context::{ScrapeConfig, UpdateContext},
    error::{ProbeError, Result},
    observation::{MetricSink, Observation, ObservationSink},
};
use chrono::{DateTime, Utc};
use prometheus::core::Desc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

pub const ANCHOR_METRIC: &str = "probe_collector_set_info";

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Operator-supplied upper bound on concurrently running collectors.
    pub concurrency_limit: Option<usize>,
    /// Upper bound for a single collector's `update` call.
    pub collector_timeout: Option<Duration>,
    pub channel_capacity: usize,
    pub const_labels: ConstLabels,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: None,
            collector_timeout: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            const_labels: ConstLabels::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ResolvedLimit {
    concurrency: usize,
    connection_cap: i64,
}

/// Runs every collector of one monitored service and merges their output.
pub struct Orchestrator {
    collectors: BTreeMap<String, DynCollector>,
    config: Arc<ScrapeConfig>,
    options: OrchestratorOptions,
    limit_probe: Option<Arc<dyn ConnectionLimitProbe>>,
    resolved: Mutex<Option<ResolvedLimit>>,
    anchor: Desc,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        collectors: BTreeMap<String, DynCollector>,
        config: ScrapeConfig,
        options: OrchestratorOptions,
    ) -> Result<Self> {
        if options.concurrency_limit == Some(0) {
            return Err(ProbeError::InvalidConfig(
                "Concurrency limit must be > 0".to_string(),
            ));
        }

        let mut anchor_labels: HashMap<String, String> = options
            .const_labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        anchor_labels.insert("target".to_string(), config.target().to_string());

        let anchor = Desc::new(
            ANCHOR_METRIC.to_string(),
            "Identifies the collector set of one monitored service".to_string(),
            vec![],
            anchor_labels,
        )?;

        Ok(Self {
            collectors,
            config: Arc::new(config),
            options,
            limit_probe: None,
            resolved: Mutex::new(None),
            anchor,
            shutdown: CancellationToken::new(),
        })
    }

    /// Asks `probe` for the service's connection cap on the first scrape, and
    /// again on later scrapes until it answers.
    pub fn with_limit_probe(mut self, probe: Arc<dyn ConnectionLimitProbe>) -> Self {
        self.limit_probe = Some(probe);
        self
    }

    pub fn describe(&self) -> &Desc {
        &self.anchor
    }

    pub fn collector_names(&self) -> Vec<String> {
        self.collectors.keys().cloned().collect()
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Cancels in-flight collectors of every running scrape.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub async fn concurrency_limit(&self) -> usize {
        self.resolve().await.concurrency
    }

    async fn resolve(&self) -> ResolvedLimit {
        let mut resolved = self.resolved.lock().await;
        if let Some(limit) = *resolved {
            return limit;
        }

        let count = self.collectors.len();
        let operator = self.options.concurrency_limit;

        let Some(probe) = &self.limit_probe else {
            let cap = self.config.connection_limit_hint;
            let limit = ResolvedLimit {
                concurrency: derive_concurrency(count, cap, operator),
                connection_cap: cap,
            };
            *resolved = Some(limit);
            return limit;
        };

        match probe.connection_limit().await {
            Ok(cap) => {
                let limit = ResolvedLimit {
                    concurrency: derive_concurrency(count, cap, operator),
                    connection_cap: cap,
                };
                info!(
                    "Resolved concurrency limit {} (connection cap {}, {} collectors)",
                    limit.concurrency, cap, count
                );
                *resolved = Some(limit);
                limit
            }
            Err(e) => {
                let cap = self.config.connection_limit_hint;
                warn!("Connection limit unavailable, will retry next scrape: {}", e);
                ResolvedLimit {
                    concurrency: derive_concurrency(count, cap, operator),
                    connection_cap: cap,
                }
            }
        }
    }

    /// Performs one scrape, writing every observation to `sink`.
    ///
    /// Returns after all collectors and the drain stage finished. Collector
    /// failures are logged and reported, never returned.
    pub async fn collect<S>(&self, sink: &mut S) -> ScrapeReport
    where
        S: ObservationSink + ?Sized,
    {
        let id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let started = Instant::now();

        let limit = self.resolve().await;
        let config = if limit.connection_cap == self.config.connection_limit_hint {
            Arc::clone(&self.config)
        } else {
            Arc::new(
                (*self.config)
                    .clone()
                    .with_connection_limit_hint(limit.connection_cap),
            )
        };

        debug!(
            scrape_id = %id,
            "Starting scrape of {} collectors with concurrency {}",
            self.collectors.len(),
            limit.concurrency
        );

        let (tx, rx) = mpsc::channel(self.options.channel_capacity.max(1));

        let (mut outcomes, (forwarded, dropped)) = tokio::join!(
            self.dispatch(&id, tx, config, limit.concurrency),
            drain(rx, sink)
        );
        outcomes.sort_by(|a, b| a.name.cmp(&b.name));

        let report = ScrapeReport {
            id,
            started_at,
            duration: started.elapsed(),
            concurrency_limit: limit.concurrency,
            outcomes,
            forwarded,
            dropped,
        };

        debug!(
            scrape_id = %report.id,
            "Scrape finished in {:?}: {} observations, {} failed collectors",
            report.duration,
            report.forwarded,
            report.failed().count()
        );

        report
    }

    async fn dispatch(
        &self,
        scrape_id: &str,
        tx: mpsc::Sender<Observation>,
        config: Arc<ScrapeConfig>,
        concurrency: usize,
    ) -> Vec<CollectorOutcome> {
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let scrape_token = self.shutdown.child_token();
        let mut tasks = JoinSet::new();

        for (name, collector) in &self.collectors {
            let name = name.clone();
            let collector = Arc::clone(collector);
            let semaphore = Arc::clone(&semaphore);
            let ctx = UpdateContext::new(Arc::clone(&config), scrape_token.child_token());
            let sink = MetricSink::new(tx.clone());
            let timeout = self.options.collector_timeout;
            let capacity = self.options.channel_capacity.max(1);
            let labels = self.options.const_labels.clone();

            tasks.spawn(async move {
                let permit = semaphore.acquire_owned().await;
                let begin = Instant::now();
                let result = run_collector(&name, collector, ctx, timeout, capacity).await;
                drop(permit);
                let duration = begin.elapsed();

                // A failed collector contributes nothing but its own status.
                let (result, buffered) = match result {
                    Ok(buffered) => (Ok(()), buffered),
                    Err(e) => (Err(e), Vec::new()),
                };
                for observation in buffered {
                    if sink.send(observation).await.is_err() {
                        break;
                    }
                }

                let success = if result.is_ok() { 1.0 } else { 0.0 };
                let self_observations = [
                    Observation::gauge(
                        "probe_scrape_collector_duration_seconds",
                        "Duration of a collector scrape",
                        duration.as_secs_f64(),
                    ),
                    Observation::gauge(
                        "probe_scrape_collector_success",
                        "Whether a collector succeeded",
                        success,
                    ),
                ];
                for observation in self_observations {
                    let observation = observation
                        .with_label("collector", name.as_str())
                        .with_labels(&labels);
                    if sink.send(observation).await.is_err() {
                        break;
                    }
                }

                CollectorOutcome {
                    name,
                    duration,
                    error: result.err().map(|e| e.to_string()),
                }
            });
        }

        // Only the collector tasks hold senders now; the drain ends when they finish.
        drop(tx);

        let mut outcomes = Vec::with_capacity(self.collectors.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    if let Some(err) = &outcome.error {
                        error!(scrape_id, collector = %outcome.name, "Collector failed: {}", err);
                    }
                    outcomes.push(outcome);
                }
                Err(e) => error!(scrape_id, "Collector task failed: {}", e),
            }
        }

        outcomes
    }
}

/// Runs one collector in its own task and returns what it emitted.
///
/// Observations are buffered until `update` returns `Ok`; on error, panic or
/// timeout the buffer is discarded.
async fn run_collector(
    name: &str,
    collector: DynCollector,
    ctx: UpdateContext,
    timeout: Option<Duration>,
    capacity: usize,
) -> Result<Vec<Observation>> {
    let (tx, mut rx) = mpsc::channel(capacity);
    let sink = MetricSink::new(tx);
    let cancel = ctx.cancel.clone();
    let mut handle = tokio::spawn(async move { collector.update(&ctx, &sink).await });

    let expiry = async {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(expiry);

    let mut buffered = Vec::new();
    let joined = loop {
        tokio::select! {
            joined = &mut handle => break joined,
            Some(observation) = rx.recv() => buffered.push(observation),
            _ = &mut expiry => {
                cancel.cancel();
                handle.abort();
                return Err(ProbeError::Timeout(name.to_string()));
            }
        }
    };

    // The task dropped its sender on completion, so this drains the rest.
    while let Ok(observation) = rx.try_recv() {
        buffered.push(observation);
    }

    match joined {
        Ok(Ok(())) => Ok(buffered),
        Ok(Err(e)) => Err(e),
        Err(e) if e.is_panic() => Err(ProbeError::collector(name, "panicked during update")),
        Err(e) => Err(ProbeError::collector(name, e)),
    }
}

async fn drain<S>(mut rx: mpsc::Receiver<Observation>, sink: &mut S) -> (usize, usize)
where
    S: ObservationSink + ?Sized,
{
    let mut forwarded = 0;
    let mut dropped = 0;

    while let Some(observation) = rx.recv().await {
        if observation.is_valid() {
            sink.accept(observation);
            forwarded += 1;
        } else {
            dropped += 1;
            debug!("Dropping observation without a name");
        }
    }

    (forwarded, dropped)
}

/// `min(cap if positive, operator limit if set, collector count)`, never below one.
pub fn derive_concurrency(collectors: usize, connection_cap: i64, operator: Option<usize>) -> usize {
    let mut limit = collectors.max(1);

    if connection_cap > 0 {
        limit = limit.min(usize::try_from(connection_cap).unwrap_or(usize::MAX));
    }

    if let Some(operator) = operator.filter(|&n| n > 0) {
        limit = limit.min(operator);
    }

    limit.max(1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorOutcome {
    pub name: String,
    #[serde(with = "crate::duration::humantime_format")]
    pub duration: Duration,
    pub error: Option<String>,
}

impl CollectorOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeReport {
    pub id: String,
    pub started_at: DateTime<Utc>,
    #[serde(with = "crate::duration::humantime_format")]
    pub duration: Duration,
    pub concurrency_limit: usize,
    pub outcomes: Vec<CollectorOutcome>,
    pub forwarded: usize,
    pub dropped: usize,
}

impl ScrapeReport {
    pub fn failed(&self) -> impl Iterator<Item = &CollectorOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn is_complete(&self) -> bool {
        self.failed().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, CacheConfig};
    use crate::collectors::{Collector, WalCollector};
    use crate::testing::StaticBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WAL_QUERY: &str = "SELECT count(*) AS segments, sum(size) AS size FROM pg_ls_waldir()";

    struct Emitting {
        name: String,
        values: usize,
    }

    #[async_trait]
    impl Collector for Emitting {
        async fn update(&self, _ctx: &UpdateContext, sink: &MetricSink) -> Result<()> {
            for i in 0..self.values {
                sink.send(
                    Observation::gauge(format!("test_{}", self.name), "", i as f64)
                        .with_label("i", i.to_string()),
                )
                .await?;
            }
            Ok(())
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct Failing;

    #[async_trait]
    impl Collector for Failing {
        async fn update(&self, _ctx: &UpdateContext, sink: &MetricSink) -> Result<()> {
            sink.send(Observation::gauge("test_partial", "", 1.0)).await?;
            Err(ProbeError::Backend("relation does not exist".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct Panicking;

    #[async_trait]
    impl Collector for Panicking {
        async fn update(&self, _ctx: &UpdateContext, _sink: &MetricSink) -> Result<()> {
            panic!("collector bug");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    struct Hanging;

    #[async_trait]
    impl Collector for Hanging {
        async fn update(&self, _ctx: &UpdateContext, sink: &MetricSink) -> Result<()> {
            sink.send(Observation::gauge("test_hanging_partial", "", 1.0)).await?;
            std::future::pending::<()>().await;
            Ok(())
        }

        fn name(&self) -> &str {
            "hanging"
        }
    }

    struct Invalid;

    #[async_trait]
    impl Collector for Invalid {
        async fn update(&self, _ctx: &UpdateContext, sink: &MetricSink) -> Result<()> {
            sink.send(Observation::gauge("", "", 1.0)).await?;
            sink.send(Observation::gauge("test_valid", "", 1.0)).await
        }

        fn name(&self) -> &str {
            "invalid"
        }
    }

    /// Blocks until the gate hands out a permit, tracking peak concurrency.
    struct Gated {
        name: String,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        finished: Arc<AtomicUsize>,
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl Collector for Gated {
        async fn update(&self, _ctx: &UpdateContext, _sink: &MetricSink) -> Result<()> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let permit = self.gate.acquire().await.map_err(anyhow::Error::from)?;
            permit.forget();

            self.running.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct FlakyProbe {
        calls: AtomicUsize,
        fail_first: usize,
        cap: i64,
    }

    #[async_trait]
    impl ConnectionLimitProbe for FlakyProbe {
        async fn connection_limit(&self) -> Result<i64> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(ProbeError::Backend("connection refused".to_string()))
            } else {
                Ok(self.cap)
            }
        }
    }

    fn collectors(items: Vec<(&str, DynCollector)>) -> BTreeMap<String, DynCollector> {
        items
            .into_iter()
            .map(|(name, c)| (name.to_string(), c))
            .collect()
    }

    fn emitting(name: &str, values: usize) -> DynCollector {
        Arc::new(Emitting {
            name: name.to_string(),
            values,
        })
    }

    fn config() -> ScrapeConfig {
        ScrapeConfig::new(Arc::new(StaticBackend::new()))
    }

    fn collected(observations: &[Observation]) -> Vec<&Observation> {
        observations
            .iter()
            .filter(|o| !o.name.starts_with("probe_scrape_"))
            .collect()
    }

    #[test]
    fn test_derive_concurrency() {
        assert_eq!(derive_concurrency(10, -1, None), 10);
        assert_eq!(derive_concurrency(10, 4, None), 4);
        assert_eq!(derive_concurrency(10, -1, Some(3)), 3);
        assert_eq!(derive_concurrency(10, 4, Some(6)), 4);
        assert_eq!(derive_concurrency(10, 100, Some(20)), 10);
        assert_eq!(derive_concurrency(0, -1, None), 1);
        assert_eq!(derive_concurrency(5, 0, Some(0)), 5);
    }

    #[test]
    fn test_zero_operator_limit_is_rejected() {
        let options = OrchestratorOptions {
            concurrency_limit: Some(0),
            ..Default::default()
        };
        assert!(Orchestrator::new(BTreeMap::new(), config(), options).is_err());
    }

    #[tokio::test]
    async fn test_collect_merges_all_collectors() {
        let orchestrator = Orchestrator::new(
            collectors(vec![("a", emitting("a", 3)), ("b", emitting("b", 2))]),
            config(),
            OrchestratorOptions::default(),
        )
        .unwrap();

        let mut out = Vec::new();
        let report = orchestrator.collect(&mut out).await;

        assert!(report.is_complete());
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(collected(&out).len(), 5);
        // duration + success per collector
        assert_eq!(out.len(), 5 + 4);
        assert_eq!(report.forwarded, out.len());
        assert_eq!(report.concurrency_limit, 2);
    }

    #[tokio::test]
    async fn test_partial_failure_isolation() {
        let orchestrator = Orchestrator::new(
            collectors(vec![
                ("a", emitting("a", 2)),
                ("failing", Arc::new(Failing)),
                ("panicking", Arc::new(Panicking)),
                ("z", emitting("z", 1)),
            ]),
            config(),
            OrchestratorOptions::default(),
        )
        .unwrap();

        let mut out = Vec::new();
        let report = orchestrator.collect(&mut out).await;

        let failed: Vec<&str> = report.failed().map(|o| o.name.as_str()).collect();
        assert_eq!(failed, vec!["failing", "panicking"]);
        assert!(out.iter().any(|o| o.name == "test_a"));
        assert!(out.iter().any(|o| o.name == "test_z"));
        assert!(!out.iter().any(|o| o.name == "test_partial"));

        let success: Vec<(String, f64)> = out
            .iter()
            .filter(|o| o.name == "probe_scrape_collector_success")
            .map(|o| (o.labels["collector"].clone(), o.value))
            .collect();
        assert!(success.contains(&("failing".to_string(), 0.0)));
        assert!(success.contains(&("a".to_string(), 1.0)));
    }

    #[tokio::test]
    async fn test_concurrency_bound() {
        const LIMIT: usize = 3;
        const TOTAL: usize = 8;

        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));

        let mut items = BTreeMap::new();
        for i in 0..TOTAL {
            let name = format!("gated_{}", i);
            items.insert(
                name.clone(),
                Arc::new(Gated {
                    name,
                    running: running.clone(),
                    peak: peak.clone(),
                    finished: finished.clone(),
                    gate: gate.clone(),
                }) as DynCollector,
            );
        }

        let options = OrchestratorOptions {
            concurrency_limit: Some(LIMIT),
            ..Default::default()
        };
        let orchestrator = Arc::new(Orchestrator::new(items, config(), options).unwrap());

        let scrape = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move {
                let mut out = Vec::new();
                orchestrator.collect(&mut out).await
            }
        });

        for _ in 0..200 {
            if running.load(Ordering::SeqCst) == LIMIT {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(running.load(Ordering::SeqCst), LIMIT);

        // Release collectors one at a time
        for _ in 0..TOTAL {
            gate.add_permits(1);
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert!(running.load(Ordering::SeqCst) <= LIMIT);
        }

        let report = scrape.await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.concurrency_limit, LIMIT);
        assert_eq!(finished.load(Ordering::SeqCst), TOTAL);
        assert_eq!(peak.load(Ordering::SeqCst), LIMIT);
    }

    #[tokio::test]
    async fn test_no_writes_after_return() {
        let orchestrator = Orchestrator::new(
            collectors(vec![("a", emitting("a", 50)), ("b", emitting("b", 50))]),
            config(),
            OrchestratorOptions {
                channel_capacity: 4,
                ..Default::default()
            },
        )
        .unwrap();

        let (mut tx, mut rx) = mpsc::unbounded_channel::<Observation>();
        let report = orchestrator.collect(&mut tx).await;
        drop(tx);

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, report.forwarded);
        assert_eq!(received, 100 + 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collector_timeout() {
        let options = OrchestratorOptions {
            collector_timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(
            collectors(vec![("a", emitting("a", 1)), ("hanging", Arc::new(Hanging))]),
            config(),
            options,
        )
        .unwrap();

        let mut out = Vec::new();
        let report = orchestrator.collect(&mut out).await;

        let failed: Vec<&CollectorOutcome> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "hanging");
        assert!(failed[0].error.as_deref().unwrap_or_default().contains("timed out"));
        assert_eq!(collected(&out).len(), 1);
        assert!(!out.iter().any(|o| o.name == "test_hanging_partial"));
    }

    #[tokio::test]
    async fn test_invalid_observations_are_dropped() {
        let orchestrator = Orchestrator::new(
            collectors(vec![("invalid", Arc::new(Invalid))]),
            config(),
            OrchestratorOptions::default(),
        )
        .unwrap();

        let mut out = Vec::new();
        let report = orchestrator.collect(&mut out).await;

        assert_eq!(report.dropped, 1);
        assert_eq!(collected(&out).len(), 1);
        assert!(out.iter().all(|o| o.is_valid()));
    }

    #[tokio::test]
    async fn test_limit_probe_resolved_lazily() {
        let probe = Arc::new(FlakyProbe {
            calls: AtomicUsize::new(0),
            fail_first: 1,
            cap: 2,
        });
        let orchestrator = Orchestrator::new(
            collectors(vec![
                ("a", emitting("a", 1)),
                ("b", emitting("b", 1)),
                ("c", emitting("c", 1)),
            ]),
            config(),
            OrchestratorOptions::default(),
        )
        .unwrap()
        .with_limit_probe(probe.clone());

        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);

        let mut out = Vec::new();
        let first = orchestrator.collect(&mut out).await;
        assert_eq!(first.concurrency_limit, 3);

        let second = orchestrator.collect(&mut out).await;
        assert_eq!(second.concurrency_limit, 2);

        orchestrator.collect(&mut out).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_hint_used_without_probe() {
        let orchestrator = Orchestrator::new(
            collectors(vec![("a", emitting("a", 1)), ("b", emitting("b", 1))]),
            config().with_connection_limit_hint(1),
            OrchestratorOptions::default(),
        )
        .unwrap();

        assert_eq!(orchestrator.concurrency_limit().await, 1);
    }

    #[test]
    fn test_describe_anchor() {
        let mut labels = ConstLabels::new();
        labels.insert("cluster".to_string(), "main".to_string());
        let orchestrator = Orchestrator::new(
            BTreeMap::new(),
            config(),
            OrchestratorOptions {
                const_labels: labels,
                ..Default::default()
            },
        )
        .unwrap();

        let desc = orchestrator.describe();
        assert_eq!(desc.fq_name, ANCHOR_METRIC);
        assert!(desc
            .const_label_pairs
            .iter()
            .any(|pair| pair.get_name() == "target" && pair.get_value() == "static://test"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_wal_queried_once_per_ttl() {
        let backend = Arc::new(StaticBackend::new().with(
            WAL_QUERY,
            &["segments", "size"],
            vec![vec![Some("3"), Some("50331648")]],
        ));
        let cache = Arc::new(Cache::from_config(CacheConfig::memory(Duration::from_secs(60))));
        let config = ScrapeConfig::new(backend.clone()).with_cache(cache.clone());

        let orchestrator = Orchestrator::new(
            collectors(vec![(
                "wal",
                Arc::new(WalCollector::new(ConstLabels::new())) as DynCollector,
            )]),
            config,
            OrchestratorOptions::default(),
        )
        .unwrap();

        let mut first = Vec::new();
        orchestrator.collect(&mut first).await;
        let mut second = Vec::new();
        orchestrator.collect(&mut second).await;

        assert_eq!(backend.query_count(), 1);
        assert_eq!(collected(&first), collected(&second));
        assert_eq!(cache.stats().hits, 1);

        tokio::time::advance(Duration::from_secs(61)).await;

        let mut third = Vec::new();
        orchestrator.collect(&mut third).await;
        assert_eq!(backend.query_count(), 2);
        assert_eq!(collected(&third).len(), 2);
    }
}

//! Per-host watcher: scheduling, discovery, enrichment and version finding.
//!
//! One watcher owns one backend connection. Its primary cron schedule drives
//! full watch cycles; an optional secondary schedule collects runtime stats;
//! when event listening is enabled, backend events re-trigger a debounced
//! cycle. A short fixed startup delay defers the first cycle and the start
//! of event listening until all watchers have finished registering.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use argus_core::{
    is_digest_to_watch, label, tag, tag_candidates, BackendEventKind, ContainerBackend,
    DiscoveredWorkload, Image, ImageDigest, ImageRef, ImageRegistry, ImageTag, UpdateKind,
    UpdateResult, Workload, WorkloadError, WorkloadStatus, WorkloadStore,
};
use argus_registry::RegistryDirectory;

use crate::config::{Schedules, WatcherConfig};
use crate::debounce::Debouncer;
use crate::error::WatcherError;
use crate::reconcile::{Reconciler, WorkloadReport};

/// Delay before the first cycle and the start of event listening, leaving
/// registration of all watchers time to finish.
const STARTUP_DELAY: Duration = Duration::from_secs(1);

/// Window within which a burst of backend events collapses to one cycle.
const EVENT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(5);

/// Counters of one completed watch cycle, broadcast to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummary {
    /// Workloads watched this cycle.
    pub watched: usize,

    /// Workloads with an available update.
    pub updates_available: usize,

    /// Workloads whose detection attempt failed.
    pub errors: usize,
}

/// One managed host's watcher.
pub struct Watcher {
    name: String,
    config: WatcherConfig,
    schedules: Schedules,
    backend: Arc<dyn ContainerBackend>,
    store: Arc<dyn WorkloadStore>,
    directory: Arc<RegistryDirectory>,
    reconciler: Reconciler,
    updates: broadcast::Sender<CycleSummary>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    debouncer: Mutex<Option<Debouncer>>,
}

impl Watcher {
    /// Creates a watcher with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid; an invalid
    /// watcher is never started.
    pub fn new(
        name: impl Into<String>,
        config: WatcherConfig,
        backend: Arc<dyn ContainerBackend>,
        store: Arc<dyn WorkloadStore>,
        directory: Arc<RegistryDirectory>,
    ) -> Result<Arc<Self>, WatcherError> {
        let name = name.into();
        let schedules = config.validate(&name)?;
        let (updates, _) = broadcast::channel(16);
        Ok(Arc::new(Self {
            name,
            config,
            schedules,
            backend,
            store: Arc::clone(&store),
            directory,
            reconciler: Reconciler::new(store),
            updates,
            tasks: Mutex::new(Vec::new()),
            debouncer: Mutex::new(None),
        }))
    }

    /// Watcher name, as recorded on owned workloads.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Watcher configuration.
    #[must_use]
    pub const fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Subscribes to the per-cycle "workloads updated" signal.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CycleSummary> {
        self.updates.subscribe()
    }

    /// Connects to the backend and starts all scheduled tasks.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be reached; the watcher is
    /// then not scheduled.
    pub async fn init(self: &Arc<Self>) -> Result<(), WatcherError> {
        self.backend
            .ping()
            .await
            .map_err(|source| WatcherError::BackendUnreachable {
                host: self.config.host.clone(),
                source,
            })?;
        tracing::info!(
            watcher = %self.name,
            host = %self.config.host,
            cron = %self.config.cron,
            "Watcher scheduled"
        );

        let mut tasks = self.tasks.lock().await;

        let watcher = Arc::clone(self);
        tasks.push(tokio::spawn(async move {
            watcher.run_schedule(watcher.schedules.watch.clone()).await;
        }));

        if let Some(stats_schedule) = self.schedules.stats.clone() {
            let watcher = Arc::clone(self);
            tasks.push(tokio::spawn(async move {
                watcher.run_stats_schedule(stats_schedule).await;
            }));
        }

        // First cycle after the startup delay, once every watcher finished
        // registering.
        let watcher = Arc::clone(self);
        tasks.push(tokio::spawn(async move {
            tokio::time::sleep(STARTUP_DELAY).await;
            watcher.watch_cycle().await;
        }));

        if self.config.watch_events {
            let watcher = Arc::clone(self);
            let debouncer = Debouncer::new(EVENT_DEBOUNCE_WINDOW, move || {
                let watcher = Arc::clone(&watcher);
                async move {
                    watcher.watch_cycle().await;
                }
            });
            *self.debouncer.lock().await = Some(debouncer);

            let watcher = Arc::clone(self);
            tasks.push(tokio::spawn(async move {
                watcher.run_event_listener().await;
            }));
        }

        Ok(())
    }

    /// Stops all schedules, timers and listeners. Idempotent; in-flight
    /// remote calls complete and their results are discarded.
    pub async fn deregister(&self) {
        tracing::info!(watcher = %self.name, "Deregistering watcher");
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        if let Some(debouncer) = self.debouncer.lock().await.take() {
            debouncer.stop();
        }
    }

    /// Runs one full watch cycle: discovery, enrichment, version finding and
    /// reconciliation.
    pub async fn watch_cycle(&self) -> CycleSummary {
        tracing::info!(watcher = %self.name, "Watch cycle started");
        let workloads = self.discover().await;
        let reports: Vec<WorkloadReport> =
            join_all(workloads.into_iter().map(|w| self.watch_workload(w))).await;

        let summary = CycleSummary {
            watched: reports.len(),
            updates_available: reports
                .iter()
                .filter(|r| r.workload.update_available)
                .count(),
            errors: reports.iter().filter(|r| r.workload.error.is_some()).count(),
        };
        tracing::info!(
            watcher = %self.name,
            watched = summary.watched,
            errors = summary.errors,
            updates = summary.updates_available,
            "Watch cycle finished"
        );
        let _ = self.updates.send(summary.clone());
        summary
    }

    /// Sleeps until each upcoming fire time of a schedule and runs a cycle.
    async fn run_schedule(&self, schedule: Schedule) {
        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                return;
            };
            let delay = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(delay).await;
            self.watch_cycle().await;
        }
    }

    /// Sleeps until each upcoming fire time of the stats schedule and
    /// collects runtime stats.
    async fn run_stats_schedule(&self, schedule: Schedule) {
        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                return;
            };
            let delay = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(delay).await;
            self.collect_stats().await;
        }
    }

    /// Consumes the backend's live event stream, re-triggering a debounced
    /// cycle on workload lifecycle events.
    async fn run_event_listener(&self) {
        tokio::time::sleep(STARTUP_DELAY).await;
        let mut events = match self.backend.subscribe_events().await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(watcher = %self.name, error = %e, "Could not subscribe to backend events");
                return;
            }
        };
        tracing::debug!(watcher = %self.name, "Listening to backend events");
        while let Some(event) = events.recv().await {
            if matches!(
                event.kind,
                BackendEventKind::Created
                    | BackendEventKind::Started
                    | BackendEventKind::Stopped
                    | BackendEventKind::Destroyed
                    | BackendEventKind::Updated
            ) {
                if let Some(debouncer) = self.debouncer.lock().await.as_ref() {
                    debouncer.trigger();
                }
            }
        }
    }

    /// Lists and enriches the workloads to watch this cycle, then prunes
    /// records whose workloads disappeared from the host.
    async fn discover(&self) -> Vec<Workload> {
        let listed = match self.backend.list_workloads(self.config.watch_all).await {
            Ok(listed) => listed,
            Err(e) => {
                tracing::error!(
                    watcher = %self.name,
                    host = %self.config.host,
                    error = %e,
                    "Failed to list workloads"
                );
                if let Err(store_err) = self
                    .store
                    .update_status_by_watcher(&self.name, WorkloadStatus::Unreachable)
                    .await
                {
                    tracing::warn!(watcher = %self.name, error = %store_err, "Failed to mark workloads unreachable");
                }
                return Vec::new();
            }
        };

        let to_watch: Vec<DiscoveredWorkload> = listed
            .into_iter()
            .filter(|w| {
                label::is_workload_to_watch(
                    w.labels.get(label::WATCH).map(String::as_str),
                    self.config.watch_by_default,
                )
            })
            .collect();
        tracing::info!(
            watcher = %self.name,
            count = to_watch.len(),
            "Enriching discovered workloads"
        );

        let enriched: Vec<Workload> = join_all(to_watch.into_iter().map(|d| self.enrich(d)))
            .await
            .into_iter()
            .flatten()
            .collect();

        self.reconciler.prune(&self.name, &enriched).await;
        enriched
    }

    /// Enriches one discovered workload with image metadata.
    ///
    /// Fully isolated: any failure skips this workload with a warning and
    /// never aborts the siblings. A workload already persisted and not in an
    /// error state is reused as-is, so remote image inspection happens once
    /// per image id.
    async fn enrich(&self, discovered: DiscoveredWorkload) -> Option<Workload> {
        match self.store.find_by_id(&discovered.id).await {
            Ok(Some(existing)) if existing.error.is_none() => {
                tracing::debug!(
                    workload = %existing.full_name(),
                    "Workload already in store, skipping image inspection"
                );
                let mut workload = existing;
                workload.status = discovered.status;
                workload.labels = discovered.labels;
                return Some(workload);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(watcher = %self.name, error = %e, "Store lookup failed during enrichment");
            }
        }

        let inspect = match self.backend.inspect_image(&discovered.image).await {
            Ok(inspect) => inspect,
            Err(e) => {
                tracing::warn!(
                    watcher = %self.name,
                    image = %discovered.image,
                    error = %e,
                    "Image inspection failed, skipping workload"
                );
                return None;
            }
        };

        // A workload started from a digest carries no usable tag; fall back
        // to the image's first repo tag.
        let mut reference = discovered.image.clone();
        if reference.contains("sha256:") {
            match inspect.repo_tags.first() {
                Some(repo_tag) => reference.clone_from(repo_tag),
                None => {
                    tracing::warn!(
                        watcher = %self.name,
                        image = %discovered.image,
                        "Cannot determine a reliable tag for this image, skipping workload"
                    );
                    return None;
                }
            }
        }
        let parsed = match ImageRef::parse(&reference) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(
                    watcher = %self.name,
                    image = %reference,
                    error = %e,
                    "Unparseable image reference, skipping workload"
                );
                return None;
            }
        };
        let tag_value = parsed.tag.unwrap_or_else(|| "latest".to_string());

        let include_tags = discovered.labels.get(label::TAG_INCLUDE).cloned();
        let exclude_tags = discovered.labels.get(label::TAG_EXCLUDE).cloned();
        let transform_tags = discovered.labels.get(label::TAG_TRANSFORM).cloned();
        let link_template = discovered.labels.get(label::LINK_TEMPLATE).cloned();

        let transformed = tag::transform_tag(transform_tags.as_deref(), &tag_value);
        let is_semver = tag::parse_semver(&transformed).is_some();
        let watch_digest = is_digest_to_watch(
            discovered.labels.get(label::WATCH_DIGEST).map(String::as_str),
            is_semver,
        );
        if !is_semver && !watch_digest {
            tracing::warn!(
                watcher = %self.name,
                image = %reference,
                "Tag is not a semantic version and digest watching is disabled, no update will be reported"
            );
        }

        let mut workload = Workload {
            id: discovered.id,
            watcher: self.name.clone(),
            name: discovered.name,
            status: discovered.status,
            include_tags,
            exclude_tags,
            transform_tags,
            link_template,
            labels: discovered.labels,
            image: Image {
                id: inspect.id.clone(),
                name: parsed.path,
                registry: ImageRegistry {
                    name: ImageRegistry::UNKNOWN.to_string(),
                    url: parsed.domain.unwrap_or_default(),
                },
                tag: ImageTag {
                    value: tag_value.clone(),
                    semver: is_semver,
                },
                digest: ImageDigest {
                    watch: watch_digest,
                    value: None,
                    repo: inspect.repo_digest(),
                },
                architecture: inspect.architecture,
                os: inspect.os,
                variants: inspect.variants,
                created: inspect.created,
            },
            result: Some(UpdateResult::tag_only(tag_value)),
            update_available: false,
            update_kind: UpdateKind::default(),
            link: None,
            error: None,
        };
        self.directory.normalize_workload(&mut workload);
        Some(workload)
    }

    /// Runs update detection for one workload and persists the outcome.
    ///
    /// A failure is recorded on the workload's `error` field and leaves the
    /// derived update state at its last-known value.
    async fn watch_workload(&self, mut workload: Workload) -> WorkloadReport {
        workload.result = None;
        workload.error = None;

        match self.find_new_version(&mut workload).await {
            Ok(result) => {
                workload.result = Some(result);
                workload.refresh_update_state();
            }
            Err(e) => {
                tracing::warn!(
                    workload = %workload.full_name(),
                    error = %e,
                    "Update detection failed"
                );
                workload.error = Some(WorkloadError::new(e.to_string()));
            }
        }
        self.reconciler.persist(workload).await
    }

    /// Queries the owning provider for the workload's update candidate.
    async fn find_new_version(
        &self,
        workload: &mut Workload,
    ) -> Result<UpdateResult, WatcherError> {
        let provider = self
            .directory
            .by_name(&workload.image.registry.name)
            .ok_or_else(|| WatcherError::UnsupportedRegistry {
                name: workload.image.registry.name.clone(),
            })?;

        let tags = provider.get_tags(&workload.image).await?;
        let candidates = tag_candidates(workload, &tags);
        let mut result = UpdateResult::tag_only(workload.image.tag.value.clone());

        if workload.image.digest.watch && workload.image.digest.repo.is_some() {
            // With a tag candidate in play (local `app:8` vs remote
            // `app:8.0.1`), the remote digest is the candidate's; otherwise
            // it is the current tag's.
            let mut probe = workload.image.clone();
            if let Some(candidate) = candidates.first() {
                probe.tag.value.clone_from(candidate);
            }

            let remote = provider.get_manifest_digest(&probe, None).await?;
            result.digest.clone_from(&remote.digest);
            result.created = remote.created;

            if remote.version == 2 {
                let local = provider
                    .get_manifest_digest(&probe, workload.image.digest.repo.as_deref())
                    .await?;
                workload.image.digest.value = local.digest;
            } else {
                // Legacy single-manifest registry: compare against the local
                // image-config hash instead of a registry digest.
                workload.image.digest.value =
                    self.backend.image_config_digest(&workload.image.id).await?;
            }
        }

        if let Some(candidate) = candidates.into_iter().next() {
            result.tag = candidate;
        }
        Ok(result)
    }

    /// Collects a runtime stats sample for every persisted workload.
    async fn collect_stats(&self) {
        let workloads = match self.store.find_all_by_watcher(&self.name).await {
            Ok(workloads) => workloads,
            Err(e) => {
                tracing::warn!(watcher = %self.name, error = %e, "Could not list workloads for stats collection");
                return;
            }
        };
        tracing::debug!(
            watcher = %self.name,
            count = workloads.len(),
            "Collecting workload stats"
        );
        for workload in workloads {
            match self.backend.workload_stats(&workload.id).await {
                Ok(stats) => {
                    if let Err(e) = self.store.record_stats(&workload.id, &stats).await {
                        tracing::warn!(workload = %workload.full_name(), error = %e, "Failed to record stats");
                    }
                }
                Err(e) => {
                    tracing::warn!(workload = %workload.full_name(), error = %e, "Failed to fetch stats");
                }
            }
        }
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("name", &self.name)
            .field("host", &self.config.host)
            .finish_non_exhaustive()
    }
}

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::health::{aggregate, HealthReport, PipelineStatusDto};
use crate::registry::{InFlightGuard, RegisteredPipeline};
use crate::request::ProcessRequest;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use synopticon_breaker::Admission;
use synopticon_events::{topics, EventBus};
use synopticon_pipeline::PipelineHandle;
use synopticon_strategy::{filter_candidates, order_candidates, Candidate, Request as StrategyRequest};
use synopticon_types::{now_ms, AnalysisResult, ErrorKind, ErrorRecord, PipelineState};
use tracing::{info, instrument, warn};

/// The pipeline registry, capability-based dispatcher, fallback driver, and
/// health/metrics aggregator (spec §4.E). Owns every `PipelineDescriptor`
/// and `CircuitBreakerState` (spec §3 Ownership).
pub struct Orchestrator {
    registry: DashMap<String, Arc<RegisteredPipeline>>,
    config: OrchestratorConfig,
    events: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, events: Arc<EventBus>) -> Self {
        Self { registry: DashMap::new(), config, events }
    }

    /// Registers a pipeline, idempotent by name. If a pipeline with the
    /// same name but a different version is already registered, the old
    /// instance is drained and cleaned up first. Fails if a same
    /// name-and-version registration is currently mid-processing (spec
    /// §4.E).
    pub async fn register(&self, handle: Arc<dyn PipelineHandle>) -> Result<(), OrchestratorError> {
        let name = handle.descriptor().name.clone();
        let version = handle.descriptor().version.clone();

        if let Some(existing) = self.registry.get(&name) {
            let same_version = existing.descriptor().version == version;
            if same_version {
                if existing.in_flight.load(Ordering::SeqCst) > 0 {
                    return Err(OrchestratorError::RegistrationInFlight(name));
                }
                // Idempotent no-op re-registration of the identical version.
                return Ok(());
            }
            drop(existing);
            self.unregister(&name).await.ok();
        }

        let registered = Arc::new(RegisteredPipeline::new(handle, self.config.breaker));
        let _ = self.registry.insert(name.clone(), registered);
        self.events.publish(topics::PIPELINE_REGISTERED, serde_json::json!({"name": name}), now_ms());
        Ok(())
    }

    /// Removes a descriptor, draining in-flight `process` calls up to
    /// `unregister_drain_timeout` before forcing cleanup (spec §4.E).
    pub async fn unregister(&self, name: &str) -> Result<(), OrchestratorError> {
        let entry = self
            .registry
            .get(name)
            .map(|e| e.value().clone())
            .ok_or_else(|| OrchestratorError::NotRegistered(name.to_string()))?;
        entry.draining.store(true, Ordering::SeqCst);

        let deadline = Instant::now() + self.config.unregister_drain_timeout;
        while entry.in_flight.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        entry.handle.cleanup().await;
        let _ = self.registry.remove(name);
        self.events
            .publish(topics::PIPELINE_UNREGISTERED, serde_json::json!({"name": name}), now_ms());
        Ok(())
    }

    pub async fn initialize_pipeline(&self, name: &str, config: Value) -> Result<(), OrchestratorError> {
        let entry = self
            .registry
            .get(name)
            .map(|e| e.value().clone())
            .ok_or_else(|| OrchestratorError::NotRegistered(name.to_string()))?;
        entry.handle.initialize(config).await.ok();
        Ok(())
    }

    fn snapshot_candidates(&self) -> Vec<(String, Candidate)> {
        self.registry
            .iter()
            .map(|entry| {
                let name = entry.key().clone();
                let descriptor = entry.value().descriptor().clone();
                let breaker_open = false; // refined per-entry below using async lock in dispatch
                (name, Candidate { descriptor, healthy: entry.value().handle.get_status().healthy, breaker_open })
            })
            .collect()
    }

    /// The main dispatch algorithm (spec §4.E). Always returns an
    /// `AnalysisResult` — pipeline and orchestrator-level failures are
    /// never thrown past this boundary (spec §7).
    #[instrument(skip(self, request), fields(strategy))]
    pub async fn process(&self, request: ProcessRequest) -> AnalysisResult {
        let ts = now_ms();
        if let Some(name) = request.target_pipeline.clone() {
            return self.process_targeted(name, request, ts).await;
        }
        if request.capabilities.is_empty() {
            return AnalysisResult::make_failure(
                ErrorRecord::new(ErrorKind::InputValidation, "capabilities must be non-empty", "orchestrator", ts),
                ts,
            );
        }

        let strategy_kind = request.strategy.unwrap_or(self.config.default_strategy);
        tracing::Span::current().record("strategy", strategy_kind.as_str());

        // Snapshot breaker status without mutating (open-cooldown
        // transitions happen lazily, only on an actual attempt below).
        let mut candidates = Vec::new();
        for (name, mut candidate) in self.snapshot_candidates() {
            let Some(entry) = self.registry.get(&name).map(|e| e.value().clone()) else {
                continue;
            };
            if !entry.accepting_calls() {
                continue;
            }
            let breaker_status = entry.breaker.lock().await.status();
            candidate.breaker_open = matches!(breaker_status, synopticon_breaker::BreakerStatus::Open);
            candidates.push(candidate);
        }

        let strategy_request = StrategyRequest {
            required_capabilities: request.capabilities.clone(),
            strategy: strategy_kind,
            performance_floor: request.performance_floor,
        };
        let filtered = filter_candidates(&strategy_request, candidates);
        let ordered = order_candidates(&strategy_request, filtered);

        if ordered.is_empty() {
            return AnalysisResult::make_failure(
                ErrorRecord::new(ErrorKind::ModelUnavailable, "no healthy pipeline covers the requested capabilities", "orchestrator", ts),
                ts,
            );
        }

        let timeout = request.timeout.unwrap_or(self.config.default_timeout);
        let max_attempts = self.config.max_fallbacks + 1;
        let mut last_error: Option<ErrorRecord> = None;
        let mut attempts: u32 = 0;

        for candidate in ordered {
            if attempts >= max_attempts {
                break;
            }
            let name = candidate.name().to_string();
            let Some(entry) = self.registry.get(&name).map(|e| e.value().clone()) else {
                continue;
            };
            if !entry.accepting_calls() {
                continue;
            }

            let admission = {
                let mut breaker = entry.breaker.lock().await;
                breaker.try_acquire(Instant::now())
            };
            if admission == Admission::Reject {
                // Opened between snapshot and attempt; never calls the
                // pipeline (spec I2/I6).
                continue;
            }

            attempts += 1;
            let _guard = InFlightGuard::enter(&entry.in_flight);
            let frame = request.frame.clone();
            let fallback_depth = attempts - 1;

            let call = entry.handle.process(frame);
            let outcome = tokio::time::timeout(timeout, call).await;

            match outcome {
                Ok(result) => match result {
                    AnalysisResult::Success { .. } => {
                        let mut breaker = entry.breaker.lock().await;
                        breaker.on_success();
                        drop(breaker);
                        info!(pipeline = %name, fallback_depth, "dispatch succeeded");
                        return result.with_fallback_depth(fallback_depth);
                    }
                    AnalysisResult::Failure { error, .. } => {
                        if error.kind.counts_toward_breaker() {
                            let mut breaker = entry.breaker.lock().await;
                            breaker.on_failure(Instant::now());
                        }
                        warn!(pipeline = %name, kind = %error.kind, "pipeline attempt failed");
                        last_error = Some(error);
                    }
                },
                Err(_elapsed) => {
                    let mut breaker = entry.breaker.lock().await;
                    breaker.on_failure(Instant::now());
                    drop(breaker);
                    warn!(pipeline = %name, "pipeline attempt timed out");
                    last_error = Some(ErrorRecord::new(
                        ErrorKind::ProcessingTimeout,
                        format!("pipeline {name} exceeded deadline of {timeout:?}"),
                        name.clone(),
                        now_ms(),
                    ));
                    // Detachment of the still-running task after
                    // `cancel_grace` is a caller/runtime concern: since
                    // `process` is driven to completion inside this
                    // `timeout` future, dropping it here cancels the
                    // underlying future at the next await point (spec §5).
                }
            }
        }

        let ts = now_ms();
        match last_error {
            Some(error) => AnalysisResult::make_failure(
                ErrorRecord::new(
                    ErrorKind::DownstreamFailure,
                    format!("all candidates exhausted; last error from {}: {}", error.pipeline, error.message),
                    error.pipeline.clone(),
                    ts,
                ),
                ts,
            ),
            None => AnalysisResult::make_failure(
                ErrorRecord::new(ErrorKind::ModelUnavailable, "no candidate pipeline was attempted", "orchestrator", ts),
                ts,
            ),
        }
    }

    /// Calls exactly one named pipeline directly, still respecting its
    /// circuit breaker and timeout but with no candidate ordering or
    /// fallback chain — there is only ever one candidate (spec §4.J).
    async fn process_targeted(&self, name: String, request: ProcessRequest, ts: i64) -> AnalysisResult {
        let Some(entry) = self.registry.get(&name).map(|e| e.value().clone()) else {
            return AnalysisResult::make_failure(
                ErrorRecord::new(ErrorKind::InputValidation, format!("pipeline {name} is not registered"), "orchestrator", ts),
                ts,
            );
        };
        if !entry.accepting_calls() {
            return AnalysisResult::make_failure(
                ErrorRecord::new(ErrorKind::ModelUnavailable, format!("pipeline {name} is draining or circuit-open"), name, ts),
                ts,
            );
        }
        let admission = entry.breaker.lock().await.try_acquire(Instant::now());
        if admission == Admission::Reject {
            return AnalysisResult::make_failure(ErrorRecord::new(ErrorKind::CircuitOpen, "circuit is open", name, ts), ts);
        }

        let timeout = request.timeout.unwrap_or(self.config.default_timeout);
        let _guard = InFlightGuard::enter(&entry.in_flight);
        let outcome = tokio::time::timeout(timeout, entry.handle.process(request.frame)).await;
        match outcome {
            Ok(result) => {
                let mut breaker = entry.breaker.lock().await;
                match &result {
                    AnalysisResult::Success { .. } => breaker.on_success(),
                    AnalysisResult::Failure { error, .. } if error.kind.counts_toward_breaker() => breaker.on_failure(Instant::now()),
                    AnalysisResult::Failure { .. } => {}
                }
                result
            }
            Err(_elapsed) => {
                let mut breaker = entry.breaker.lock().await;
                breaker.on_failure(Instant::now());
                drop(breaker);
                let ts = now_ms();
                AnalysisResult::make_failure(
                    ErrorRecord::new(ErrorKind::ProcessingTimeout, format!("pipeline {name} exceeded deadline of {timeout:?}"), name, ts),
                    ts,
                )
            }
        }
    }

    pub async fn get_health(&self) -> HealthReport {
        let entries: Vec<Arc<RegisteredPipeline>> = self.registry.iter().map(|e| e.value().clone()).collect();
        let mut statuses = Vec::new();
        for entry in entries {
            let status = entry.handle.get_status();
            let breaker_open = matches!(entry.breaker.lock().await.status(), synopticon_breaker::BreakerStatus::Open);
            statuses.push(PipelineStatusDto::from((&status, breaker_open)));
        }
        let overall = aggregate(&statuses);
        HealthReport { pipelines: statuses, overall }
    }

    pub fn get_metrics(&self) -> std::collections::BTreeMap<String, PipelineState> {
        self.registry
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().handle.get_metrics()))
            .collect()
    }

    pub fn list_descriptors(&self) -> Vec<synopticon_types::PipelineDescriptor> {
        self.registry.iter().map(|e| e.value().descriptor().clone()).collect()
    }
}

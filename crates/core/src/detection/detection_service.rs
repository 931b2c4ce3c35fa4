//! Detection orchestrator.
//!
//! Resolves a spreadsheet to a provider in four steps, stopping at the first
//! success:
//!
//! 1. identity cache
//! 2. discovery + pattern scoring (failures go through recovery)
//! 3. static pattern table
//! 4. operator prompt, optionally registering a new provider
//!
//! Every resolved identity is written to the ephemeral and durable tiers
//! before it is returned, except one recovered verbatim from the cache
//! fallback.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};

use crate::cache::{CacheStore, CacheTier};
use crate::detection::{
    detection_cache_key, ConfidenceScorer, DetectedIdentity, DetectionRequest, DetectionSource,
    NicknameSource, PatternGenerator, StaticPatternTable,
};
use crate::diagnostics::{
    CapabilityStatus, CorrelationId, DetectionOutcome, DiagnosticsSink, EngineEvent, EngineHealth,
    ErrorStats, LogDiagnosticsSink,
};
use crate::errors::{DetectionError, Error, Result};
use crate::providers::{DiscoveryService, NewProvider, ProviderDiscoveryTrait, ProviderRecord};
use crate::recovery::{
    classify, Collaborator, ErrorCategory, ErrorContext, InteractivePrompt, InterventionQueue,
    PendingIntervention, PromptRequest, PromptResponse, RecoveryActions, RecoveryExecutor,
    RecoveryOutcome, RetryPolicy,
};
use crate::settings::EngineSettings;
use crate::utils::text::slugify_code;
use crate::utils::{Clock, SystemClock};

/// Operation name shared by every provider-list read, so a clean read
/// clears the retry counters any earlier read advanced.
const DISCOVER_OPERATION: &str = "discover_providers";

/// An identity plus whether it should be written back to the cache.
type Found = (DetectedIdentity, bool);

pub struct DetectionService {
    settings: EngineSettings,
    discovery: DiscoveryService,
    cache: Arc<CacheStore>,
    generator: PatternGenerator,
    scorer: ConfidenceScorer,
    static_table: StaticPatternTable,
    recovery: RecoveryExecutor,
    interventions: Arc<InterventionQueue>,
    error_stats: Arc<ErrorStats>,
    prompt: Option<Arc<dyn InteractivePrompt>>,
    sink: Arc<dyn DiagnosticsSink>,
    clock: Arc<dyn Clock>,
}

impl DetectionService {
    pub fn builder() -> DetectionServiceBuilder {
        DetectionServiceBuilder::new()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn recovery(&self) -> &RecoveryExecutor {
        &self.recovery
    }

    /// Resolves the provider that owns `request.spreadsheet_id`.
    ///
    /// Only [`DetectionError::ProviderNotDetected`] and
    /// [`DetectionError::MaxRetriesExceeded`] are returned; every other
    /// failure is recovered from internally.
    pub fn detect(&self, request: &DetectionRequest) -> Result<DetectedIdentity> {
        let correlation_id = CorrelationId::new();
        info!(
            "[{}] Detecting provider for '{}' ({})",
            correlation_id, request.spreadsheet_name, request.spreadsheet_id
        );

        if !request.force_refresh {
            if let Some(identity) = self.from_cache(request, &correlation_id) {
                return Ok(identity);
            }
        }

        if let Some((identity, write_back)) = self.from_discovery(request, &correlation_id) {
            return Ok(self.finish(request, &correlation_id, identity, write_back));
        }

        if let Some(identity) = self.from_static(request, &correlation_id) {
            return Ok(self.finish(request, &correlation_id, identity, true));
        }

        self.from_operator(request, &correlation_id)
    }

    fn from_cache(
        &self,
        request: &DetectionRequest,
        correlation_id: &CorrelationId,
    ) -> Option<DetectedIdentity> {
        let started = Instant::now();
        let key = request.cache_key();

        let cached = match self.cache.get::<DetectedIdentity>(&key, CacheTier::Ephemeral) {
            Ok(cached) => cached,
            Err(e) => {
                warn!("[{}] Ignoring unreadable cached identity: {}", correlation_id, e);
                None
            }
        };
        self.sink.emit(EngineEvent::Cache {
            correlation_id: correlation_id.clone(),
            key,
            hit: cached.is_some(),
            tier: CacheTier::Ephemeral,
        });

        let identity = cached.map(|identity| identity.with_source(DetectionSource::Cache));
        self.emit_detection(
            request,
            correlation_id,
            DetectionSource::Cache,
            started,
            identity.as_ref(),
            DetectionOutcome::NoMatch,
        );
        identity
    }

    fn from_discovery(
        &self,
        request: &DetectionRequest,
        correlation_id: &CorrelationId,
    ) -> Option<Found> {
        let started = Instant::now();
        let name = request.spreadsheet_name.as_str();

        let error = match self.discovery.discover(request.force_refresh, correlation_id) {
            Ok(providers) => {
                self.recovery.note_success(DISCOVER_OPERATION);
                let found = self.best_match(name, &providers);
                self.emit_detection(
                    request,
                    correlation_id,
                    DetectionSource::Discovery,
                    started,
                    found.as_ref(),
                    DetectionOutcome::NoMatch,
                );
                return found.map(|identity| (identity, true));
            }
            Err(e) => e,
        };

        let context = ErrorContext::new(DISCOVER_OPERATION)
            .with_collaborator(Collaborator::BackingStore)
            .with_correlation_id(correlation_id.clone())
            .with_spreadsheet(request.spreadsheet_id.as_str());
        let classified = classify(&error, &context);
        warn!(
            "[{}] Discovery failed ({}): {}",
            correlation_id, classified.code, classified.message
        );

        let cache_key = request.cache_key();
        let actions = RecoveryActions::new()
            .with_retry(|| {
                let providers = self.discovery.discover(true, correlation_id)?;
                Ok(self
                    .best_match(name, &providers)
                    .map(|identity| (identity, true)))
            })
            .with_cache_fallback(|window| {
                if let Some(identity) = self
                    .cache
                    .get_within_window::<DetectedIdentity>(&cache_key, window)?
                {
                    debug!(
                        "[{}] Serving cached identity {} from fallback window",
                        correlation_id, identity.provider_code
                    );
                    return Ok(Some(Some((identity, false))));
                }
                Ok(self
                    .discovery
                    .cached_providers_within(window)
                    .and_then(|providers| self.best_match(name, &providers))
                    .map(|identity| Some((identity, true))))
            })
            .with_static_fallback(|| {
                self.static_table
                    .find_match(name)
                    .map(|identity| Some((identity, true)))
            });

        let found = match self.recovery.recover(&classified, actions) {
            RecoveryOutcome::Recovered { value, strategy } => {
                info!(
                    "[{}] Discovery recovered via {} ({})",
                    correlation_id,
                    strategy,
                    if value.is_some() { "match" } else { "no match" }
                );
                value
            }
            RecoveryOutcome::Pending(ticket) => {
                info!(
                    "[{}] Discovery failure queued as ticket {}",
                    correlation_id, ticket
                );
                None
            }
            RecoveryOutcome::MaxRetriesExceeded { attempts } => {
                warn!(
                    "[{}] Discovery still failing after {} retries",
                    correlation_id, attempts
                );
                None
            }
            RecoveryOutcome::Skipped | RecoveryOutcome::Exhausted => None,
        };

        self.emit_detection(
            request,
            correlation_id,
            DetectionSource::Discovery,
            started,
            found.as_ref().map(|(identity, _)| identity),
            DetectionOutcome::Failed,
        );
        found
    }

    /// Highest-scoring provider at or above the confidence threshold.
    /// Ties keep the earlier provider.
    fn best_match(&self, name: &str, providers: &[ProviderRecord]) -> Option<DetectedIdentity> {
        let threshold = self.settings.detection.min_confidence;
        let mut best: Option<(&ProviderRecord, f64)> = None;

        for provider in providers {
            let result = self.scorer.score(name, &self.generator.generate(provider));
            if !result.meets(threshold) {
                continue;
            }
            debug!(
                "Candidate {} scored {} on {} pattern(s)",
                provider.code, result.score, result.matched_pattern_count
            );
            if best.map_or(true, |(_, score)| result.score > score) {
                best = Some((provider, result.score));
            }
        }

        best.map(|(provider, score)| {
            DetectedIdentity::from_provider(provider, score, DetectionSource::Discovery)
        })
    }

    fn from_static(
        &self,
        request: &DetectionRequest,
        correlation_id: &CorrelationId,
    ) -> Option<DetectedIdentity> {
        let started = Instant::now();
        let found = self.static_table.find_match(&request.spreadsheet_name);
        self.emit_detection(
            request,
            correlation_id,
            DetectionSource::StaticPattern,
            started,
            found.as_ref(),
            DetectionOutcome::NoMatch,
        );
        found
    }

    fn from_operator(
        &self,
        request: &DetectionRequest,
        correlation_id: &CorrelationId,
    ) -> Result<DetectedIdentity> {
        let started = Instant::now();
        let prompt = match (&self.prompt, self.settings.detection.allow_manual_fallback) {
            (Some(prompt), true) => prompt,
            _ => return Err(self.not_detected(request, correlation_id, started)),
        };

        let prompt_request = PromptRequest {
            title: "Which provider owns this spreadsheet?".to_string(),
            message: format!(
                "No provider could be detected for '{}'. Enter the provider's name or code.",
                request.spreadsheet_name
            ),
            suggestions: self.suggestions(),
            correlation_id: correlation_id.clone(),
        };
        let answer = match prompt.ask(&prompt_request) {
            Ok(response) => response.answer().map(str::to_string),
            Err(e) => {
                warn!("[{}] Operator prompt failed: {}", correlation_id, e);
                None
            }
        };
        let Some(answer) = answer else {
            debug!("[{}] Operator gave no answer", correlation_id);
            return Err(self.not_detected(request, correlation_id, started));
        };

        match self.resolve_answer(&answer, correlation_id) {
            Ok(Some(identity)) => {
                self.emit_detection(
                    request,
                    correlation_id,
                    DetectionSource::Manual,
                    started,
                    Some(&identity),
                    DetectionOutcome::NoMatch,
                );
                Ok(self.finish(request, correlation_id, identity, true))
            }
            Ok(None) => Err(self.not_detected(request, correlation_id, started)),
            Err(Error::Detection(e @ DetectionError::MaxRetriesExceeded { .. })) => {
                self.emit_detection(
                    request,
                    correlation_id,
                    DetectionSource::Manual,
                    started,
                    None,
                    DetectionOutcome::Failed,
                );
                Err(e.into())
            }
            Err(e) => {
                warn!(
                    "[{}] Could not resolve operator answer '{}': {}",
                    correlation_id, answer, e
                );
                Err(self.not_detected(request, correlation_id, started))
            }
        }
    }

    /// Maps an operator answer to a known provider, or registers it when allowed.
    fn resolve_answer(
        &self,
        answer: &str,
        correlation_id: &CorrelationId,
    ) -> Result<Option<DetectedIdentity>> {
        let providers = match self.discovery.discover(false, correlation_id) {
            Ok(providers) => providers,
            Err(e) => {
                warn!(
                    "[{}] Discovery unavailable for manual lookup: {}",
                    correlation_id, e
                );
                self.discovery
                    .cached_providers_within(self.settings.cache.fallback_window())
                    .unwrap_or_default()
            }
        };

        let registration = NewProvider::from_display_name(answer);
        let wanted = [slugify_code(answer), registration.code.clone()];
        let known = providers.iter().find(|provider| {
            wanted.contains(&provider.code)
                || provider.display_name.eq_ignore_ascii_case(answer)
                || wanted.contains(&slugify_code(&provider.display_name))
        });
        if let Some(provider) = known {
            return Ok(Some(DetectedIdentity::from_provider(
                provider,
                1.0,
                DetectionSource::Manual,
            )));
        }

        if !self.settings.detection.allow_registration {
            debug!(
                "[{}] '{}' is not a known provider and registration is disabled",
                correlation_id, answer
            );
            return Ok(None);
        }

        let record = self.register_provider(registration)?;
        Ok(Some(DetectedIdentity::from_provider(
            &record,
            1.0,
            DetectionSource::Manual,
        )))
    }

    fn suggestions(&self) -> Vec<String> {
        let mut suggestions = vec![
            ErrorCategory::ProviderDetection
                .suggested_action()
                .to_string(),
            "Add a static pattern that matches this spreadsheet's naming scheme.".to_string(),
        ];
        if self.settings.detection.allow_registration {
            suggestions.push("Enter a new provider's full name to register them.".to_string());
        } else {
            suggestions.push("Enable provider registration to add a new provider.".to_string());
        }
        suggestions
    }

    fn not_detected(
        &self,
        request: &DetectionRequest,
        correlation_id: &CorrelationId,
        started: Instant,
    ) -> Error {
        let error: Error = DetectionError::ProviderNotDetected {
            name: request.spreadsheet_name.clone(),
            suggestions: self.suggestions(),
        }
        .into();

        let context = ErrorContext::new("detect_provider")
            .with_correlation_id(correlation_id.clone())
            .with_spreadsheet(request.spreadsheet_id.as_str());
        let classified = classify(&error, &context);
        self.error_stats
            .record(classified.category, classified.severity);
        self.emit_detection(
            request,
            correlation_id,
            DetectionSource::Manual,
            started,
            None,
            DetectionOutcome::Failed,
        );
        warn!("[{}] {}", correlation_id, error);
        error
    }

    fn finish(
        &self,
        request: &DetectionRequest,
        correlation_id: &CorrelationId,
        identity: DetectedIdentity,
        write_back: bool,
    ) -> DetectedIdentity {
        if write_back {
            let key = request.cache_key();
            let ttl = self.settings.cache.detection_ttl();
            for tier in [CacheTier::Ephemeral, CacheTier::Durable] {
                if !self.cache.has_tier(tier) {
                    continue;
                }
                if let Err(e) = self.cache.set(&key, &identity, tier, ttl) {
                    warn!(
                        "[{}] Failed to cache identity in {}: {}",
                        correlation_id, tier, e
                    );
                }
            }
        }
        info!(
            "[{}] '{}' resolved to {} via {} (confidence {:.2})",
            correlation_id,
            request.spreadsheet_name,
            identity.provider_code,
            identity.source,
            identity.confidence
        );
        identity
    }

    fn emit_detection(
        &self,
        request: &DetectionRequest,
        correlation_id: &CorrelationId,
        method: DetectionSource,
        started: Instant,
        found: Option<&DetectedIdentity>,
        miss: DetectionOutcome,
    ) {
        self.sink.emit(EngineEvent::Detection {
            correlation_id: correlation_id.clone(),
            spreadsheet_id: request.spreadsheet_id.clone(),
            method,
            outcome: if found.is_some() {
                DetectionOutcome::Resolved
            } else {
                miss
            },
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            confidence: found.map(|identity| identity.confidence),
        });
    }

    /// Removes the cached identity of one spreadsheet from every tier.
    pub fn invalidate(&self, spreadsheet_id: &str) -> Result<usize> {
        let removed = self.cache.invalidate(&detection_cache_key(spreadsheet_id))?;
        debug!(
            "Invalidated identity for {} in {} tier(s)",
            spreadsheet_id, removed
        );
        Ok(removed)
    }

    /// Drops the cached provider list and reloads it from the backing store.
    pub fn refresh_providers(&self) -> Result<Vec<ProviderRecord>> {
        let correlation_id = CorrelationId::new();
        self.discovery.refresh()?;
        let context = ErrorContext::new(DISCOVER_OPERATION)
            .with_collaborator(Collaborator::BackingStore)
            .with_correlation_id(correlation_id.clone());
        let providers = self
            .recovery
            .run(&context, || self.discovery.discover(true, &correlation_id))?;
        Ok(providers.unwrap_or_default())
    }

    /// Explicitly registers a provider in the backing store.
    pub fn register_provider(&self, new_provider: NewProvider) -> Result<ProviderRecord> {
        if !new_provider.is_valid() {
            return Err(Error::InvalidInput(
                "a provider needs a code and a display name".to_string(),
            ));
        }
        let context = ErrorContext::new("register_provider")
            .with_collaborator(Collaborator::BackingStore);
        self.recovery
            .run(&context, || self.discovery.register(new_provider.clone()))?
            .ok_or_else(|| Error::Unexpected("provider registration was skipped".to_string()))
    }

    pub fn health(&self) -> EngineHealth {
        EngineHealth {
            overall_severity: self.error_stats.max_severity().unwrap_or_default(),
            error_counts: self.error_stats.counts(),
            total_errors: self.error_stats.total(),
            cache: self.cache.stats(),
            pending_interventions: self.interventions.len(),
            checked_at: self.clock.now(),
        }
    }

    /// Collaborators this engine was built with.
    pub fn capabilities(&self) -> Vec<CapabilityStatus> {
        let mut capabilities = vec![CapabilityStatus::new("provider discovery", true, true)];
        for tier in CacheTier::DEFAULT_ORDER {
            capabilities.push(CapabilityStatus::new(
                format!("cache tier {}", tier),
                tier == CacheTier::Ephemeral,
                self.cache.has_tier(tier),
            ));
        }
        capabilities.push(CapabilityStatus::new(
            "interactive prompt",
            false,
            self.prompt.is_some(),
        ));
        capabilities.push(CapabilityStatus::new(
            "static patterns",
            false,
            !self.static_table.is_empty(),
        ));
        capabilities
    }

    pub fn pending_interventions(&self) -> Vec<PendingIntervention> {
        self.interventions.pending()
    }

    /// Puts every pending intervention to `prompt` and returns the answers.
    pub fn resolve_interventions(
        &self,
        prompt: &dyn InteractivePrompt,
    ) -> Vec<(PendingIntervention, PromptResponse)> {
        self.interventions.drain_with(prompt)
    }
}

/// Assembles a [`DetectionService`].
///
/// Provider discovery is required. The cache defaults to three in-memory
/// tiers, the sink to [`LogDiagnosticsSink`], the clock to wall time, and
/// there is no operator prompt unless one is supplied.
#[derive(Default)]
pub struct DetectionServiceBuilder {
    settings: EngineSettings,
    discovery_source: Option<Arc<dyn ProviderDiscoveryTrait>>,
    cache: Option<Arc<CacheStore>>,
    prompt: Option<Arc<dyn InteractivePrompt>>,
    sink: Option<Arc<dyn DiagnosticsSink>>,
    clock: Option<Arc<dyn Clock>>,
    nicknames: Option<Arc<dyn NicknameSource>>,
}

impl DetectionServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn discovery_source(mut self, source: Arc<dyn ProviderDiscoveryTrait>) -> Self {
        self.discovery_source = Some(source);
        self
    }

    pub fn cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn prompt(mut self, prompt: Arc<dyn InteractivePrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn diagnostics_sink(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn nickname_source(mut self, nicknames: Arc<dyn NicknameSource>) -> Self {
        self.nicknames = Some(nicknames);
        self
    }

    pub fn build(self) -> Result<DetectionService> {
        let settings = self.settings;
        settings.validate()?;

        let source = self
            .discovery_source
            .ok_or(Error::MissingCapability("provider discovery"))?;
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let cache = match self.cache {
            Some(cache) => cache,
            None => Arc::new(CacheStore::in_memory_with_clock(clock.clone())),
        };
        if !cache.has_tier(CacheTier::Ephemeral) {
            return Err(Error::MissingCapability("ephemeral cache tier"));
        }
        let sink: Arc<dyn DiagnosticsSink> = match self.sink {
            Some(sink) => sink,
            None => Arc::new(LogDiagnosticsSink),
        };

        let static_table = StaticPatternTable::new(
            &settings.detection.static_patterns,
            settings.detection.static_confidence,
        )?;
        let mut generator = PatternGenerator::new(&settings.detection);
        if let Some(nicknames) = self.nicknames {
            generator = generator.with_nickname_source(nicknames);
        }

        let interventions = Arc::new(InterventionQueue::new(clock.clone()));
        let error_stats = Arc::new(ErrorStats::new(clock.clone()));
        let recovery = RecoveryExecutor::new(
            RetryPolicy::from_settings(&settings.recovery),
            settings.cache.fallback_window(),
            interventions.clone(),
            error_stats.clone(),
            sink.clone(),
        );
        let discovery = DiscoveryService::new(source, cache.clone(), sink.clone(), &settings.cache);

        info!(
            "Detection service ready: {} static pattern(s), tiers {:?}, prompt {}",
            static_table.len(),
            cache.fallback_order(),
            if self.prompt.is_some() { "attached" } else { "absent" }
        );

        Ok(DetectionService {
            settings,
            discovery,
            cache,
            generator,
            scorer: ConfidenceScorer,
            static_table,
            recovery,
            interventions,
            error_stats,
            prompt: self.prompt,
            sink,
            clock,
        })
    }
}

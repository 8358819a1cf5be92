//! The two-tier resolution pipeline.
//!
//! Tier 1 ([`crate::matcher`]) answers common questions without leaving the
//! process. On a miss, tier 2 asks a [`Synthesizer`] for code and runs it in
//! the [`Sandbox`]. Whatever happens, the caller gets one [`Outcome`].

use std::time::Duration;

use gridask_config::{ResolvedAIConfig, Settings};
use gridask_engine::Dataset;

use crate::matcher::{match_query, Match};
use crate::outcome::{ErrorKind, Outcome};
use crate::query::Query;
use crate::sandbox::{Sandbox, SandboxConfig};
use crate::synth::{
    DatasetContext, OpenAiSynthesizer, RateLimitedSynthesizer, SynthError, Synthesizer,
};

const BACKEND_UNAVAILABLE: &str =
    "Complex queries require an API key. Please configure it in your environment.";

const NO_CODE: &str = "could not generate code from the query";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverConfig {
    /// Keep literal row values out of synthesis prompts
    pub privacy_mode: bool,
    pub sandbox: SandboxConfig,
}

impl ResolverConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            privacy_mode: settings.ai.privacy_mode,
            sandbox: SandboxConfig::from_settings(&settings.sandbox),
        }
    }
}

pub struct Resolver {
    config: ResolverConfig,
    synthesizer: Option<Box<dyn Synthesizer>>,
    sandbox: Sandbox,
    /// Why tier 2 is off, when it is
    unavailable_reason: Option<String>,
}

impl Resolver {
    pub fn new(config: ResolverConfig, synthesizer: Option<Box<dyn Synthesizer>>) -> Self {
        let sandbox = Sandbox::new(config.sandbox.clone());
        Self { config, synthesizer, sandbox, unavailable_reason: None }
    }

    /// Tier 1 only.
    pub fn pattern_only(config: ResolverConfig) -> Self {
        Self::new(config, None)
    }

    /// Wire tier 2 from settings when the AI configuration is ready.
    pub fn from_settings(settings: &Settings) -> Self {
        let config = ResolverConfig::from_settings(settings);
        let ai = ResolvedAIConfig::from_settings(&settings.ai);

        if !ai.status.is_ready() {
            let reason = ai.blocking_reason.clone();
            log::warn!(
                "tier 2 unavailable: {}",
                reason.as_deref().unwrap_or(ai.status.as_str())
            );
            let mut resolver = Self::pattern_only(config);
            resolver.unavailable_reason = reason;
            return resolver;
        }

        match OpenAiSynthesizer::from_config(&ai) {
            Ok(client) => {
                log::debug!("tier 2 enabled: {} via {}", ai.model, ai.endpoint);
                let synthesizer: Box<dyn Synthesizer> = if ai.min_interval_ms > 0 {
                    Box::new(RateLimitedSynthesizer::new(
                        client,
                        Duration::from_millis(ai.min_interval_ms),
                    ))
                } else {
                    Box::new(client)
                };
                Self::new(config, Some(synthesizer))
            }
            Err(e) => {
                log::warn!("could not build synthesis client: {}", e);
                let mut resolver = Self::pattern_only(config);
                resolver.unavailable_reason = Some(e.to_string());
                resolver
            }
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Whether misses can escalate to code synthesis.
    pub fn ai_available(&self) -> bool {
        self.synthesizer.is_some()
    }

    pub fn resolve(&self, dataset: &Dataset, query: &str) -> Outcome {
        self.resolve_query(dataset, &Query::new(query))
    }

    pub fn resolve_query(&self, dataset: &Dataset, query: &Query) -> Outcome {
        match match_query(dataset, query) {
            Match::Hit { rule, outcome } => {
                log::debug!("tier 1 resolved query with rule '{}'", rule);
                outcome
            }
            Match::Miss => {
                log::debug!("tier 1 miss, escalating");
                self.synthesize_and_run(dataset, query)
            }
        }
    }

    fn unavailable(&self) -> Outcome {
        let message = match &self.unavailable_reason {
            Some(reason) => format!("{} ({})", BACKEND_UNAVAILABLE, reason),
            None => BACKEND_UNAVAILABLE.to_string(),
        };
        Outcome::failed(ErrorKind::BackendUnavailable, message)
    }

    fn synthesize_and_run(&self, dataset: &Dataset, query: &Query) -> Outcome {
        let Some(synthesizer) = &self.synthesizer else {
            return self.unavailable();
        };

        let context = DatasetContext::from_dataset(dataset, self.config.privacy_mode);
        log::info!("tier 2: synthesizing code for {:?}", query.raw());

        let synthesis = match synthesizer.synthesize(&context, query.raw()) {
            Ok(s) => s,
            Err(SynthError::NoCode) => {
                log::warn!("synthesis returned no code");
                return Outcome::failed(ErrorKind::SynthesisFailed, NO_CODE);
            }
            Err(e) => {
                log::warn!("synthesis failed: {}", e);
                return Outcome::failed(ErrorKind::SynthesisFailed, e.to_string());
            }
        };
        log::debug!("generated code:\n{}", synthesis.code);

        match self.sandbox.execute(dataset, &synthesis.code) {
            Ok(data) => Outcome::ai_resolved(data, synthesis.explanation, synthesis.code),
            Err(e) => {
                log::error!("code execution failed: {}", e);
                Outcome::failed(ErrorKind::ExecutionFailed, format!("Code execution error: {}", e))
            }
        }
    }
}

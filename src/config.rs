//! Engine configuration: file settings, pluggable strategies, validation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{
    KarmaError, KarmaResult, DEFAULT_COOLDOWN_SECS, DEFAULT_DECAY_INTERVAL_SECS,
    DEFAULT_LINK_THRESHOLD, DEFAULT_LIST_SIZE, MAX_LIST_SIZE,
};

/// Turns raw user input into a term's identity.
pub trait TermNormalizer: Send + Sync {
    fn normalize(&self, raw: &str) -> String;
}

impl<F> TermNormalizer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn normalize(&self, raw: &str) -> String {
        self(raw)
    }
}

/// Picks the age, in seconds, of the `index`-th of `count` synthesized
/// actions spread across a decay window of `interval` seconds.
///
/// Implementations must be monotone in `index` for a fixed `count` and
/// should return ages within `[0, interval]`.
pub trait DecayDistributor: Send + Sync {
    fn age(&self, interval: f64, index: usize, count: usize) -> f64;
}

impl<F> DecayDistributor for F
where
    F: Fn(f64, usize, usize) -> f64 + Send + Sync,
{
    fn age(&self, interval: f64, index: usize, count: usize) -> f64 {
        self(interval, index, count)
    }
}

/// Converts a legacy set of modifying users into `(weight, user_id)` pairs,
/// given the term's current score.
pub trait ModifiedUpgrader: Send + Sync {
    fn upgrade(&self, score: i64, user_ids: &[String]) -> Vec<(f64, String)>;
}

impl<F> ModifiedUpgrader for F
where
    F: Fn(i64, &[String]) -> Vec<(f64, String)> + Send + Sync,
{
    fn upgrade(&self, score: i64, user_ids: &[String]) -> Vec<(f64, String)> {
        self(score, user_ids)
    }
}

/// Lower-cases and trims.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowercaseNormalizer;

impl TermNormalizer for LowercaseNormalizer {
    fn normalize(&self, raw: &str) -> String {
        raw.trim().to_lowercase()
    }
}

/// Leaves terms exactly as typed.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNormalizer;

impl TermNormalizer for IdentityNormalizer {
    fn normalize(&self, raw: &str) -> String {
        raw.to_string()
    }
}

/// Sigmoid-like spread: ages bunch up near both ends of the window so that
/// decay erodes a backfilled score gradually.
///
/// `x = 4 * interval / (count + 1) * (index + 1)`,
/// `age = interval - interval * x / sqrt(x^2 + interval^2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SigmoidDistributor;

impl DecayDistributor for SigmoidDistributor {
    fn age(&self, interval: f64, index: usize, count: usize) -> f64 {
        if interval <= 0.0 {
            return 0.0;
        }
        let x = 4.0 * interval / (count as f64 + 1.0) * (index as f64 + 1.0);
        interval - interval * x / (x * x + interval * interval).sqrt()
    }
}

/// Evenly spaced ages: `interval / (count + 1) * (index + 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearDistributor;

impl DecayDistributor for LinearDistributor {
    fn age(&self, interval: f64, index: usize, count: usize) -> f64 {
        interval / (count as f64 + 1.0) * (index as f64 + 1.0)
    }
}

/// Credits every legacy modifier with a single contribution.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnePerUserUpgrader;

impl ModifiedUpgrader for OnePerUserUpgrader {
    fn upgrade(&self, _score: i64, user_ids: &[String]) -> Vec<(f64, String)> {
        user_ids.iter().map(|id| (1.0, id.clone())).collect()
    }
}

/// File-level settings, loadable from TOML. Strategies are referred to by
/// name and resolved by [`KarmaConfigBuilder::settings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KarmaSettings {
    /// Seconds a user must wait before modifying the same term again.
    pub cooldown: Option<u64>,
    /// Minimum absolute own score both terms need before they can be linked.
    pub link_threshold: Option<i64>,
    /// Whether contributions expire.
    pub decay: bool,
    /// Seconds a contribution counts before it expires.
    pub decay_interval: u64,
    /// Upper bound for best/worst listings.
    pub max_list_size: usize,
    /// Listing size when the caller does not ask for one.
    pub default_list_size: usize,
    /// "lowercase" or "identity".
    pub normalizer: String,
    /// "sigmoid" or "linear".
    pub distributor: String,
    /// "one_per_user".
    pub upgrader: String,
    /// Static user directory (id -> display name) for front ends.
    pub users: BTreeMap<String, String>,
}

impl Default for KarmaSettings {
    fn default() -> Self {
        Self {
            cooldown: Some(DEFAULT_COOLDOWN_SECS),
            link_threshold: Some(DEFAULT_LINK_THRESHOLD),
            decay: false,
            decay_interval: DEFAULT_DECAY_INTERVAL_SECS,
            max_list_size: MAX_LIST_SIZE,
            default_list_size: DEFAULT_LIST_SIZE,
            normalizer: "lowercase".to_string(),
            distributor: "sigmoid".to_string(),
            upgrader: "one_per_user".to_string(),
            users: BTreeMap::new(),
        }
    }
}

impl KarmaSettings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> KarmaResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KarmaError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML text.
    pub fn from_toml(content: &str) -> KarmaResult<Self> {
        toml::from_str(content).map_err(|e| KarmaError::Configuration(e.to_string()))
    }

    /// Render settings as TOML.
    pub fn to_toml(&self) -> KarmaResult<String> {
        toml::to_string_pretty(self).map_err(|e| KarmaError::Configuration(e.to_string()))
    }
}

/// Validated runtime configuration handed to the engine.
#[derive(Clone)]
pub struct KarmaConfig {
    cooldown: Option<u64>,
    link_threshold: Option<i64>,
    decay: bool,
    decay_interval: u64,
    max_list_size: usize,
    default_list_size: usize,
    normalizer: Arc<dyn TermNormalizer>,
    distributor: Arc<dyn DecayDistributor>,
    upgrader: Arc<dyn ModifiedUpgrader>,
}

impl KarmaConfig {
    /// Start from the defaults.
    pub fn builder() -> KarmaConfigBuilder {
        KarmaConfigBuilder::new()
    }

    /// Build directly from file settings.
    pub fn from_settings(settings: &KarmaSettings) -> KarmaResult<Self> {
        Self::builder().settings(settings)?.build()
    }

    /// Cooldown in seconds, `None` when disabled.
    pub fn cooldown(&self) -> Option<u64> {
        self.cooldown.filter(|secs| *secs > 0)
    }

    /// Link threshold as a non-negative value, `None` when disabled.
    pub fn link_threshold(&self) -> Option<i64> {
        self.link_threshold.map(i64::abs)
    }

    /// Whether decay is switched on and has a usable window.
    pub fn decay_enabled(&self) -> bool {
        self.decay && self.decay_interval > 0
    }

    /// Decay window in seconds.
    pub fn decay_interval(&self) -> u64 {
        self.decay_interval
    }

    pub fn max_list_size(&self) -> usize {
        self.max_list_size
    }

    pub fn default_list_size(&self) -> usize {
        self.default_list_size
    }

    /// Apply the configured normalizer.
    pub fn normalize(&self, raw: &str) -> String {
        self.normalizer.normalize(raw)
    }

    pub fn distributor(&self) -> &dyn DecayDistributor {
        self.distributor.as_ref()
    }

    pub fn upgrader(&self) -> &dyn ModifiedUpgrader {
        self.upgrader.as_ref()
    }
}

impl Default for KarmaConfig {
    fn default() -> Self {
        Self {
            cooldown: Some(DEFAULT_COOLDOWN_SECS),
            link_threshold: Some(DEFAULT_LINK_THRESHOLD),
            decay: false,
            decay_interval: DEFAULT_DECAY_INTERVAL_SECS,
            max_list_size: MAX_LIST_SIZE,
            default_list_size: DEFAULT_LIST_SIZE,
            normalizer: Arc::new(LowercaseNormalizer),
            distributor: Arc::new(SigmoidDistributor),
            upgrader: Arc::new(OnePerUserUpgrader),
        }
    }
}

impl fmt::Debug for KarmaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KarmaConfig")
            .field("cooldown", &self.cooldown)
            .field("link_threshold", &self.link_threshold)
            .field("decay", &self.decay)
            .field("decay_interval", &self.decay_interval)
            .field("max_list_size", &self.max_list_size)
            .field("default_list_size", &self.default_list_size)
            .finish_non_exhaustive()
    }
}

/// Builder for [`KarmaConfig`]. All validation happens in [`build`](Self::build)
/// or when a named strategy is resolved.
pub struct KarmaConfigBuilder {
    config: KarmaConfig,
}

impl KarmaConfigBuilder {
    fn new() -> Self {
        Self {
            config: KarmaConfig::default(),
        }
    }

    /// Copy every field from file settings, resolving strategy names.
    pub fn settings(self, settings: &KarmaSettings) -> KarmaResult<Self> {
        Ok(self
            .cooldown(settings.cooldown)
            .link_threshold(settings.link_threshold)
            .decay(settings.decay)
            .decay_interval(settings.decay_interval)
            .max_list_size(settings.max_list_size)
            .default_list_size(settings.default_list_size)
            .normalizer_named(&settings.normalizer)?
            .distributor_named(&settings.distributor)?
            .upgrader_named(&settings.upgrader)?)
    }

    pub fn cooldown(mut self, secs: Option<u64>) -> Self {
        self.config.cooldown = secs;
        self
    }

    pub fn link_threshold(mut self, threshold: Option<i64>) -> Self {
        self.config.link_threshold = threshold;
        self
    }

    pub fn decay(mut self, enabled: bool) -> Self {
        self.config.decay = enabled;
        self
    }

    pub fn decay_interval(mut self, secs: u64) -> Self {
        self.config.decay_interval = secs;
        self
    }

    pub fn max_list_size(mut self, n: usize) -> Self {
        self.config.max_list_size = n;
        self
    }

    pub fn default_list_size(mut self, n: usize) -> Self {
        self.config.default_list_size = n;
        self
    }

    pub fn normalizer(mut self, normalizer: Arc<dyn TermNormalizer>) -> Self {
        self.config.normalizer = normalizer;
        self
    }

    pub fn distributor(mut self, distributor: Arc<dyn DecayDistributor>) -> Self {
        self.config.distributor = distributor;
        self
    }

    pub fn upgrader(mut self, upgrader: Arc<dyn ModifiedUpgrader>) -> Self {
        self.config.upgrader = upgrader;
        self
    }

    /// Select a built-in normalizer by name.
    pub fn normalizer_named(self, name: &str) -> KarmaResult<Self> {
        let normalizer: Arc<dyn TermNormalizer> = match name.to_lowercase().as_str() {
            "lowercase" | "default" => Arc::new(LowercaseNormalizer),
            "identity" | "none" => Arc::new(IdentityNormalizer),
            other => return Err(unknown_strategy("normalizer", other)),
        };
        Ok(self.normalizer(normalizer))
    }

    /// Select a built-in decay distributor by name.
    pub fn distributor_named(self, name: &str) -> KarmaResult<Self> {
        let distributor: Arc<dyn DecayDistributor> = match name.to_lowercase().as_str() {
            "sigmoid" | "default" => Arc::new(SigmoidDistributor),
            "linear" => Arc::new(LinearDistributor),
            other => return Err(unknown_strategy("distributor", other)),
        };
        Ok(self.distributor(distributor))
    }

    /// Select a built-in modified-set upgrader by name.
    pub fn upgrader_named(self, name: &str) -> KarmaResult<Self> {
        let upgrader: Arc<dyn ModifiedUpgrader> = match name.to_lowercase().as_str() {
            "one_per_user" | "default" => Arc::new(OnePerUserUpgrader),
            other => return Err(unknown_strategy("upgrader", other)),
        };
        Ok(self.upgrader(upgrader))
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> KarmaResult<KarmaConfig> {
        let config = self.config;
        if config.max_list_size == 0 {
            return Err(KarmaError::Configuration(
                "max_list_size must be at least 1".to_string(),
            ));
        }
        if config.decay && config.decay_interval == 0 {
            log::warn!("Decay is enabled with a zero interval; decay will stay inactive");
        }
        Ok(config)
    }
}

fn unknown_strategy(kind: &str, name: &str) -> KarmaError {
    KarmaError::Configuration(format!("unknown {kind} '{name}'"))
}

//! YAML configuration for stub sets.
//!
//! ```yaml
//! enabled: true
//! fixtures_dir: ./fixtures
//! delivery:
//!   slot_interval_ms: 100
//! stubs:
//!   - name: login
//!     match:
//!       method: POST
//!       path: { starts_with: /login }
//!     response:
//!       status: 200
//!       json: { token: abc }
//!       delay_ms: 250
//!       timing: { preset: 3g }
//! ```

mod stubs;

use crate::delivery::DeliveryConfig;
use crate::matchers::CompiledMatch;
use crate::response::Fixtures;
use crate::stub::{ResponseFactory, StubId, StubRegistry};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub use stubs::{ResponseDefinition, StubDefinition, TimingDefinition};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterceptConfig {
    /// Initial state of the registry's global switch
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub delivery: DeliverySettings,

    /// Root for `fixture` responses and relative `file` paths.
    /// Relative to the config file when loaded with [`InterceptConfig::from_file`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixtures_dir: Option<PathBuf>,

    /// Listed oldest first, so later entries take precedence
    #[serde(default)]
    pub stubs: Vec<StubDefinition>,
}

fn default_enabled() -> bool {
    true
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delivery: DeliverySettings::default(),
            fixtures_dir: None,
            stubs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeliverySettings {
    pub slot_interval_ms: u64,
    pub read_chunk_size: usize,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        let defaults = DeliveryConfig::default();
        Self {
            slot_interval_ms: defaults.slot_interval.as_millis() as u64,
            read_chunk_size: defaults.read_chunk_size,
        }
    }
}

impl InterceptConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut config: InterceptConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        if let (Some(dir), Some(parent)) = (&config.fixtures_dir, path.parent()) {
            if dir.is_relative() {
                config.fixtures_dir = Some(parent.join(dir));
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, anyhow::Error> {
        let config: InterceptConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.delivery.slot_interval_ms == 0 {
            anyhow::bail!("delivery.slot_interval_ms must be greater than zero");
        }
        if self.delivery.read_chunk_size == 0 {
            anyhow::bail!("delivery.read_chunk_size must be greater than zero");
        }

        let fixtures = self.fixtures();
        for (index, stub) in self.stubs.iter().enumerate() {
            let label = stub.describe(index);
            CompiledMatch::compile(&stub.matcher)
                .with_context(|| format!("stub {label}: invalid match pattern"))?;
            stub.response
                .validate(fixtures.as_ref())
                .with_context(|| format!("stub {label}: invalid response"))?;
        }
        Ok(())
    }

    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            slot_interval: Duration::from_millis(self.delivery.slot_interval_ms),
            read_chunk_size: self.delivery.read_chunk_size,
        }
    }

    pub fn fixtures(&self) -> Option<Fixtures> {
        self.fixtures_dir.as_ref().map(Fixtures::new)
    }

    /// Register every stub into `registry`, oldest first.
    ///
    /// All stubs are built before any is registered, so a bad entry leaves
    /// the registry untouched.
    pub fn apply(&self, registry: &StubRegistry) -> Result<Vec<StubId>, anyhow::Error> {
        let fixtures = self.fixtures();
        let mut built = Vec::with_capacity(self.stubs.len());
        for (index, stub) in self.stubs.iter().enumerate() {
            let label = stub.describe(index);
            let matcher = CompiledMatch::compile(&stub.matcher)
                .with_context(|| format!("stub {label}: invalid match pattern"))?;
            let response = stub
                .response
                .build(fixtures.as_ref())
                .with_context(|| format!("stub {label}: cannot build response"))?;
            built.push((stub.name.clone(), matcher, response));
        }

        registry.set_enabled(self.enabled);
        let ids: Vec<StubId> = built
            .into_iter()
            .map(|(name, matcher, response)| {
                let factory: Box<dyn ResponseFactory> = Box::new(response);
                registry.register_boxed(name, Box::new(matcher), factory)
            })
            .collect();

        info!(
            stubs = ids.len(),
            enabled = self.enabled,
            "Loaded stubs from configuration"
        );
        Ok(ids)
    }
}

//! Stub definitions as written in YAML.

use crate::error::{TransportError, TransportErrorKind};
use crate::matchers::MatchConfig;
use crate::response::{header_map, Fixtures, ResponseSpec};
use crate::timing::{Bandwidth, ResponseTiming};
use anyhow::{anyhow, bail, Context};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StubDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Omitted means match every request
    #[serde(rename = "match", default)]
    pub matcher: MatchConfig,
    #[serde(default)]
    pub response: ResponseDefinition,
}

impl StubDefinition {
    /// Name for log and error messages.
    pub(crate) fn describe(&self, index: usize) -> String {
        match &self.name {
            Some(name) => format!("'{name}'"),
            None => format!("#{index}"),
        }
    }
}

/// Response block of a stub. At most one body source may be set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponseDefinition {
    pub status: u16,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
    /// Streamed from disk; relative paths resolve against `fixtures_dir`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Name of a `<name>.response` raw message under `fixtures_dir`.
    /// Status and headers come from the file; `headers` here override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture: Option<String>,
    pub delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<TimingDefinition>,
    /// Fail with this transport error instead of responding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TransportErrorKind>,
}

impl Default for ResponseDefinition {
    fn default() -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body: None,
            body_base64: None,
            json: None,
            file: None,
            fixture: None,
            delay_ms: 0,
            timing: None,
            error: None,
        }
    }
}

/// Body transfer timing, written as `{ preset: edge }`, `{ seconds: 2.5 }`
/// or `{ kbps: 100 }`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TimingDefinition {
    /// Named network speed
    Preset { preset: Bandwidth },
    /// Total transfer time in seconds
    Seconds { seconds: f64 },
    /// Transfer rate in KB/s
    Kbps { kbps: f64 },
}

impl TimingDefinition {
    pub fn to_timing(self) -> anyhow::Result<ResponseTiming> {
        match self {
            TimingDefinition::Preset { preset } => Ok(preset.into()),
            TimingDefinition::Seconds { seconds: secs } => {
                if !secs.is_finite() || secs < 0.0 {
                    bail!("timing.seconds must be a non-negative number, got {secs}");
                }
                Ok(ResponseTiming::from_signed(secs)?)
            }
            TimingDefinition::Kbps { kbps: rate } => {
                if !rate.is_finite() || rate <= 0.0 {
                    bail!("timing.kbps must be a positive number, got {rate}");
                }
                Ok(ResponseTiming::Rate { kbps: rate })
            }
        }
    }
}

impl ResponseDefinition {
    fn body_sources(&self) -> usize {
        [
            self.body.is_some(),
            self.body_base64.is_some(),
            self.json.is_some(),
            self.file.is_some(),
            self.fixture.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }

    pub(crate) fn validate(&self, fixtures: Option<&Fixtures>) -> anyhow::Result<()> {
        if self.body_sources() > 1 {
            bail!("only one of body, body_base64, json, file or fixture may be set");
        }
        if self.fixture.is_some() && fixtures.is_none() {
            bail!("'fixture' requires 'fixtures_dir' to be configured");
        }
        if hyper::StatusCode::from_u16(self.status).is_err() {
            bail!("invalid status code {}", self.status);
        }
        if let Some(timing) = self.timing {
            timing.to_timing()?;
        }
        Ok(())
    }

    /// Build the response template for this definition.
    ///
    /// Files are checked here, so a missing fixture fails at load time.
    pub fn build(&self, fixtures: Option<&Fixtures>) -> anyhow::Result<ResponseSpec> {
        let delay = Duration::from_millis(self.delay_ms);

        if let Some(kind) = self.error {
            return Ok(ResponseSpec::from_error(TransportError::from(kind)).with_delay(delay));
        }

        let headers = header_map(&self.headers)?;
        let spec = if let Some(name) = &self.fixture {
            let fixtures = fixtures.ok_or_else(|| anyhow!("'fixture' requires 'fixtures_dir'"))?;
            let mut spec = fixtures
                .response_named(name)
                .with_context(|| format!("loading fixture '{name}'"))?;
            for (name, value) in &self.headers {
                spec = spec.with_header(name, value)?;
            }
            spec
        } else if let Some(path) = &self.file {
            let path = match fixtures {
                Some(fixtures) if path.is_relative() => fixtures.root().join(path),
                _ => path.clone(),
            };
            ResponseSpec::from_file(path, self.status, headers)?
        } else if let Some(value) = &self.json {
            ResponseSpec::from_json(value, self.status, headers)?
        } else if let Some(encoded) = &self.body_base64 {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .context("body_base64 is not valid base64")?;
            ResponseSpec::from_bytes(bytes, self.status, headers)?
        } else {
            let body = self.body.clone().unwrap_or_default();
            ResponseSpec::from_bytes(body, self.status, headers)?
        };

        let timing = match self.timing {
            Some(timing) => timing.to_timing()?,
            None => ResponseTiming::default(),
        };
        Ok(spec.with_delay(delay).with_timing(timing))
    }
}

#![forbid(unsafe_code)]

//! Propagation configuration.
//!
//! # Environment
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `STATECAST_MAX_DEPTH` | Maximum nesting of propagation chains (positive integer) |
//! | `STATECAST_EVIDENCE` | Enable the JSONL evidence sink: `-` for stdout, otherwise a file path |
//!
//! Unparseable values are ignored (with a warning) and the default is kept.

use crate::evidence_sink::{EvidenceSinkConfig, EvidenceSinkDestination};

/// Default bound on nested propagation chains.
pub const DEFAULT_MAX_DEPTH: usize = 32;

const ENV_MAX_DEPTH: &str = "STATECAST_MAX_DEPTH";
const ENV_EVIDENCE: &str = "STATECAST_EVIDENCE";

/// Configuration for a [`StateTree`](crate::tree::StateTree).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationConfig {
    /// Maximum number of propagation chains that may be active on the call
    /// stack at once. A handler or listener write beyond this depth is
    /// rejected with `TreeError::RecursionLimit`.
    pub max_depth: usize,
    /// Evidence logging for root broadcasts.
    pub evidence: EvidenceSinkConfig,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            evidence: EvidenceSinkConfig::default(),
        }
    }
}

impl PropagationConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the nesting bound. Zero is raised to one so that
    /// top-level writes always run.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    #[must_use]
    pub fn with_evidence(mut self, evidence: EvidenceSinkConfig) -> Self {
        self.evidence = evidence;
        self
    }

    /// Defaults overridden by the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_MAX_DEPTH) {
            match raw.trim().parse::<usize>() {
                Ok(depth) if depth > 0 => config.max_depth = depth,
                _ => tracing::warn!(value = %raw, "ignoring invalid {ENV_MAX_DEPTH}"),
            }
        }

        if let Some(raw) = lookup(ENV_EVIDENCE) {
            let raw = raw.trim();
            if raw == "-" {
                config.evidence = EvidenceSinkConfig::enabled_stdout();
            } else if !raw.is_empty() {
                config.evidence = EvidenceSinkConfig::enabled_file(raw);
            }
        }

        config
    }

    /// Whether broadcasts are logged to an evidence sink.
    #[must_use]
    pub fn logs_evidence(&self) -> bool {
        self.evidence.enabled
    }

    /// The evidence destination, when enabled.
    #[must_use]
    pub fn evidence_destination(&self) -> Option<&EvidenceSinkDestination> {
        self.evidence.enabled.then_some(&self.evidence.destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = PropagationConfig::default();
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!config.logs_evidence());
        assert_eq!(config.evidence_destination(), None);
    }

    #[test]
    fn zero_depth_is_raised() {
        assert_eq!(PropagationConfig::new().with_max_depth(0).max_depth, 1);
    }

    #[test]
    fn env_overrides_depth_and_evidence() {
        let config = PropagationConfig::from_lookup(lookup(&[
            ("STATECAST_MAX_DEPTH", "8"),
            ("STATECAST_EVIDENCE", "/tmp/statecast.jsonl"),
        ]));
        assert_eq!(config.max_depth, 8);
        assert_eq!(
            config.evidence_destination(),
            Some(&EvidenceSinkDestination::File(PathBuf::from(
                "/tmp/statecast.jsonl"
            )))
        );
    }

    #[test]
    fn dash_selects_stdout() {
        let config = PropagationConfig::from_lookup(lookup(&[("STATECAST_EVIDENCE", "-")]));
        assert_eq!(
            config.evidence_destination(),
            Some(&EvidenceSinkDestination::Stdout)
        );
    }

    #[test]
    fn invalid_depth_keeps_default() {
        for raw in ["zero", "0", "-3", ""] {
            let config = PropagationConfig::from_lookup(lookup(&[("STATECAST_MAX_DEPTH", raw)]));
            assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH, "input {raw:?}");
        }
    }
}

//! Engine configuration.

use std::str::FromStr;

use crate::materialize::{MaterializeOptions, ThresholdLimits};
use crate::pool::DEFAULT_POOL_CAPACITY;

/// Environment variable for [`EngineConfig::pool_capacity`].
pub const ENV_POOL_CAPACITY: &str = "XMLBRIDGE_POOL_CAPACITY";
/// Environment variable for [`EngineConfig::max_depth`].
pub const ENV_MAX_ELEMENT_DEPTH: &str = "XMLBRIDGE_MAX_ELEMENT_DEPTH";
/// Environment variable for [`EngineConfig::max_element_count`].
pub const ENV_MAX_ELEMENT_COUNT: &str = "XMLBRIDGE_MAX_ELEMENT_COUNT";

/// Settings fixed for the lifetime of an [`Engine`](super::Engine).
///
/// # Examples
///
/// ```
/// use xmlbridge::engine::EngineConfig;
///
/// let config = EngineConfig::default().max_depth(64).pool_capacity(4);
/// assert_eq!(config.max_depth, 64);
/// assert_eq!(config.max_element_count, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Idle factories kept per pool. Defaults to 20.
    pub pool_capacity: usize,
    /// Maximum element nesting depth when materializing; `<= 0` disables.
    pub max_depth: i64,
    /// Maximum elements per materialization; `<= 0` disables.
    pub max_element_count: i64,
    /// The reader factory is safe to share between callers, so the reader
    /// pool is bypassed. Defaults to `false`.
    pub shared_reader_factory: bool,
    /// Attach source locations to materialized nodes. Defaults to `false`.
    pub record_locations: bool,
    /// Synthesize missing namespace declarations when materializing.
    /// Defaults to `false`.
    pub repair_namespaces: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            max_depth: 0,
            max_element_count: 0,
            shared_reader_factory: false,
            record_locations: false,
            repair_namespaces: false,
        }
    }
}

impl EngineConfig {
    /// Reads the tunables from the process environment, falling back to
    /// defaults (with a warning) for invalid values.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the tunables through `lookup` instead of the environment.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            pool_capacity: parse_or(&lookup, ENV_POOL_CAPACITY, defaults.pool_capacity),
            max_depth: parse_or(&lookup, ENV_MAX_ELEMENT_DEPTH, defaults.max_depth),
            max_element_count: parse_or(
                &lookup,
                ENV_MAX_ELEMENT_COUNT,
                defaults.max_element_count,
            ),
            ..defaults
        }
    }

    /// Sets the pool capacity.
    #[must_use]
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Sets the maximum nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max_depth: i64) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets the maximum element count.
    #[must_use]
    pub fn max_element_count(mut self, max_element_count: i64) -> Self {
        self.max_element_count = max_element_count;
        self
    }

    /// Declares the reader factory shareable.
    #[must_use]
    pub fn shared_reader_factory(mut self, shared: bool) -> Self {
        self.shared_reader_factory = shared;
        self
    }

    /// Enables or disables location recording.
    #[must_use]
    pub fn record_locations(mut self, enable: bool) -> Self {
        self.record_locations = enable;
        self
    }

    /// Enables or disables namespace repair.
    #[must_use]
    pub fn repair_namespaces(mut self, enable: bool) -> Self {
        self.repair_namespaces = enable;
        self
    }

    /// The materializer limits this configuration implies.
    #[must_use]
    pub fn limits(&self) -> ThresholdLimits {
        ThresholdLimits::default()
            .with_max_depth(self.max_depth)
            .with_max_element_count(self.max_element_count)
    }

    /// The materializer options this configuration implies.
    #[must_use]
    pub fn materialize_options(&self) -> MaterializeOptions {
        MaterializeOptions::default()
            .repair_namespaces(self.repair_namespaces)
            .record_locations(self.record_locations)
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            log::warn!("ignoring invalid {name}={raw:?}; using the default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.pool_capacity, 20);
        assert_eq!(config.limits(), ThresholdLimits::unlimited());
        assert!(!config.shared_reader_factory);
    }

    #[test]
    fn test_lookup_reads_tunables() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_POOL_CAPACITY, "3"),
            (ENV_MAX_ELEMENT_DEPTH, " 100 "),
            (ENV_MAX_ELEMENT_COUNT, "5000"),
        ]));
        assert_eq!(config.pool_capacity, 3);
        assert_eq!(config.max_depth, 100);
        assert_eq!(config.max_element_count, 5000);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_POOL_CAPACITY, "many"),
            (ENV_MAX_ELEMENT_DEPTH, "-1"),
        ]));
        assert_eq!(config.pool_capacity, 20);
        assert_eq!(config.max_depth, -1);
        assert!(!config.limits().is_enabled());
    }
}

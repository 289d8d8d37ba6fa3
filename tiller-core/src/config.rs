use crate::CachePolicy;
use std::env;

pub const CACHE_POLICY_ENV: &str = "TILLER_CACHE_POLICY";

/// Settings of a [`RecordEngine`](crate::RecordEngine).
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub cache_policy: CachePolicy,
}

impl EngineConfig {
    /// Defaults overridden by the environment (`TILLER_CACHE_POLICY`).
    ///
    /// An unparsable value is logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = env::var(CACHE_POLICY_ENV) {
            match value.parse() {
                Ok(policy) => config.cache_policy = policy,
                Err(e) => log::warn!(
                    "Ignoring {}: {:#}, using {:?}",
                    CACHE_POLICY_ENV,
                    e,
                    config.cache_policy
                ),
            }
        }
        config
    }

    pub fn with_cache_policy(mut self, cache_policy: CachePolicy) -> Self {
        self.cache_policy = cache_policy;
        self
    }
}

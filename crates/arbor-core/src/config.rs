use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_UPDATE_RATE: u32 = 60;
pub const DEFAULT_MAX_SETTLE_CYCLES: usize = 1024;
pub const DEFAULT_ORIGIN: &str = "http://localhost/";

/// Engine settings. Start from [`EngineConfig::default`] and adjust with the
/// `with_*` methods; [`crate::Engine::new`] validates the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// `None` keeps the event queue unbounded. With `Some(n)` an enqueue on a
    /// full queue is rejected with `DispatchError::QueueFull`, it never blocks.
    pub queue_capacity: Option<usize>,
    /// Frames per second for hosts that drive the loop on a clock.
    pub update_rate: u32,
    /// Upper bound on the cycles `consume_all` runs before giving up.
    pub max_settle_cycles: usize,
    /// Base that navigation locations are resolved against.
    pub origin: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: None,
            update_rate: DEFAULT_UPDATE_RATE,
            max_settle_cycles: DEFAULT_MAX_SETTLE_CYCLES,
            origin: DEFAULT_ORIGIN.to_owned(),
        }
    }
}

impl EngineConfig {
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.queue_capacity = None;
        self
    }

    pub fn with_update_rate(mut self, frames_per_second: u32) -> Self {
        self.update_rate = frames_per_second;
        self
    }

    pub fn with_max_settle_cycles(mut self, cycles: usize) -> Self {
        self.max_settle_cycles = cycles;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Time between two frames at the configured update rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.update_rate.max(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin_url().map(|_| ())
    }

    pub(crate) fn origin_url(&self) -> Result<Url, ConfigError> {
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.update_rate == 0 {
            return Err(ConfigError::ZeroUpdateRate);
        }
        if self.max_settle_cycles == 0 {
            return Err(ConfigError::ZeroSettleCycles);
        }
        let mut origin = Url::parse(&self.origin).map_err(|source| ConfigError::InvalidOrigin {
            origin: self.origin.clone(),
            source,
        })?;
        if origin.cannot_be_a_base() {
            return Err(ConfigError::OpaqueOrigin(self.origin.clone()));
        }
        // Relative locations join under the base path only with a trailing slash.
        if !origin.path().ends_with('/') {
            let path = format!("{}/", origin.path());
            origin.set_path(&path);
        }
        origin.set_query(None);
        origin.set_fragment(None);
        Ok(origin)
    }
}

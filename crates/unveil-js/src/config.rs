//! Sandbox configuration.

use std::time::Duration;

use boa_engine::Context;
use unveil_net::{DEFAULT_USER_AGENT, HandleOptions};

/// Settings for a [`crate::Sandbox`].
///
/// Defaults mirror a desktop Firefox on Linux with no request timeout and no
/// engine limits. Hosts running untrusted scripts should at least set a
/// timeout and a loop limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// User-Agent header, also exposed as `navigator.userAgent`.
    pub user_agent: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// TCP keep-alive on every connection.
    pub keep_alive: bool,
    /// Maximum iterations of a single loop before the engine throws.
    pub loop_iteration_limit: Option<u64>,
    /// Maximum call-stack depth before the engine throws.
    pub recursion_limit: Option<usize>,
    /// `window.outerWidth`.
    pub outer_width: u32,
    /// `window.outerHeight`.
    pub outer_height: u32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
            keep_alive: true,
            loop_iteration_limit: None,
            recursion_limit: None,
            outer_width: 1920,
            outer_height: 1013,
        }
    }
}

impl SandboxConfig {
    /// Set the User-Agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enable or disable TCP keep-alive.
    #[must_use]
    pub const fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Cap the iterations of any single loop.
    #[must_use]
    pub const fn with_loop_iteration_limit(mut self, limit: u64) -> Self {
        self.loop_iteration_limit = Some(limit);
        self
    }

    /// Cap the call-stack depth.
    #[must_use]
    pub const fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = Some(limit);
        self
    }

    /// Options for every connection the sandbox opens.
    #[must_use]
    pub fn handle_options(&self) -> HandleOptions {
        HandleOptions {
            user_agent: self.user_agent.clone(),
            keep_alive: self.keep_alive,
            timeout: self.timeout,
        }
    }

    /// Apply the engine limits to `context`.
    pub(crate) fn apply_limits(&self, context: &mut Context) {
        if let Some(limit) = self.loop_iteration_limit {
            context.runtime_limits_mut().set_loop_iteration_limit(limit);
        }
        if let Some(limit) = self.recursion_limit {
            context.runtime_limits_mut().set_recursion_limit(limit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_handle_options() {
        let options = SandboxConfig::default().handle_options();
        assert_eq!(options, HandleOptions::default());
    }

    #[test]
    fn test_builders() {
        let config = SandboxConfig::default()
            .with_user_agent("probe/1.0")
            .with_timeout(Duration::from_secs(5))
            .with_keep_alive(false)
            .with_loop_iteration_limit(10)
            .with_recursion_limit(64);
        let options = config.handle_options();
        assert_eq!(options.user_agent, "probe/1.0");
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
        assert!(!options.keep_alive);
        assert_eq!(config.loop_iteration_limit, Some(10));
        assert_eq!(config.recursion_limit, Some(64));
    }
}

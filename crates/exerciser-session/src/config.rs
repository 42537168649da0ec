//! Lifecycle manager configuration.

/// Lifecycle manager configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Log the description of every outbound and inbound envelope.
    pub trace_messages: bool,

    /// Reject inbound envelopes stamped with a different protocol version.
    pub enforce_protocol_version: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            trace_messages: false,
            enforce_protocol_version: true,
        }
    }
}

impl SessionConfig {
    /// Builder: log envelope descriptions.
    pub fn with_trace_messages(mut self, trace: bool) -> Self {
        self.trace_messages = trace;
        self
    }

    /// Builder: accept or reject envelopes from other protocol versions.
    pub fn with_enforce_protocol_version(mut self, enforce: bool) -> Self {
        self.enforce_protocol_version = enforce;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SessionConfig::default();
        assert!(!config.trace_messages);
        assert!(config.enforce_protocol_version);
    }

    #[test]
    fn custom_config() {
        let config = SessionConfig::default()
            .with_trace_messages(true)
            .with_enforce_protocol_version(false);

        assert!(config.trace_messages);
        assert!(!config.enforce_protocol_version);
    }
}

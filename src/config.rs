//! Host configuration

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How the dispatcher reacts to a producer breaking the wire contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationPolicy {
    /// Fail the frame with the violation; halts the render loop
    Strict,
    /// Clamp counts to capacity and skip offending commands
    Lenient,
}

impl Default for ViolationPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            ViolationPolicy::Strict
        } else {
            ViolationPolicy::Lenient
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Locator of the producer module
    pub module: String,
    /// Locator of the drawing surface
    pub canvas: String,
    pub policy: ViolationPolicy,
    /// Stroke width for line commands
    pub line_width: f32,
    pub font_family: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            module: "app.wasm".to_string(),
            canvas: "canvas".to_string(),
            policy: ViolationPolicy::default(),
            line_width: 1.0,
            font_family: "sans-serif".to_string(),
        }
    }
}

impl HostConfig {
    /// Parse from JSON; absent keys take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_policy(mut self, policy: ViolationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// CSS font shorthand for a text command of `size` pixels
    pub fn font(&self, size: i32) -> String {
        format!("{}px {}", size, self.font_family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.module, "app.wasm");
        assert_eq!(config.canvas, "canvas");
        assert_eq!(config.line_width, 1.0);
        assert_eq!(config.font(32), "32px sans-serif");
    }

    #[test]
    fn test_partial_json() {
        let config = HostConfig::from_json(r#"{"module": "game.wasm", "policy": "lenient"}"#).unwrap();
        assert_eq!(config.module, "game.wasm");
        assert_eq!(config.policy, ViolationPolicy::Lenient);
        assert_eq!(config.font_family, "sans-serif");
    }

    #[test]
    fn test_invalid_json() {
        let err = HostConfig::from_json(r#"{"policy": "sometimes"}"#).unwrap_err();
        assert!(matches!(err, HostError::Config(_)));
    }
}

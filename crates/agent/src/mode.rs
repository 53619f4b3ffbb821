//! Agent mode: which prompt fragments and which gating policy apply.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// Targeted changes to an existing design.
    #[default]
    Edits,
    /// A complete screen in one pass.
    Fast,
}

impl AgentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentMode::Edits => "edits",
            AgentMode::Fast => "fast",
        }
    }

    /// Step bound used when configuration does not override it.
    pub fn default_max_steps(&self) -> usize {
        match self {
            AgentMode::Edits => 3,
            AgentMode::Fast => 6,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "edits" => Some(AgentMode::Edits),
            "fast" => Some(AgentMode::Fast),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_edits() {
        assert_eq!(AgentMode::default(), AgentMode::Edits);
        assert_eq!(AgentMode::Edits.default_max_steps(), 3);
        assert_eq!(AgentMode::Fast.default_max_steps(), 6);
    }

    #[test]
    fn closed_set() {
        assert_eq!(AgentMode::parse("fast"), Some(AgentMode::Fast));
        assert_eq!(AgentMode::parse("Fast"), None);
        assert!(serde_json::from_str::<AgentMode>("\"turbo\"").is_err());
    }
}

//! System prompt assembly.
//!
//! The prompt is plain concatenation: the core protocol text, then the
//! fragment block for the mode, then the caller's canvas context if any.
//! Fast-mode fragments build on each other, so their order is fixed.

use crate::mode::AgentMode;

pub const CORE: &str = include_str!("../prompts/core.md");
pub const EDITS: &str = include_str!("../prompts/edits.md");

/// Fast-mode sub-fragments, in prompt order.
pub const FAST_FRAGMENTS: [(&str, &str); 9] = [
    ("devices", include_str!("../prompts/fast_devices.md")),
    (
        "reference_images",
        include_str!("../prompts/fast_reference_images.md"),
    ),
    ("layout", include_str!("../prompts/fast_layout.md")),
    ("typography", include_str!("../prompts/fast_typography.md")),
    ("color", include_str!("../prompts/fast_color.md")),
    ("materiality", include_str!("../prompts/fast_materiality.md")),
    ("form", include_str!("../prompts/fast_form.md")),
    ("anti_patterns", include_str!("../prompts/fast_anti_patterns.md")),
    ("preflight", include_str!("../prompts/fast_preflight.md")),
];

pub const CANVAS_CONTEXT_HEADING: &str = "## Current Canvas Context";

/// The fragment block for a mode.
pub fn mode_block(mode: AgentMode) -> String {
    match mode {
        AgentMode::Edits => EDITS.trim_end().to_string(),
        AgentMode::Fast => FAST_FRAGMENTS
            .iter()
            .map(|(_, text)| text.trim_end())
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

/// Build the base system prompt for a request.
pub fn build_system_prompt(mode: AgentMode, canvas_context: Option<&str>) -> String {
    let mut prompt = String::with_capacity(CORE.len() + 8 * 1024);
    prompt.push_str(CORE.trim_end());
    prompt.push_str("\n\n");
    prompt.push_str(&mode_block(mode));

    if let Some(context) = canvas_context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str("\n\n");
        prompt.push_str(CANVAS_CONTEXT_HEADING);
        prompt.push_str("\n\n");
        prompt.push_str(context);
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_comes_first() {
        for mode in [AgentMode::Edits, AgentMode::Fast] {
            let prompt = build_system_prompt(mode, None);
            assert!(prompt.starts_with(CORE.trim_end()));
        }
    }

    #[test]
    fn edits_block_only_in_edits_mode() {
        let edits = build_system_prompt(AgentMode::Edits, None);
        let fast = build_system_prompt(AgentMode::Fast, None);
        assert!(edits.contains("## Mode: edits"));
        assert!(!edits.contains("## Mode: fast"));
        assert!(fast.contains("## Mode: fast"));
        assert!(!fast.contains("## Mode: edits"));
    }

    #[test]
    fn fast_fragments_keep_their_order() {
        let prompt = build_system_prompt(AgentMode::Fast, None);
        let mut last = 0;
        for (name, text) in FAST_FRAGMENTS {
            let at = prompt
                .find(text.trim_end())
                .unwrap_or_else(|| panic!("fragment {name} missing"));
            assert!(at >= last, "fragment {name} out of order");
            last = at;
        }
        assert!(prompt.trim_end().ends_with(FAST_FRAGMENTS[8].1.trim_end()));
    }

    #[test]
    fn canvas_context_is_appended_verbatim() {
        let context = "Selection: frame \"Hero\" (id n12)\n  width 1440";
        let prompt = build_system_prompt(AgentMode::Edits, Some(context));
        let tail = format!("{CANVAS_CONTEXT_HEADING}\n\n{context}");
        assert!(prompt.ends_with(&tail));
    }

    #[test]
    fn blank_context_is_omitted() {
        let prompt = build_system_prompt(AgentMode::Edits, Some("  \n"));
        assert!(!prompt.contains(CANVAS_CONTEXT_HEADING));
        assert_eq!(prompt, build_system_prompt(AgentMode::Edits, None));
    }

    #[test]
    fn assembly_is_deterministic() {
        assert_eq!(
            build_system_prompt(AgentMode::Fast, Some("ctx")),
            build_system_prompt(AgentMode::Fast, Some("ctx"))
        );
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tag → required-tool rules for the Ops archetype classifier.
//!
//! The mapping is configuration-driven: operators extend the defaults with
//! a TOML file instead of code changes.

use serde::Deserialize;
use std::collections::BTreeSet;

/// One rule: WOs carrying `tag` need an actor allowed to use `requires_tool`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagRule {
    pub tag: String,
    pub requires_tool: String,
}

/// The rule set consulted for `agent_mismatch` classification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagRules {
    #[serde(rename = "rule", default)]
    rules: Vec<TagRule>,
}

impl TagRules {
    /// Built-in rules covering the tags the runtime itself attaches.
    pub fn defaults() -> Self {
        let rules = [
            ("local-filesystem", "read_file"),
            ("portal-frontend", "github_read_file"),
            ("edge-function", "deploy_edge_function"),
            ("deploy", "deploy_edge_function"),
            ("deployment", "deploy_edge_function"),
            ("schema", "apply_migration"),
            ("migration", "apply_migration"),
        ]
        .into_iter()
        .map(|(tag, tool)| TagRule { tag: tag.into(), requires_tool: tool.into() })
        .collect();
        Self { rules }
    }

    /// Parse rules from TOML (`[[rule]] tag = "…" requires_tool = "…"`),
    /// appended to the defaults.
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        let parsed: TagRules = toml::from_str(input)?;
        let mut merged = Self::defaults();
        merged.rules.extend(parsed.rules);
        Ok(merged)
    }

    /// Tools implied by `tags` that `tools_allowed` lacks.
    pub fn missing_tools(
        &self,
        tags: &BTreeSet<String>,
        tools_allowed: &[String],
    ) -> Vec<&TagRule> {
        self.rules
            .iter()
            .filter(|rule| tags.contains(&rule.tag))
            .filter(|rule| !tools_allowed.iter().any(|t| *t == rule.requires_tool))
            .collect()
    }
}

impl Default for TagRules {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_tools_flags_uncovered_tags() {
        let rules = TagRules::defaults();
        let missing =
            rules.missing_tools(&tags(&["local-filesystem"]), &["github_read_file".to_string()]);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].requires_tool, "read_file");
    }

    #[test]
    fn satisfied_rules_are_quiet() {
        let rules = TagRules::defaults();
        let missing =
            rules.missing_tools(&tags(&["local-filesystem"]), &["read_file".to_string()]);
        assert!(missing.is_empty());
    }

    #[test]
    fn unknown_tags_do_not_match() {
        let rules = TagRules::defaults();
        assert!(rules.missing_tools(&tags(&["checkout"]), &[]).is_empty());
    }

    #[test]
    fn toml_rules_extend_defaults() {
        let rules = TagRules::from_toml(
            r#"
[[rule]]
tag = "billing"
requires_tool = "read_table"
"#,
        )
        .unwrap();
        let missing = rules.missing_tools(&tags(&["billing"]), &[]);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].requires_tool, "read_table");
        // Defaults still present.
        assert!(!rules.missing_tools(&tags(&["schema"]), &[]).is_empty());
    }
}

//! Request and response types for the ruledeck service
//!
//! These are the messages exchanged with a UI over `ruledeck serve`: one JSON
//! object per line in each direction. Requests are tagged by `command`,
//! responses by `type`.

use serde::{Deserialize, Serialize};

pub use ruledeck_core::{
    AppliedRule, ApplyStrategy, CURRENT_USER, Rule, RuleApplicationConfig, RuleFilter, SortKey,
    SortOrder,
};

// ============================================================================
// Requests
// ============================================================================

/// A command from the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    /// Initial filter options plus the unfiltered rule list.
    LoadData,
    /// Rule list under new filter criteria.
    UpdateRules {
        #[serde(default)]
        filter: RuleFilter,
    },
    ApplyRule {
        rule_id: String,
        /// Defaults to the strategy implied by the rule's frontmatter.
        #[serde(default)]
        config: Option<RuleApplicationConfig>,
    },
    RemoveRule {
        rule_id: String,
    },
    /// Apply when unapplied, remove otherwise.
    ToggleRule {
        rule_id: String,
        #[serde(default)]
        config: Option<RuleApplicationConfig>,
    },
    PreviewRule {
        rule_id: String,
        #[serde(default)]
        max_lines: Option<usize>,
    },
    AddTag {
        rule_id: String,
        tag: String,
    },
    RemoveTag {
        rule_id: String,
        tag: String,
    },
    /// Set or clear title/description overrides. Absent fields are left
    /// alone; empty strings clear the override.
    EditMetadata {
        rule_id: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    /// Drop the discovery cache and reload everything.
    Refresh,
}

// ============================================================================
// Responses
// ============================================================================

/// A message to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Response {
    InitFilters {
        payload: FilterData,
    },
    UpdateRules {
        rules: Vec<RuleView>,
    },
    Applied {
        rule_id: String,
        applied: AppliedRule,
    },
    Removed {
        rule_id: String,
        /// Whether any projection was deleted.
        removed: bool,
    },
    Preview {
        rule_id: String,
        title: String,
        preview: String,
        content: String,
    },
    UpdateTagOptions {
        tags: Vec<String>,
    },
    Error {
        text: String,
    },
}

impl Response {
    pub fn error(text: impl Into<String>) -> Self {
        Self::Error { text: text.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Options for populating the filter controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterData {
    pub teams: Vec<String>,
    pub users: Vec<String>,
    pub tags: Vec<String>,
    /// Detected email of whoever runs the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user: Option<String>,
    /// Teams the current user belongs to.
    #[serde(default)]
    pub user_teams: Vec<String>,
    pub total_rules: usize,
}

/// A rule as listed in the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleView {
    #[serde(flatten)]
    pub rule: Rule,
    pub applied: bool,
    /// First lines of the content.
    pub preview: String,
    /// Excerpts around the search term, when searching.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_snippets: Vec<String>,
    /// Relevance, when searching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

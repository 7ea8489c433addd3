//! Selecting and ordering rules for display
//!
//! Everything here is pure: the rule set is borrowed, never mutated, and
//! applied state comes in as a predicate so the filesystem stays out of it.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::rule::Rule;
use crate::search::score_rule;

/// User filter value meaning "whoever is running ruledeck".
pub const CURRENT_USER: &str = "__me__";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Title,
    LastUpdated,
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(Self::Title),
            "lastUpdated" | "last-updated" | "updated" => Ok(Self::LastUpdated),
            other => Err(format!("unknown sort key `{other}` (expected title or lastUpdated)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort order `{other}` (expected asc or desc)")),
        }
    }
}

/// Criteria for one rule listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleFilter {
    /// Exact team name.
    pub team: Option<String>,
    /// Exact user email, or [`CURRENT_USER`].
    pub user: Option<String>,
    /// A rule passes if it has any of these. Empty passes everything.
    pub tags: Vec<String>,
    /// Case-insensitive substring.
    pub search: Option<String>,
    pub sort: SortKey,
    pub order: SortOrder,
}

impl RuleFilter {
    /// Replace the [`CURRENT_USER`] sentinel with `email`.
    ///
    /// Without an email the sentinel is kept, and matches no rule.
    pub fn resolve_current_user(mut self, email: Option<&str>) -> Self {
        if self.user.as_deref() == Some(CURRENT_USER)
            && let Some(email) = email
        {
            self.user = Some(email.to_string());
        }
        self
    }

    fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    /// Whether `rule` passes every criterion.
    pub fn matches(&self, rule: &Rule) -> bool {
        if let Some(team) = &self.team
            && rule.team.as_ref() != Some(team)
        {
            return false;
        }
        if let Some(user) = &self.user
            && rule.user.as_ref() != Some(user)
        {
            return false;
        }
        if !self.tags.is_empty() && !rule.tags().iter().any(|t| self.tags.contains(t)) {
            return false;
        }
        match self.search_term() {
            Some(term) => matches_search(rule, &term),
            None => true,
        }
    }
}

/// Case-insensitive substring test over title, description, frontmatter
/// description and content. `term` must already be lower-cased.
fn matches_search(rule: &Rule, term: &str) -> bool {
    [
        Some(rule.title.as_str()),
        rule.description.as_deref(),
        rule.metadata.description.as_deref(),
        Some(rule.content.as_str()),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(term))
}

fn compare_key(a: &Rule, b: &Rule, key: SortKey, order: SortOrder) -> Ordering {
    let ordering = match key {
        SortKey::Title => a
            .title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.title.cmp(&b.title)),
        SortKey::LastUpdated => a.last_updated_millis().cmp(&b.last_updated_millis()),
    };
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

/// Stable sort by `key`, with applied rules always first.
pub fn sort_rules(
    rules: &mut [&Rule],
    key: SortKey,
    order: SortOrder,
    is_applied: impl Fn(&Rule) -> bool,
) {
    rules.sort_by(|a, b| {
        (!is_applied(*a))
            .cmp(&!is_applied(*b))
            .then_with(|| compare_key(a, b, key, order))
    });
}

/// Rules passing `filter`, ordered for display.
///
/// Applied rules come first. With a search term the rest is ordered by
/// relevance, then by the requested sort key.
pub fn filter_and_sort<'a>(
    rules: &'a [Rule],
    filter: &RuleFilter,
    is_applied: impl Fn(&Rule) -> bool,
) -> Vec<&'a Rule> {
    let mut selected: Vec<(&Rule, bool, f64)> = rules
        .iter()
        .filter(|rule| filter.matches(rule))
        .map(|rule| {
            let score = filter
                .search_term()
                .map(|term| score_rule(rule, &term))
                .unwrap_or(0.0);
            (rule, is_applied(rule), score)
        })
        .collect();

    selected.sort_by(|(a, a_applied, a_score), (b, b_applied, b_score)| {
        b_applied
            .cmp(a_applied)
            .then_with(|| b_score.total_cmp(a_score))
            .then_with(|| compare_key(a, b, filter.sort, filter.order))
    });

    selected.into_iter().map(|(rule, _, _)| rule).collect()
}

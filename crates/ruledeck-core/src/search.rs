//! Fuzzy relevance scoring
//!
//! Each searchable field of a rule is scored against the term and weighted;
//! the rule's score is the best weighted field score.
//!
//! | match                | field score |
//! |----------------------|-------------|
//! | exact                | 1000        |
//! | prefix               | 800         |
//! | substring            | 600         |
//! | ordered subsequence  | 1..=599     |
//!
//! Subsequence matches start at 400, gain up to 50 for starting early and 10
//! per consecutive character, and lose 2 per character of gap.

use crate::rule::Rule;

const EXACT: f64 = 1000.0;
const PREFIX: f64 = 800.0;
const SUBSTRING: f64 = 600.0;
const SUBSEQUENCE_BASE: i64 = 400;
const EARLY_BONUS_WINDOW: i64 = 50;
const CONSECUTIVE_BONUS: i64 = 10;
const GAP_PENALTY: i64 = 2;

const TITLE_WEIGHT: f64 = 2.0;
const DESCRIPTION_WEIGHT: f64 = 1.0;
const CONTENT_WEIGHT: f64 = 0.5;
const OWNER_WEIGHT: f64 = 1.0;

/// A rule paired with its relevance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedRule<'a> {
    pub rule: &'a Rule,
    pub score: f64,
}

/// Score one piece of text against a lower-cased term.
fn score_text(text: &str, term: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let text = text.to_lowercase();
    if text == term {
        EXACT
    } else if text.starts_with(term) {
        PREFIX
    } else if text.contains(term) {
        SUBSTRING
    } else {
        subsequence_score(&text, term)
    }
}

fn subsequence_score(text: &str, term: &str) -> f64 {
    let needle: Vec<char> = term.chars().collect();
    let mut next = 0;
    let mut first = None;
    let mut last = 0i64;
    let mut consecutive = 0i64;

    for (i, c) in text.chars().enumerate() {
        if next == needle.len() {
            break;
        }
        if c != needle[next] {
            continue;
        }
        let i = i as i64;
        if first.is_none() {
            first = Some(i);
        } else if i == last + 1 {
            consecutive += 1;
        }
        last = i;
        next += 1;
    }

    let Some(first) = first else {
        return 0.0;
    };
    if next < needle.len() {
        return 0.0;
    }

    let span = last - first + 1;
    let gap = span - needle.len() as i64;
    let score = SUBSEQUENCE_BASE + (EARLY_BONUS_WINDOW - first).max(0)
        + CONSECUTIVE_BONUS * consecutive
        - GAP_PENALTY * gap;
    score.clamp(1, 599) as f64
}

/// Best weighted field score of `rule` for `term`; 0 means no match.
pub fn score_rule(rule: &Rule, term: &str) -> f64 {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return 0.0;
    }

    let fields: [(Option<&str>, f64); 7] = [
        (Some(rule.title.as_str()), TITLE_WEIGHT),
        (rule.description.as_deref(), DESCRIPTION_WEIGHT),
        (Some(rule.content.as_str()), CONTENT_WEIGHT),
        (rule.metadata.context.as_deref(), OWNER_WEIGHT),
        (rule.team.as_deref(), OWNER_WEIGHT),
        (rule.user.as_deref(), OWNER_WEIGHT),
        (rule.metadata.description.as_deref(), DESCRIPTION_WEIGHT),
    ];

    fields
        .into_iter()
        .filter_map(|(text, weight)| text.map(|t| score_text(t, &term) * weight))
        .fold(0.0, f64::max)
}

/// Rules with a non-zero score for `term`, best first.
///
/// Ties keep their input order.
pub fn rank_rules<'a>(rules: &'a [Rule], term: &str) -> Vec<RankedRule<'a>> {
    let mut ranked: Vec<RankedRule<'a>> = rules
        .iter()
        .map(|rule| RankedRule {
            rule,
            score: score_rule(rule, term),
        })
        .filter(|ranked| ranked.score > 0.0)
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::RuleMetadata;
    use std::path::PathBuf;

    fn rule(id: &str, title: &str, content: &str) -> Rule {
        Rule {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            content: content.to_string(),
            metadata: RuleMetadata::default(),
            tags: None,
            file_path: PathBuf::from(format!("/r/{id}.mdc")),
            last_updated: None,
            team: None,
            user: None,
        }
    }

    #[test]
    fn match_tiers() {
        assert_eq!(score_text("Logging", "logging"), EXACT);
        assert_eq!(score_text("Logging rules", "logging"), PREFIX);
        assert_eq!(score_text("Structured logging", "logging"), SUBSTRING);
        let fuzzy = score_text("large object graphs", "log");
        assert!(fuzzy > 0.0 && fuzzy < SUBSTRING, "got {fuzzy}");
        assert_eq!(score_text("abc", "xyz"), 0.0);
        assert_eq!(score_text("", "x"), 0.0);
    }

    #[test]
    fn tight_subsequences_beat_loose_ones() {
        let tight = subsequence_score("rust-lint", "rlint");
        let loose = subsequence_score("r.................l.i.n.t", "rlint");
        assert!(tight > loose);
    }

    #[test]
    fn early_matches_beat_late_ones() {
        let early = subsequence_score("a-b-c", "abc");
        let late = subsequence_score(&format!("{}a-b-c", " ".repeat(40)), "abc");
        assert!(early > late);
    }

    #[test]
    fn title_outweighs_content() {
        let in_title = rule("a", "Async", "nothing relevant");
        let in_content = rule("b", "Other", "async");
        assert!(score_rule(&in_title, "async") > score_rule(&in_content, "async"));
    }

    #[test]
    fn owner_and_context_are_searchable() {
        let mut r = rule("a", "Title", "body");
        r.team = Some("Platform".into());
        assert_eq!(score_rule(&r, "platform"), EXACT);

        let mut r = rule("b", "Title", "body");
        r.metadata.context = Some("frontend".into());
        assert!(score_rule(&r, "front") > 0.0);
    }

    #[test]
    fn empty_term_scores_zero() {
        assert_eq!(score_rule(&rule("a", "Title", "body"), "  "), 0.0);
    }

    #[test]
    fn ranking_drops_misses_and_orders_by_score() {
        let rules = vec![
            rule("content", "Zzz", "mentions tokio somewhere"),
            rule("miss", "Qqq", "nothing"),
            rule("exact", "Tokio", "runtime"),
            rule("prefix", "Tokio tasks", "spawn"),
        ];
        let ranked = rank_rules(&rules, "tokio");
        let ids: Vec<_> = ranked.iter().map(|r| r.rule.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "prefix", "content"]);
    }
}

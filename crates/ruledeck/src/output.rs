//! Output formatting for the CLI

use eyre::Result;
use owo_colors::OwoColorize;
use ruledeck_api::{AppliedRule, FilterData, RuleView};
use ruledeck_core::Rule;
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Render a rule listing
pub fn render_rules(rules: &[RuleView], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_rules_text(rules)),
        OutputFormat::Json => render_json(rules),
    }
}

fn owner_label(rule: &Rule) -> String {
    match (&rule.team, &rule.user) {
        (Some(team), _) => format!("team {team}"),
        (None, Some(user)) => format!("user {user}"),
        (None, None) => "shared".to_string(),
    }
}

fn render_rules_text(rules: &[RuleView]) -> String {
    if rules.is_empty() {
        return format!("{}\n", "No rules found".dimmed());
    }

    let mut output = String::new();
    for view in rules {
        let rule = &view.rule;
        let marker = if view.applied {
            "*".green().bold().to_string()
        } else {
            " ".to_string()
        };
        output.push_str(&format!(
            "{} {} {}\n",
            marker,
            rule.id.cyan().bold(),
            rule.title
        ));

        let mut details = vec![owner_label(rule)];
        if !rule.tags().is_empty() {
            details.push(format!("tags: {}", rule.tags().join(", ")));
        }
        if let Some(score) = view.score {
            details.push(format!("score: {score:.0}"));
        }
        output.push_str(&format!("    {}\n", details.join("  ").dimmed()));

        if let Some(description) = &rule.description {
            output.push_str(&format!("    {description}\n"));
        }
        for snippet in &view.content_snippets {
            output.push_str(&format!("    {} {}\n", ">".dimmed(), snippet));
        }
    }

    let applied = rules.iter().filter(|v| v.applied).count();
    output.push_str(&format!(
        "\n{} rules, {} applied\n",
        rules.len().to_string().bold(),
        applied.to_string().green()
    ));
    output
}

/// Render one rule with its first `max_lines` lines, or all of it.
pub fn render_rule(
    rule: &Rule,
    applied: bool,
    max_lines: Option<usize>,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => render_json(rule),
        OutputFormat::Text => {
            let mut output = String::new();
            output.push_str(&format!(
                "{} {}\n",
                "##".bold(),
                rule.title.cyan().bold()
            ));
            output.push_str(&format!("id:      {}\n", rule.id));
            output.push_str(&format!("owner:   {}\n", owner_label(rule)));
            output.push_str(&format!("file:    {}\n", rule.file_path.display()));
            if let Some(updated) = &rule.last_updated {
                output.push_str(&format!("updated: {updated}\n"));
            }
            if !rule.tags().is_empty() {
                output.push_str(&format!("tags:    {}\n", rule.tags().join(", ")));
            }
            let state = if applied {
                "applied".green().to_string()
            } else {
                "not applied".dimmed().to_string()
            };
            output.push_str(&format!("status:  {state}\n"));
            if let Some(description) = &rule.description {
                output.push_str(&format!("\n{description}\n"));
            }

            output.push('\n');
            let body = match max_lines {
                Some(n) => ruledeck_core::get_rule_preview(&rule.content, n),
                None => rule.content.clone(),
            };
            output.push_str(&body);
            output.push('\n');
            Ok(output)
        }
    }
}

/// Render the result of applying a rule
pub fn render_applied(applied: &AppliedRule, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => render_json(applied),
        OutputFormat::Text => Ok(format!(
            "{} Applied {} as {} ({})\n",
            "OK".green().bold(),
            applied
                .original_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| applied.id.clone())
                .cyan(),
            applied.applied_path.display(),
            applied.config.apply_strategy
        )),
    }
}

/// Render the outcome of removing a rule
pub fn render_removed(rule_id: &str, removed: bool, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => render_json(&serde_json::json!({
            "ruleId": rule_id,
            "removed": removed,
        })),
        OutputFormat::Text if removed => Ok(format!(
            "{} Removed {}\n",
            "OK".green().bold(),
            rule_id.cyan()
        )),
        OutputFormat::Text => Ok(format!(
            "{} {} was not applied\n",
            "!".yellow().bold(),
            rule_id.cyan()
        )),
    }
}

/// Render the list of projections in the applied directory
pub fn render_applied_list(applied: &[AppliedRule], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => render_json(applied),
        OutputFormat::Text => {
            if applied.is_empty() {
                return Ok(format!("{}\n", "No rules applied".dimmed()));
            }
            let mut output = String::new();
            for rule in applied {
                output.push_str(&format!(
                    "{} {} {}\n",
                    rule.id.cyan().bold(),
                    rule.config.apply_strategy.to_string().dimmed(),
                    rule.applied_at.dimmed()
                ));
            }
            Ok(output)
        }
    }
}

/// Render a tag list
pub fn render_tags(tags: &[String], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => render_json(tags),
        OutputFormat::Text if tags.is_empty() => Ok(format!("{}\n", "No tags".dimmed())),
        OutputFormat::Text => Ok(format!("{}\n", tags.join(", "))),
    }
}

/// Render filter options
pub fn render_filter_data(data: &FilterData, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => render_json(data),
        OutputFormat::Text => {
            let mut output = String::new();
            output.push_str(&format!(
                "Rules: {}\n",
                data.total_rules.to_string().bold()
            ));
            output.push_str(&format!("Teams: {}\n", data.teams.join(", ")));
            output.push_str(&format!("Users: {}\n", data.users.join(", ")));
            output.push_str(&format!("Tags:  {}\n", data.tags.join(", ")));
            if let Some(user) = &data.current_user {
                output.push_str(&format!("You:   {}\n", user.cyan()));
            }
            if !data.user_teams.is_empty() {
                output.push_str(&format!("Your teams: {}\n", data.user_teams.join(", ")));
            }
            Ok(output)
        }
    }
}

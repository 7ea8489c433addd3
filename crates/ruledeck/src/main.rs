//! ruledeck - Discover, filter and apply shared editor rules
//!
//! Rules live in a registry directory inside the workspace, grouped by team
//! and user. `ruledeck` lists and searches them, copies chosen rules into the
//! editor's rule directory, and keeps tags and title overrides in a metadata
//! file next to the registry.

use clap::{Parser, Subcommand};
use eyre::{Result, bail, eyre};
use owo_colors::OwoColorize;
use ruledeck::output::{
    OutputFormat, render_applied, render_applied_list, render_filter_data, render_removed,
    render_rule, render_rules, render_tags,
};
use ruledeck::serve::serve_stdio;
use ruledeck::service::RuleService;
use ruledeck::{Workspace, find_workspace_root};
use ruledeck_api::{Request, Response};
use ruledeck_core::{
    ApplyStrategy, CURRENT_USER, DEFAULT_PREVIEW_LINES, RuleApplicationConfig, RuleFilter,
    SortKey, SortOrder,
};
use std::path::PathBuf;
use tracing::debug;

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "ruledeck", version)]
#[command(about = "Discover, filter and apply shared editor rules")]
struct Args {
    /// Subcommand to run
    #[command(subcommand)]
    command: Command,

    /// Workspace root (default: nearest directory with a registry or .git)
    #[arg(short, long, global = true, value_name = "DIR")]
    workspace: Option<PathBuf>,

    /// Path to config file (default: .config/ruledeck/config.yaml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format: text, json
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Pull the registry with git before reading it
    #[arg(long, global = true)]
    pull: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Subcommands
#[derive(Subcommand, Debug)]
enum Command {
    /// List rules, applied ones first
    List {
        /// Only rules of this team
        #[arg(long)]
        team: Option<String>,

        /// Only rules of this user
        #[arg(long, conflicts_with = "mine")]
        user: Option<String>,

        /// Only your own rules
        #[arg(long)]
        mine: bool,

        /// Only rules carrying any of these tags
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Case-insensitive text to look for
        #[arg(long)]
        search: Option<String>,

        /// Sort key: title, lastUpdated
        #[arg(long)]
        sort: Option<String>,

        /// Sort order: asc, desc
        #[arg(long)]
        order: Option<String>,
    },

    /// Show one rule
    Show {
        id: String,

        /// Only the first N lines of the content
        #[arg(short = 'n', long)]
        lines: Option<usize>,
    },

    /// Search rules, best matches first
    Search {
        term: String,

        /// Maximum number of results
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Copy a rule into the applied directory
    Apply {
        id: String,

        /// Apply strategy: always, auto, manual (default: from the rule)
        #[arg(long)]
        strategy: Option<String>,

        /// Globs for auto-attached rules
        #[arg(long = "glob")]
        globs: Vec<String>,
    },

    /// Delete every applied copy of a rule
    Remove { id: String },

    /// Manage rule tags
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },

    /// Override a rule's title or description; an empty value clears it
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// List applied rules
    Applied,

    /// Show teams, users, tags and the detected user
    Info,

    /// Create the registry skeleton
    Init,

    /// Serve JSON line requests on stdin/stdout
    Serve,
}

#[derive(Subcommand, Debug)]
enum TagAction {
    /// Add a tag to a rule
    Add { id: String, tag: String },
    /// Remove a tag from a rule
    Remove { id: String, tag: String },
    /// List all tags in use
    List,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_tracing(args.verbose, matches!(args.command, Command::Serve));

    let format = match args.format.as_deref() {
        Some(f) => OutputFormat::from_str(f)
            .ok_or_else(|| eyre!("Unknown output format {f:?}, expected text or json"))?,
        None => OutputFormat::default(),
    };

    let root = match args.workspace {
        Some(dir) => dir,
        None => find_workspace_root(&std::env::current_dir()?),
    };
    let workspace = Workspace::open(root, args.config.as_deref())?;
    debug!("Using workspace {}", workspace.root().display());

    let service =
        RuleService::for_workspace(&workspace)?.with_pull(args.pull || workspace.config().git_pull);
    service.sync_registry().await;

    match args.command {
        Command::List {
            team,
            user,
            mine,
            tags,
            search,
            sort,
            order,
        } => {
            let filter = RuleFilter {
                team,
                user: if mine {
                    Some(CURRENT_USER.to_string())
                } else {
                    user
                },
                tags,
                search,
                sort: parse_or_default::<SortKey>(sort.as_deref())?,
                order: parse_or_default::<SortOrder>(order.as_deref())?,
            };
            let rules = service.list_rules(&filter).await?;
            print!("{}", render_rules(&rules, format)?);
        }
        Command::Show { id, lines } => {
            let rule = service.discovery().require_rule(&id).await?;
            let applied = service.apply_manager().is_rule_applied(&id).await;
            print!("{}", render_rule(&rule, applied, lines, format)?);
        }
        Command::Search { term, limit } => {
            let filter = RuleFilter {
                search: Some(term),
                ..RuleFilter::default()
            };
            let mut rules = service.list_rules(&filter).await?;
            if let Some(limit) = limit {
                rules.truncate(limit);
            }
            print!("{}", render_rules(&rules, format)?);
        }
        Command::Apply {
            id,
            strategy,
            globs,
        } => {
            let config = application_config(strategy.as_deref(), globs)?;
            for response in request(&service, Request::ApplyRule { rule_id: id, config }).await? {
                if let Response::Applied { applied, .. } = response {
                    print!("{}", render_applied(&applied, format)?);
                }
            }
        }
        Command::Remove { id } => {
            for response in request(&service, Request::RemoveRule { rule_id: id }).await? {
                if let Response::Removed { rule_id, removed } = response {
                    print!("{}", render_removed(&rule_id, removed, format)?);
                }
            }
        }
        Command::Tag { action } => {
            let req = match action {
                TagAction::Add { id, tag } => Request::AddTag { rule_id: id, tag },
                TagAction::Remove { id, tag } => Request::RemoveTag { rule_id: id, tag },
                TagAction::List => {
                    let tags = service.discovery().available_tags().await?;
                    print!("{}", render_tags(&tags, format)?);
                    return Ok(());
                }
            };
            for response in request(&service, req).await? {
                if let Response::UpdateTagOptions { tags } = response {
                    print!("{}", render_tags(&tags, format)?);
                }
            }
        }
        Command::Edit {
            id,
            title,
            description,
        } => {
            if title.is_none() && description.is_none() {
                bail!("Nothing to edit, pass --title and/or --description");
            }
            request(
                &service,
                Request::EditMetadata {
                    rule_id: id.clone(),
                    title,
                    description,
                },
            )
            .await?;
            let rule = service.discovery().require_rule(&id).await?;
            let applied = service.apply_manager().is_rule_applied(&id).await;
            print!("{}", render_rule(&rule, applied, Some(DEFAULT_PREVIEW_LINES), format)?);
        }
        Command::Applied => {
            let applied = service.apply_manager().applied_rules().await?;
            print!("{}", render_applied_list(&applied, format)?);
        }
        Command::Info => {
            let data = service.filter_data().await?;
            print!("{}", render_filter_data(&data, format)?);
        }
        Command::Init => {
            // The service already created anything missing.
            println!(
                "{} Registry ready at {}",
                "OK".green().bold(),
                workspace.registry_dir().display()
            );
        }
        Command::Serve => serve_stdio(&service).await?,
    }

    Ok(())
}

/// Send one request, turning an error response into an error.
async fn request(service: &RuleService, request: Request) -> Result<Vec<Response>> {
    let responses = service.handle(request).await;
    if let Some(Response::Error { text }) = responses.iter().find(|r| r.is_error()) {
        bail!("{text}");
    }
    Ok(responses)
}

fn parse_or_default<T>(value: Option<&str>) -> Result<T>
where
    T: std::str::FromStr<Err = String> + Default,
{
    match value {
        Some(value) => value.parse().map_err(|e: String| eyre!(e)),
        None => Ok(T::default()),
    }
}

fn application_config(
    strategy: Option<&str>,
    globs: Vec<String>,
) -> Result<Option<RuleApplicationConfig>> {
    let apply_strategy = match strategy.map(str::to_lowercase).as_deref() {
        Some("always") => ApplyStrategy::Always,
        Some("auto" | "auto-attached" | "auto attached") => ApplyStrategy::AutoAttached,
        Some("manual") => ApplyStrategy::Manual,
        Some(other) => bail!("Unknown strategy {other:?}, expected always, auto or manual"),
        None if globs.is_empty() => return Ok(None),
        None => ApplyStrategy::AutoAttached,
    };
    Ok(Some(RuleApplicationConfig {
        apply_strategy,
        globs: (!globs.is_empty()).then_some(globs),
    }))
}

fn setup_tracing(verbose: bool, serving: bool) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_env("RULEDECK_LOG").unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("ruledeck=debug,ruledeck_core=debug,info")
        } else if serving {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

//! Request handling on top of discovery and the apply manager
//!
//! [`RuleService`] is what both the CLI and `ruledeck serve` talk to. Every
//! [`Request`] maps to one or more [`Response`]s; failures become
//! [`Response::Error`] and never end the session.

use eyre::Result;
use ruledeck_api::{FilterData, Request, Response, RuleView};
use ruledeck_core::{
    DEFAULT_PREVIEW_LINES, MetadataStore, Rule, RuleFilter, create_registry_structure,
    filter_and_sort, get_content_snippets, get_rule_preview, score_rule,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info, warn};

use crate::Workspace;
use crate::apply::{ApplyManager, Toggled};
use crate::discovery::{DiscoveryCache, DiscoveryService};
use crate::git::{GitIdentity, UserIdentity, pull_registry};
use crate::teams::{ConfigTeamDirectory, TeamDirectory};

/// Snippets shown per rule when searching.
const MAX_SNIPPETS: usize = 3;

pub struct RuleService {
    discovery: Arc<DiscoveryService>,
    apply: ApplyManager,
    identity: Arc<dyn UserIdentity>,
    teams: Arc<dyn TeamDirectory>,
    last_filter: Mutex<RuleFilter>,
    email: OnceCell<Option<String>>,
    pull: bool,
}

impl RuleService {
    /// Service for `workspace` using git for identity and the config for
    /// team membership. Creates the registry skeleton if needed.
    pub fn for_workspace(workspace: &Workspace) -> Result<Self> {
        let config = workspace.config();
        let identity = GitIdentity::new(workspace.root(), config.user_email.clone());
        let teams = ConfigTeamDirectory::new(config.teams.clone());
        let service = Self::new(workspace, Arc::new(identity), Arc::new(teams))?;
        Ok(service.with_pull(config.git_pull))
    }

    pub fn new(
        workspace: &Workspace,
        identity: Arc<dyn UserIdentity>,
        teams: Arc<dyn TeamDirectory>,
    ) -> Result<Self> {
        let registry_dir = workspace.registry_dir();
        create_registry_structure(&registry_dir)?;

        let discovery = Arc::new(DiscoveryService::new(
            workspace.root().to_path_buf(),
            registry_dir,
            DiscoveryCache::new(),
        ));
        let apply = ApplyManager::new(Arc::clone(&discovery), workspace.applied_dir());

        Ok(Self {
            discovery,
            apply,
            identity,
            teams,
            last_filter: Mutex::new(RuleFilter::default()),
            email: OnceCell::new(),
            pull: false,
        })
    }

    /// Pull the registry with git on startup and on every refresh.
    pub fn with_pull(mut self, pull: bool) -> Self {
        self.pull = pull;
        self
    }

    pub fn discovery(&self) -> &DiscoveryService {
        &self.discovery
    }

    pub fn apply_manager(&self) -> &ApplyManager {
        &self.apply
    }

    pub fn metadata_store(&self) -> MetadataStore {
        self.discovery.metadata_store()
    }

    /// The current user's email, looked up once.
    pub async fn user_email(&self) -> Option<String> {
        self.email
            .get_or_init(|| self.identity.user_email())
            .await
            .clone()
    }

    /// Pull the registry when pulling is enabled. Failures are logged.
    pub async fn sync_registry(&self) {
        if !self.pull {
            return;
        }
        let root = self.discovery.registry().root();
        match pull_registry(root).await {
            Ok(true) => info!("Pulled registry at {}", root.display()),
            Ok(false) => debug!("Registry is not a git checkout, skipping pull"),
            Err(e) => warn!("Registry pull failed: {e:#}"),
        }
    }

    pub async fn filter_data(&self) -> Result<FilterData> {
        let result = self.discovery.discover_all_rules(false).await?;
        let tags = self.discovery.available_tags().await?;
        let current_user = self.user_email().await;
        let user_teams = current_user
            .as_deref()
            .map(|email| self.teams.team_memberships(email).user_teams)
            .unwrap_or_default();

        Ok(FilterData {
            teams: result.teams.clone(),
            users: result.users.clone(),
            tags,
            current_user,
            user_teams,
            total_rules: result.all_rules.len(),
        })
    }

    /// Rules passing `filter`, ready for display.
    pub async fn list_rules(&self, filter: &RuleFilter) -> Result<Vec<RuleView>> {
        let email = self.user_email().await;
        let filter = filter.clone().resolve_current_user(email.as_deref());

        let result = self.discovery.discover_all_rules(false).await?;
        let listing = self.apply.applied_listing().await;
        let applied: HashSet<&str> = result
            .all_rules
            .iter()
            .filter(|rule| ApplyManager::is_applied_in(rule, &listing))
            .map(|rule| rule.id.as_str())
            .collect();

        let term = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty());

        let views = filter_and_sort(&result.all_rules, &filter, |rule| {
            applied.contains(rule.id.as_str())
        })
        .into_iter()
        .map(|rule| RuleView {
            rule: rule.clone(),
            applied: applied.contains(rule.id.as_str()),
            preview: get_rule_preview(&rule.content, DEFAULT_PREVIEW_LINES),
            content_snippets: term
                .map(|term| get_content_snippets(&rule.content, term, MAX_SNIPPETS))
                .unwrap_or_default(),
            score: term.map(|term| score_rule(rule, term)),
        })
        .collect();
        Ok(views)
    }

    /// Handle one request. Errors are reported as a single
    /// [`Response::Error`].
    pub async fn handle(&self, request: Request) -> Vec<Response> {
        match self.try_handle(request).await {
            Ok(responses) => responses,
            Err(e) => {
                error!("{e:#}");
                vec![Response::error(format!("{e:#}"))]
            }
        }
    }

    async fn try_handle(&self, request: Request) -> Result<Vec<Response>> {
        match request {
            Request::LoadData => Ok(vec![
                Response::InitFilters {
                    payload: self.filter_data().await?,
                },
                self.rules_response().await?,
            ]),
            Request::UpdateRules { filter } => {
                *self.last_filter.lock().await = filter;
                Ok(vec![self.rules_response().await?])
            }
            Request::ApplyRule { rule_id, config } => {
                let applied = self.apply.apply_rule_by_id(&rule_id, config).await?;
                Ok(vec![
                    Response::Applied { rule_id, applied },
                    self.rules_response().await?,
                ])
            }
            Request::RemoveRule { rule_id } => {
                let removed = self.apply.remove_applied_rule(&rule_id).await?;
                Ok(vec![
                    Response::Removed { rule_id, removed },
                    self.rules_response().await?,
                ])
            }
            Request::ToggleRule { rule_id, config } => {
                let first = match self.apply.toggle_rule(&rule_id, config).await? {
                    Toggled::Applied(applied) => Response::Applied { rule_id, applied },
                    Toggled::Removed => Response::Removed {
                        rule_id,
                        removed: true,
                    },
                };
                Ok(vec![first, self.rules_response().await?])
            }
            Request::PreviewRule { rule_id, max_lines } => {
                let rule = self.discovery.require_rule(&rule_id).await?;
                Ok(vec![preview_response(
                    rule,
                    max_lines.unwrap_or(DEFAULT_PREVIEW_LINES),
                )])
            }
            Request::AddTag { rule_id, tag } => {
                self.discovery.require_rule(&rule_id).await?;
                self.metadata_store().add_tag(&rule_id, &tag)?;
                self.tags_changed().await
            }
            Request::RemoveTag { rule_id, tag } => {
                self.discovery.require_rule(&rule_id).await?;
                if !self.metadata_store().remove_tag(&rule_id, &tag)? {
                    debug!("{rule_id} had no tag {tag:?}");
                }
                self.tags_changed().await
            }
            Request::EditMetadata {
                rule_id,
                title,
                description,
            } => {
                self.discovery.require_rule(&rule_id).await?;
                let store = self.metadata_store();
                if let Some(title) = title {
                    store.set_title(&rule_id, &title)?;
                }
                if let Some(description) = description {
                    store.set_description(&rule_id, &description)?;
                }
                self.discovery.discover_all_rules(true).await?;
                Ok(vec![self.rules_response().await?])
            }
            Request::Refresh => {
                self.sync_registry().await;
                self.discovery.invalidate().await;
                self.discovery.discover_all_rules(true).await?;
                Ok(vec![
                    Response::InitFilters {
                        payload: self.filter_data().await?,
                    },
                    self.rules_response().await?,
                ])
            }
        }
    }

    async fn rules_response(&self) -> Result<Response> {
        let filter = self.last_filter.lock().await.clone();
        Ok(Response::UpdateRules {
            rules: self.list_rules(&filter).await?,
        })
    }

    async fn tags_changed(&self) -> Result<Vec<Response>> {
        self.discovery.discover_all_rules(true).await?;
        Ok(vec![
            Response::UpdateTagOptions {
                tags: self.discovery.available_tags().await?,
            },
            self.rules_response().await?,
        ])
    }
}

fn preview_response(rule: Rule, max_lines: usize) -> Response {
    Response::Preview {
        preview: get_rule_preview(&rule.content, max_lines),
        rule_id: rule.id,
        title: rule.title,
        content: rule.content,
    }
}

//! ruledeck-core - Core library for rule registries
//!
//! This crate provides the building blocks for:
//! - Decoding `.mdc` rule files (YAML frontmatter + Markdown body)
//! - Building canonical [`Rule`] records with deterministic IDs
//! - Reading and writing the `rules-metadata.jsonc` side store
//! - Scanning a registry for team, user and generic rules
//! - Filtering, sorting and fuzzy-ranking rule sets
//! - Matching applied projections against their source rules
//!
//! # Features
//!
//! - `walk` - Enable recursive `.mdc` discovery (brings in `ignore`)
//!
//! # Decoding a rule file
//!
//! ```
//! use ruledeck_core::{RuleOwner, build_rule, frontmatter};
//! use std::path::Path;
//!
//! let text = "---\ndescription: Prefer early returns\nglobs: *.rs\n---\n# Early returns\nKeep nesting shallow.";
//! let parsed = frontmatter::decode(text);
//! assert_eq!(parsed.content, "# Early returns\nKeep nesting shallow.");
//!
//! let owner = RuleOwner::Team("Asset Foundations".to_string());
//! let rule = build_rule(Path::new("/reg/teams/af/early.mdc"), parsed, &owner, None).unwrap();
//! assert_eq!(rule.id, "early.assetfoundations");
//! assert_eq!(rule.title, "Early returns");
//! assert_eq!(rule.metadata.globs, Some(vec!["*.rs".to_string()]));
//! ```
//!
//! # Filtering
//!
//! Filtering never touches the filesystem; applied state is supplied by the
//! caller as a predicate:
//!
//! ```
//! use ruledeck_core::{Rule, RuleFilter, filter_and_sort};
//!
//! let rules: Vec<Rule> = Vec::new();
//! let filter = RuleFilter { search: Some("returns".into()), ..Default::default() };
//! let view = filter_and_sort(&rules, &filter, |_| false);
//! assert!(view.is_empty());
//! ```

pub mod applied;
pub mod filter;
pub mod frontmatter;
pub mod metadata;
#[cfg(feature = "walk")]
pub mod registry;
mod rule;
mod rule_id;
pub mod search;
mod sources;

pub use applied::{
    AppliedRule, ApplyStrategy, RuleApplicationConfig, is_applied_variant,
    resolve_applied_variants, unique_applied_name,
};
pub use filter::{CURRENT_USER, RuleFilter, SortKey, SortOrder, filter_and_sort, sort_rules};
pub use frontmatter::{ParsedRuleFile, RawMetadata, RuleMetadata};
pub use metadata::{META_FILENAME, MetadataMap, MetadataStore, RuleMetaEntry};
#[cfg(feature = "walk")]
pub use registry::{Registry, RuleDiscoveryResult};
pub use rule::{
    DEFAULT_PREVIEW_LINES, Rule, build_rule, get_content_snippets, get_rule_preview, load_rule,
    resolve_title,
};
pub use rule_id::{
    RuleOwner, derive_generic_rule_id, derive_rule_id, file_stem, get_rule_source,
};
pub use search::{RankedRule, rank_rules, score_rule};
pub use sources::{
    MDC_EXTENSION, RegistryLayout, RegistryStructure, create_registry_structure,
    scan_registry_structure,
};

#[cfg(feature = "walk")]
pub use sources::find_mdc_files;

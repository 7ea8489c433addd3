//! Team membership lookup

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One team and its members' emails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMembership {
    pub name: String,
    pub members: Vec<String>,
}

/// All known teams plus the names of the ones a user belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberships {
    pub teams: Vec<TeamMembership>,
    pub user_teams: Vec<String>,
}

/// Source of team membership data.
pub trait TeamDirectory: Send + Sync {
    fn team_memberships(&self, email: &str) -> TeamMemberships;
}

/// Memberships declared in the `teams:` section of the config.
#[derive(Debug, Clone, Default)]
pub struct ConfigTeamDirectory {
    teams: BTreeMap<String, Vec<String>>,
}

impl ConfigTeamDirectory {
    pub fn new(teams: BTreeMap<String, Vec<String>>) -> Self {
        Self { teams }
    }
}

impl TeamDirectory for ConfigTeamDirectory {
    fn team_memberships(&self, email: &str) -> TeamMemberships {
        let email = email.trim().to_lowercase();
        let teams: Vec<TeamMembership> = self
            .teams
            .iter()
            .map(|(name, members)| TeamMembership {
                name: name.clone(),
                members: members.clone(),
            })
            .collect();
        let user_teams = teams
            .iter()
            .filter(|team| {
                !email.is_empty() && team.members.iter().any(|m| m.trim().to_lowercase() == email)
            })
            .map(|team| team.name.clone())
            .collect();
        TeamMemberships { teams, user_teams }
    }
}

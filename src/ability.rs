//! Static capability table.
//!
//! Every caller is resolved to a [`Tier`] once per request. The tier maps to a
//! fixed list of `(action, subject)` rules; there is no runtime-built
//! permission graph.

use serde::Serialize;
use std::fmt;

use crate::db::models::User;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Anonymous,
    Unverified,
    Verified,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Like,
    Comment,
    Create,
    /// Wildcard action.
    Manage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Post,
    Comment,
    /// Wildcard subject.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub action: Action,
    pub subject: Subject,
}

const fn rule(action: Action, subject: Subject) -> Rule {
    Rule { action, subject }
}

const ANONYMOUS: &[Rule] = &[
    rule(Action::Read, Subject::Post),
    rule(Action::Read, Subject::Comment),
];

// Unverified accounts keep everything an anonymous visitor can do.
const UNVERIFIED: &[Rule] = &[
    rule(Action::Read, Subject::Post),
    rule(Action::Read, Subject::Comment),
];

const VERIFIED: &[Rule] = &[
    rule(Action::Read, Subject::All),
    rule(Action::Like, Subject::Post),
    rule(Action::Comment, Subject::Post),
    rule(Action::Create, Subject::Comment),
];

const ADMIN: &[Rule] = &[rule(Action::Manage, Subject::All)];

impl Tier {
    /// Parse a tier name. Anything unrecognised is treated as anonymous.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "admin" => Tier::Admin,
            "verified" => Tier::Verified,
            "unverified" => Tier::Unverified,
            _ => Tier::Anonymous,
        }
    }

    pub fn for_user(user: Option<&User>) -> Self {
        match user {
            None => Tier::Anonymous,
            Some(u) if u.is_admin => Tier::Admin,
            Some(u) if u.is_verified => Tier::Verified,
            Some(_) => Tier::Unverified,
        }
    }

    pub fn rules(self) -> &'static [Rule] {
        match self {
            Tier::Anonymous => ANONYMOUS,
            Tier::Unverified => UNVERIFIED,
            Tier::Verified => VERIFIED,
            Tier::Admin => ADMIN,
        }
    }

    pub fn ability(self) -> Ability {
        Ability { tier: self }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Anonymous => "anonymous",
            Tier::Unverified => "unverified",
            Tier::Verified => "verified",
            Tier::Admin => "admin",
        };
        f.write_str(name)
    }
}

/// Resolved permission set for one caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ability {
    tier: Tier,
}

impl Ability {
    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn can(&self, action: Action, subject: Subject) -> bool {
        self.tier.rules().iter().any(|r| {
            (r.action == Action::Manage || r.action == action)
                && (r.subject == Subject::All || r.subject == subject)
        })
    }

    /// Anonymous callers get 401 so the client can prompt for login; everyone else 403.
    pub fn require(&self, action: Action, subject: Subject) -> AppResult<()> {
        if self.can(action, subject) {
            return Ok(());
        }
        tracing::debug!(tier = %self.tier, ?action, ?subject, "permission denied");
        match self.tier {
            Tier::Anonymous => Err(AppError::Unauthorized),
            _ => Err(AppError::Forbidden),
        }
    }
}

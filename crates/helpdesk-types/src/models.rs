use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Name shown for a message whose author row no longer resolves.
pub const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Engineer,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Engineer => "ENGINEER",
            Self::Admin => "ADMIN",
        }
    }

    /// Landing page for a freshly signed-in session.
    pub fn dashboard_path(self) -> &'static str {
        match self {
            Self::User => "/user",
            Self::Engineer => "/engineer",
            Self::Admin => "/admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Self::User),
            "ENGINEER" => Ok(Self::Engineer),
            "ADMIN" => Ok(Self::Admin),
            other => Err(ParseEnumError { kind: "role", value: other.to_string() }),
        }
    }
}

/// Lifecycle of a support request.
///
/// `Rejected` is kept so rows written by other tools still parse, but no
/// operation in this service produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    UnderReview,
    Closed,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Closed => "CLOSED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Closed and rejected tickets live in the archive view.
    pub fn is_archived(self) -> bool {
        matches!(self, Self::Closed | Self::Rejected)
    }

    /// Edges of the ticket lifecycle. Nothing leaves a terminal state and
    /// nothing returns to `Pending`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::UnderReview)
                | (Self::Pending, Self::Closed)
                | (Self::UnderReview, Self::Closed)
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "UNDER_REVIEW" => Ok(Self::UnderReview),
            "CLOSED" => Ok(Self::Closed),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(ParseEnumError { kind: "application status", value: other.to_string() }),
        }
    }
}

/// The two ticket route groups. Each accepts a different set of target
/// statuses and a different caller role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Desk {
    User,
    Engineer,
}

impl Desk {
    pub fn role(self) -> Role {
        match self {
            Self::User => Role::User,
            Self::Engineer => Role::Engineer,
        }
    }

    /// Owners may only close; engineers may start review or close.
    pub fn allowed_targets(self) -> &'static [ApplicationStatus] {
        match self {
            Self::User => &[ApplicationStatus::Closed],
            Self::Engineer => &[ApplicationStatus::UnderReview, ApplicationStatus::Closed],
        }
    }

    pub fn path(self) -> &'static str {
        self.role().dashboard_path()
    }
}

/// Who wrote a chat message. Exactly one side authors each message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Author {
    User(Uuid),
    Engineer(Uuid),
}

impl Author {
    /// Engineers post as engineers; every other role posts as the requester side.
    pub fn for_role(role: Role, user_id: Uuid) -> Self {
        match role {
            Role::Engineer => Self::Engineer(user_id),
            Role::User | Role::Admin => Self::User(user_id),
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::User(id) | Self::Engineer(id) => *id,
        }
    }
}

/// The public face of an account, embedded in ticket and message payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub login: String,
    pub nickname: Option<String>,
}

impl UserSummary {
    pub fn display_name(&self) -> String {
        display_name(self.nickname.as_deref(), Some(&self.login))
    }
}

/// Nickname if set, otherwise login, otherwise [`ANONYMOUS`].
pub fn display_name(nickname: Option<&str>, login: Option<&str>) -> String {
    nickname
        .filter(|n| !n.trim().is_empty())
        .or(login.filter(|l| !l.is_empty()))
        .unwrap_or(ANONYMOUS)
        .to_string()
}

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use helpdesk_types::api::{ApplicationResponse, MessageResponse, UserResponse};
use helpdesk_types::{ApplicationStatus, Desk, Role};

use crate::view::ViewState;

const UNASSIGNED: &str = "Unassigned";

fn short_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

pub struct ChatLine {
    pub author: String,
    pub content: String,
    pub at: String,
}

pub struct ChatPane {
    pub application_id: Uuid,
    pub lines: Vec<ChatLine>,
    /// Closed tickets keep their history visible but take no new input.
    pub disabled: bool,
}

pub struct TicketRow {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub status: ApplicationStatus,
    /// Assigned engineer on the user desk, requester on the engineer desk.
    pub counterpart: String,
    pub created: String,
    pub expanded: bool,
    pub toggle_href: String,
    pub can_review: bool,
    pub can_close: bool,
    pub chat: ChatPane,
}

pub struct Dashboard {
    pub desk: Desk,
    pub rows: Vec<TicketRow>,
    pub archived: bool,
    pub open_param: String,
    pub tab_href: String,
}

impl Dashboard {
    /// Filters `applications` to the current tab and attaches chat history
    /// for the expanded rows. `chats` only needs entries for open tickets.
    pub fn build(
        desk: Desk,
        view: &ViewState,
        applications: Vec<ApplicationResponse>,
        mut chats: HashMap<Uuid, Vec<MessageResponse>>,
    ) -> Self {
        // The requester page shows one ticket at a time; engineers juggle several.
        let single = desk == Desk::User;
        let base = desk.path();

        let rows = applications
            .into_iter()
            .filter(|app| view.shows(app.status))
            .map(|app| {
                let expanded = view.is_open(app.id);
                let counterpart = match desk {
                    Desk::User => app
                        .engineer
                        .as_ref()
                        .map(|e| e.display_name())
                        .unwrap_or_else(|| UNASSIGNED.to_string()),
                    Desk::Engineer => app.owner.display_name(),
                };
                let lines = if expanded {
                    chats
                        .remove(&app.id)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|m| ChatLine {
                            at: short_time(&m.created_at),
                            author: m.author_name,
                            content: m.content,
                        })
                        .collect()
                } else {
                    Vec::new()
                };
                let allows = |target: ApplicationStatus| {
                    desk.allowed_targets().contains(&target) && app.status.can_transition_to(target)
                };

                TicketRow {
                    id: app.id,
                    can_review: allows(ApplicationStatus::UnderReview),
                    can_close: allows(ApplicationStatus::Closed),
                    created: short_time(&app.created_at),
                    toggle_href: view.toggled(app.id, single).href(base),
                    chat: ChatPane {
                        application_id: app.id,
                        lines,
                        disabled: app.status.is_archived(),
                    },
                    title: app.title,
                    content: app.content,
                    status: app.status,
                    counterpart,
                    expanded,
                }
            })
            .collect();

        Self {
            desk,
            rows,
            archived: view.archived,
            open_param: view.open_param(),
            tab_href: view.with_archived(!view.archived).href(base),
        }
    }

    pub fn desk_name(&self) -> &'static str {
        match self.desk {
            Desk::User => "user",
            Desk::Engineer => "engineer",
        }
    }
}

pub struct AccountRow {
    pub id: Uuid,
    pub login: String,
    pub nickname: String,
    pub role: Role,
    pub created: String,
    /// The signed-in admin gets no delete button for their own account.
    pub is_self: bool,
}

impl AccountRow {
    pub fn from_user(user: UserResponse, me: Uuid) -> Self {
        Self {
            is_self: user.id == me,
            id: user.id,
            created: short_time(&user.created_at),
            nickname: user.nickname.unwrap_or_default(),
            login: user.login,
            role: user.role,
        }
    }
}

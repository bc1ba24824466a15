use askama::Template;

use helpdesk_types::Role;

use crate::dashboard::{AccountRow, Dashboard};

/// Roles offered by the account form, default first.
pub const ROLE_CHOICES: [Role; 3] = [Role::User, Role::Engineer, Role::Admin];

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage<'a> {
    pub who: Option<&'a str>,
    pub refresh_secs: Option<u64>,
    pub error: Option<&'a str>,
    pub login: &'a str,
}

#[derive(Template)]
#[template(path = "user.html")]
pub struct UserPage<'a> {
    pub who: Option<&'a str>,
    pub refresh_secs: Option<u64>,
    pub error: Option<&'a str>,
    pub dashboard: &'a Dashboard,
    pub draft_title: &'a str,
    pub draft_content: &'a str,
}

#[derive(Template)]
#[template(path = "engineer.html")]
pub struct EngineerPage<'a> {
    pub who: Option<&'a str>,
    pub refresh_secs: Option<u64>,
    pub error: Option<&'a str>,
    pub dashboard: &'a Dashboard,
}

#[derive(Template)]
#[template(path = "admin.html")]
pub struct AdminPage<'a> {
    pub who: Option<&'a str>,
    pub refresh_secs: Option<u64>,
    pub error: Option<&'a str>,
    pub accounts: &'a [AccountRow],
    pub roles: &'a [Role],
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;
    use uuid::Uuid;

    use helpdesk_types::api::ApplicationResponse;
    use helpdesk_types::{ApplicationStatus, Desk, UserSummary};

    use super::*;
    use crate::view::ViewState;

    fn ticket(title: &str, status: ApplicationStatus) -> ApplicationResponse {
        ApplicationResponse {
            id: Uuid::new_v4(),
            title: title.into(),
            content: "details".into(),
            status,
            owner: UserSummary { id: Uuid::new_v4(), login: "alice".into(), nickname: None },
            engineer: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn login_page_shows_inline_error_escaped() {
        let html = LoginPage {
            who: None,
            refresh_secs: None,
            error: Some("Invalid login or password"),
            login: "<script>",
        }
        .render()
        .unwrap();
        assert!(html.contains("Invalid login or password"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("http-equiv=\"refresh\""));
    }

    #[test]
    fn refresh_interval_is_declared_in_head() {
        let board = Dashboard::build(Desk::Engineer, &ViewState::default(), vec![], HashMap::new());
        let html = EngineerPage { who: Some("eve"), refresh_secs: Some(30), error: None, dashboard: &board }
            .render()
            .unwrap();
        assert!(html.contains("http-equiv=\"refresh\" content=\"30\""));
    }

    #[test]
    fn closed_ticket_chat_input_is_disabled() {
        let closed = ticket("Printer broken", ApplicationStatus::Closed);
        let view = ViewState::parse(true, &closed.id.to_string());
        let board = Dashboard::build(Desk::User, &view, vec![closed], HashMap::new());
        let html = UserPage {
            who: Some("alice"),
            refresh_secs: None,
            error: None,
            dashboard: &board,
            draft_title: "",
            draft_content: "",
        }
        .render()
        .unwrap();
        assert!(html.contains("Printer broken"));
        assert!(html.contains("Ticket closed, chat unavailable"));
        assert!(html.contains("disabled"));
    }

    #[test]
    fn admin_page_lists_accounts_without_self_delete() {
        let me = Uuid::new_v4();
        let accounts = vec![AccountRow {
            id: me,
            login: "root".into(),
            nickname: String::new(),
            role: Role::Admin,
            created: "2024-01-01 00:00".into(),
            is_self: true,
        }];
        let html = AdminPage {
            who: Some("root"),
            refresh_secs: None,
            error: Some("login already exists"),
            accounts: &accounts,
            roles: &ROLE_CHOICES,
        }
        .render()
        .unwrap();
        assert!(html.contains("root"));
        assert!(html.contains("login already exists"));
        assert!(!html.contains(&format!("/admin/accounts/{me}/delete")));
    }
}

use serde::Deserialize;
use uuid::Uuid;

use helpdesk_types::ApplicationStatus;

/// Client-side view state as it travels in query strings and hidden form
/// fields: `archived=true&open=<id>,<id>`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewQuery {
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub open: String,
}

/// Which tab is showing and which rows are expanded. Lives only in the URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub archived: bool,
    open: Vec<Uuid>,
}

impl From<&ViewQuery> for ViewState {
    fn from(query: &ViewQuery) -> Self {
        Self::parse(query.archived, &query.open)
    }
}

impl ViewState {
    /// Unparseable ids are dropped; duplicates collapse.
    pub fn parse(archived: bool, open: &str) -> Self {
        let mut ids: Vec<Uuid> = Vec::new();
        for id in open.split(',').filter_map(|s| s.trim().parse().ok()) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Self { archived, open: ids }
    }

    pub fn is_open(&self, id: Uuid) -> bool {
        self.open.contains(&id)
    }

    pub fn open_ids(&self) -> &[Uuid] {
        &self.open
    }

    /// Whether a ticket with `status` belongs on the current tab.
    pub fn shows(&self, status: ApplicationStatus) -> bool {
        status.is_archived() == self.archived
    }

    /// Collapse `id` if expanded, otherwise expand it. With `single` set,
    /// expanding replaces whatever was open.
    pub fn toggled(&self, id: Uuid, single: bool) -> Self {
        let mut next = self.clone();
        if next.is_open(id) {
            next.open.retain(|o| *o != id);
        } else if single {
            next.open = vec![id];
        } else {
            next.open.push(id);
        }
        next
    }

    /// Same state with `id` expanded, used after posting to its chat.
    pub fn with_open(&self, id: Uuid, single: bool) -> Self {
        if self.is_open(id) {
            return self.clone();
        }
        self.toggled(id, single)
    }

    /// Switching tabs keeps expanded rows; they simply are not visible.
    pub fn with_archived(&self, archived: bool) -> Self {
        Self { archived, open: self.open.clone() }
    }

    pub fn open_param(&self) -> String {
        self.open.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",")
    }

    pub fn href(&self, base: &str) -> String {
        let mut params = Vec::new();
        if self.archived {
            params.push("archived=true".to_string());
        }
        if !self.open.is_empty() {
            params.push(format!("open={}", self.open_param()));
        }
        if params.is_empty() {
            base.to_string()
        } else {
            format!("{}?{}", base, params.join("&"))
        }
    }
}

use std::time::Duration;

/// How dashboards stay current.
///
/// A refetch after every mutation is unconditional: each form action ends in
/// a redirect to the dashboard, which reloads its data. `interval` adds a
/// periodic reload on top, declared in the page head so the client can see
/// it. No timer runs on the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub interval: Option<Duration>,
}

impl RefreshPolicy {
    pub fn every(interval: Duration) -> Self {
        Self { interval: Some(interval) }
    }

    /// Zero or missing seconds disable the periodic reload.
    pub fn from_secs(secs: Option<u64>) -> Self {
        Self {
            interval: secs.filter(|s| *s > 0).map(Duration::from_secs),
        }
    }

    /// Seconds for `<meta http-equiv="refresh">`, rounded up to at least one.
    pub fn meta_refresh_secs(&self) -> Option<u64> {
        self.interval.map(|d| d.as_secs().max(1))
    }
}

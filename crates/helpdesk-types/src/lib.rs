pub mod api;
pub mod models;

pub use models::{ApplicationStatus, Author, Desk, Role, UserSummary, display_name};

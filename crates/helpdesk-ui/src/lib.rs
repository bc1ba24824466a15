//! Server-rendered dashboards for the three roles.
//!
//! Pages are plain HTML forms. Every mutation posts to the server and is
//! answered with a redirect back to the dashboard, which pulls its list again;
//! an optional [`RefreshPolicy`] interval adds a declared meta refresh on top.

pub mod dashboard;
pub mod refresh;
pub mod templates;
pub mod view;

pub use dashboard::{AccountRow, ChatLine, ChatPane, Dashboard, TicketRow};
pub use refresh::RefreshPolicy;
pub use templates::{AdminPage, EngineerPage, LoginPage, UserPage};
pub use view::{ViewQuery, ViewState};

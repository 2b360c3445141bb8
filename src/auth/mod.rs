//! Fixed accounts and signed sessions.

pub mod accounts;
pub mod routes;
pub mod session;

pub use accounts::AccountDirectory;
pub use routes::{AuthState, auth_routes};
pub use session::{SESSION_COOKIE, SessionKeys, SessionUser, session_from_request};

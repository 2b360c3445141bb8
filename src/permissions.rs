//! Role-based permission policy for mailbox actions.
//!
//! Two fixed roles share one mailbox: `ADMIN` owns it, `READ_ONLY` observes
//! it. Actions are string keys so that unknown actions fall through to deny
//! rather than failing to compile into an allow.

use serde::{Deserialize, Serialize};

/// Dashboard account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    ReadOnly,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Role::ReadOnly)
    }

    /// Actions this role may perform, beyond the always-allowed refresh.
    fn allowed_actions(&self) -> &'static [&'static str] {
        match self {
            Role::Admin => &[
                "view_inbox",
                "view_email_detail",
                "compose_email",
                "send_email",
                "delete_email",
                "search_emails",
                "fetch_email",
            ],
            Role::ReadOnly => &[
                "view_inbox",
                "view_email_detail",
                "search_emails",
                "fetch_email",
            ],
        }
    }
}

/// Decide whether a caller may perform `action`.
///
/// `fetch_email` (refreshing the shared inbox from the mailbox) is allowed
/// for everyone, including callers with no session. Every other action
/// requires a session, and an action absent from a role's list is denied.
pub fn can_perform_action(role: Option<Role>, action: &str) -> bool {
    if action == "fetch_email" {
        return true;
    }
    let Some(role) = role else {
        return false;
    };
    role.allowed_actions().contains(&action)
}

//! The two fixed dashboard accounts.
//!
//! There is no user store: one admin and one optional read-only guest,
//! both configured through the environment. An account with an empty email
//! or password is disabled rather than matchable-by-empty-string.

use crate::auth::session::SessionUser;
use crate::config::AuthConfig;
use crate::permissions::Role;

struct Account {
    id: &'static str,
    name: &'static str,
    email: String,
    password: String,
    role: Role,
}

impl Account {
    fn enabled(&self) -> bool {
        !self.email.is_empty() && !self.password.is_empty()
    }
}

pub struct AccountDirectory {
    accounts: Vec<Account>,
}

impl AccountDirectory {
    pub fn new(config: &AuthConfig) -> Self {
        let accounts = vec![
            Account {
                id: "admin",
                name: "Admin",
                email: config.admin_email.clone(),
                password: config.admin_password.clone(),
                role: Role::Admin,
            },
            Account {
                id: "guest",
                name: "Guest",
                email: config.guest_email.clone(),
                password: config.guest_password.clone(),
                role: Role::ReadOnly,
            },
        ];
        Self { accounts }
    }

    /// Check a credential pair. `None` does not say whether the email or the
    /// password missed.
    pub fn authenticate(&self, email: &str, password: &str) -> Option<SessionUser> {
        self.accounts
            .iter()
            .filter(|a| a.enabled())
            .find(|a| a.email == email && a.password == password)
            .map(|a| SessionUser {
                id: a.id.to_string(),
                email: a.email.clone(),
                name: a.name.to_string(),
                role: a.role,
            })
    }
}

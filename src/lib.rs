//! maildeck — webmail dashboard service.

pub mod assistant;
pub mod auth;
pub mod config;
pub mod error;
pub mod mail;
pub mod permissions;
pub mod server;

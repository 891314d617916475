//! Data model shared by the login gate, the dashboard and the data service.

pub mod auth;
pub mod credential;
pub mod dashboard;
pub mod record;
pub mod user;

//! Login gate, live dashboard, and the data service they share.

pub mod auth;
pub mod dashboard;
pub mod memory;
pub mod postgres;
pub mod remote;
pub mod verifier;

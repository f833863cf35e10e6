//! Endpoint handlers organized by area

pub mod health;
pub mod migration;

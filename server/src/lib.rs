//! Edu-Desk server: dual-backend data access and the relational to document
//! migration pipeline, with an admin HTTP surface.

pub mod config;
pub mod migration;
pub mod model;
pub mod persistence;
pub mod service;
pub mod storage;

//! Rafa - data core of a donation and volunteering marketplace
//!
//! This library provides the schema, the filtered query builder with its
//! relationship registry, the repositories and the domain services.

pub mod config;
pub mod db;
pub mod models;
pub mod query;
pub mod services;

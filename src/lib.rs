//! Image safety server library.
//!
//! Core functionality for the image safety server: the record store and its
//! lifecycle contract, the analysis worker, aggregate statistics, the HTTP
//! API, and the polling sync client.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;
pub mod store;

//! gatehouse forward-authentication server.
//!
//! This crate provides the HTTP surface of the sidecar: the authorization
//! callback and delegation entry on the authentication domain, and the
//! delegation landing path and forward-auth check on protected domains.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;

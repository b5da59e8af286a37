//! EPR frontend web server.
//!
//! This crate provides the server-rendered web frontend for the EPR
//! service, delegating identity to Defra ID.

pub mod app;
pub mod auth;
pub mod config;
pub mod pages;

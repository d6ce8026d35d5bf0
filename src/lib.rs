//! Terminal IP address tracker.
//!
//! Looks up an IP address or domain, shows where it is, and keeps a map
//! centered on the result. See [`coordinator`] for the lookup pipeline and
//! [`map`] for the map widget.

pub mod api;
pub mod app;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod logging;
pub mod map;
pub mod models;
pub mod ui;

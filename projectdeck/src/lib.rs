//! ProjectDeck library
//!
//! Projects, tasks, memberships, tags and comments behind a single
//! authorization layer, over a pluggable persistence provider.

pub mod access;
pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod services;
pub mod stats;
pub mod storage;

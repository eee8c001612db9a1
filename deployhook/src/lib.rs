//! deployhook library
//!
//! GitHub `workflow_run` webhooks in, Docker container redeploys out.

pub mod app;
pub mod credentials;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod notify;
pub mod registry;
pub mod server;
pub mod storage;
pub mod utils;
pub mod webhook;

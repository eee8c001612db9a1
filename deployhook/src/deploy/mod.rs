//! Deployment module

pub mod docker;
pub mod executor;
pub mod fsm;
pub mod lock;
pub mod orchestrator;
pub mod reporter;
pub mod runtime;

//! GitHub webhook intake: signature, payload, matching

pub mod matcher;
pub mod payload;
pub mod signature;

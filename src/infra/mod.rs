//! Infrastructure adapters and runtime bootstrap.

pub mod engine;
pub mod error;
pub mod http;
pub mod object_store;
pub mod oss;
pub mod storage;
pub mod telemetry;

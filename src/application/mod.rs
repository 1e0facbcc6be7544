//! Application services: request dispatch, render strategies and persistence.

pub mod error;
pub mod formula;
pub mod render;
pub mod storage;

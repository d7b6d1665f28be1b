//! Persistence layer for study plans: row models, embedded migrations,
//! connection pooling and typed query functions.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;

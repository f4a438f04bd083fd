//! HTTP middleware

pub mod context;

pub use context::session_middleware;

//! Scans a PostgREST collection for encoding-damaged text and repairs it with
//! a substitution dictionary, falling back to a Gemini model for values the
//! dictionary cannot resolve.

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod services;
pub mod store;
pub mod text;

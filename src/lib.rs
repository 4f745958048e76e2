//! Session state engine for a chat gateway in front of a stateless LLM CLI.
//!
//! Every CLI invocation is independent; [`session::SessionManager`] keeps the
//! conversation between them, bounded in time (TTL) and size (history and
//! capacity limits).

pub mod cli;
pub mod config;
pub mod daemon;
pub mod session;
pub mod utils;

//! Knowledge-base client for Nexo.
//!
//! Defines the [`KnowledgeBase`] contract the conversational core talks to,
//! with a process-local implementation and a REST client for the remote
//! service.

pub mod client;
pub mod error;
pub mod http;
pub mod memory;

pub use client::KnowledgeBase;
pub use error::StoreError;
pub use http::HttpKnowledgeBase;
pub use memory::InMemoryKnowledgeBase;

//! mskpipe - MSK to OpenSearch bridge library
//!
//! This library bridges an event stream and a search index: the producer
//! accepts HTTP-delivered payloads and publishes them to a durable topic;
//! the consumer reads that topic, writes each record into a searchable
//! index, and commits delivery progress only after the write succeeded
//! (at-least-once delivery).
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `stream`: stream client integration - publish path, consume loop,
//!   partition-ownership lifecycle and offset bookkeeping
//! - `indexer`: index-store write path with SigV4 request signing
//! - `server`: inbound HTTP boundary for the publish path
//! - `credentials`: AWS credential collaborator
//! - `config`: environment-driven configuration
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition

pub mod cli;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod indexer;
pub mod server;
pub mod stream;

// Re-export commonly used types
pub use config::{HttpConfig, IndexConfig, StreamConfig};
pub use credentials::CredentialChain;
pub use error::{MskpipeError, Result};
pub use indexer::{IndexError, IndexReceipt, Indexer, OpenSearchIndexer};
pub use server::{router, AppState};
pub use stream::{ConsumeLoop, Publish, PublishError, PublishResult, StreamPublisher};

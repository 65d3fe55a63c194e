//! # fitpal
//!
//! The processing core of a conversational food-logging agent.
//!
//! ## Usage
//!
//! ```bash
//! fitpal log --conversation chat-1 -i "chicken breast:200" -i "apple:150"
//! fitpal resume --conversation chat-1 --approve
//! ```
//!
//! ## Modules
//!
//! - `agent` - The resumable turn engine: resolver, calculator, confirmation gate, writer
//! - `cli` - Command-line argument parsing and command routing
//! - `config` - Configuration from `config.toml` and `FITPAL_*` environment variables
//! - `error` - Unified error type with numeric codes
//! - `oracle` - Disambiguation and estimation oracles
//! - `report` - Daily reports and stats re-read from the store
//! - `storage` - Durable food store, its backends and CSV ingestion
//! - `testing` - Mocks and fixtures for tests
pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod oracle;
pub mod report;
pub mod storage;

pub mod testing;

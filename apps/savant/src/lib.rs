//! # Savant
//!
//! Research control server over a shared knowledge graph.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     apps/savant (THE SERVER)                    │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐     │
//! │  │   CLI       │    │   HTTP API  │    │    Scheduler     │     │
//! │  │  (clap)     │    │   (axum)    │    │ (tokio interval) │     │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘     │
//! │         └──────────────────┼────────────────────┘               │
//! │                            ▼                                    │
//! │                  ┌───────────────────┐                          │
//! │                  │  ResearchService  │                          │
//! │                  │  └─ Controller ───┼──▶ ResearchTask          │
//! │                  └─────────┬─────────┘                          │
//! │                            ▼                                    │
//! │                    ┌───────────────┐                            │
//! │                    │  savant-core  │                            │
//! │                    │  (THE STORE)  │                            │
//! │                    └───────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod research;
pub mod service;

pub use error::AppError;
pub use service::{ResearchService, StartOutcome};

//! # docqa
//!
//! Question answering over a collection of PDF documents, with every answer
//! annotated by numbered citations that link back to the source documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────────┐   ┌──────────┐
//! │   PDFs   │──▶│ Extractor  │──▶│ Chunk+Embed  │──▶│  SQLite  │
//! │          │   │ text / OCR │   │ + source URL │   │  index   │
//! └──────────┘   └────────────┘   └──────────────┘   └────┬─────┘
//!                                                         │ load / reload
//!                                                         ▼
//!   question ──▶ retrieve top-K ──▶ number sources ──▶ prompt ──▶ generator
//!                                                         │
//!                          answer with [[n]](url) links ◀─┘ + citation list
//! ```
//!
//! Storage-agnostic logic (chunking, retrieval, citation numbering and
//! rendering) lives in the `docqa-core` crate; this crate adds the SQLite
//! store, PDF extraction, providers, background jobs, CLI and HTTP API.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF text extraction with OCR fallback |
//! | [`sources`] | Filename → citation URL mapping |
//! | [`ingest`] | Add / delete / rebuild under a single-writer lock |
//! | [`lock`] | Cross-process writer lock beside the database |
//! | [`sqlite_store`] | SQLite implementation of the store trait |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | Generative model providers |
//! | [`state`] | Swappable index snapshot and component wiring |
//! | [`qa`] | The ask pipeline |
//! | [`jobs`] | Background ingestion worker |
//! | [`server`] | HTTP API |
//! | [`commands`] | CLI subcommands |

pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod ingest;
pub mod jobs;
pub mod lock;
pub mod migrate;
pub mod qa;
pub mod server;
pub mod sources;
pub mod sqlite_store;
pub mod state;

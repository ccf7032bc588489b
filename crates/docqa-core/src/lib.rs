//! # docqa core
//!
//! Storage-agnostic logic for the document question-answering pipeline:
//! data models, paragraph chunking, the store and embedding traits, the
//! in-memory index snapshot with top-K retrieval, and citation assignment
//! and rendering.
//!
//! This crate does no filesystem, network or database I/O. The `docqa` app
//! crate supplies the SQLite store, PDF extraction, and network-backed
//! embedding and generation providers.

pub mod answer;
pub mod citation;
pub mod embedding;
pub mod generation;
pub mod index;
pub mod models;
pub mod paragraph;
pub mod prompt;
pub mod store;

//! # kb-ingest
//!
//! A local-first document ingestion pipeline with per-file lifecycle
//! tracking.
//!
//! kb-ingest normalizes heterogeneous documents (PDF, DOCX, plain text,
//! Markdown) into a uniform representation and records each file's
//! progress through the ingestion stages in a relational status row with
//! idempotent, forward-only transitions. Chunking and embedding are future
//! stages: their status values and statistics columns exist, the
//! algorithms do not.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────────┐   ┌───────────────┐
//! │  Loader   │──▶│    Indexer    │──▶│    SQLite     │
//! │ pdf/docx/ │   │ checksum +    │   │ knowledge_file│
//! │  txt/md   │   │ status stages │   │  lifecycle    │
//! └───────────┘   └───────────────┘   └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kbi init                      # create the lifecycle database
//! kbi index ./docs              # discover and index every supported file
//! kbi files kb-001              # list lifecycle records
//! kbi run ./docs --out ./json   # loader-only pass, serialized output
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types (`RawDoc`, `KnowledgeFile`, statuses) |
//! | [`error`] | Error taxonomy |
//! | [`extract`] | Format-specific extraction backends |
//! | [`loader`] | Loader trait, discovery, lazy loading |
//! | [`repo`] | Lifecycle record repository |
//! | [`ingest`] | Single-file indexing orchestrator |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod loader;
pub mod migrate;
pub mod models;
pub mod repo;

//! # Review Lens
//!
//! Incremental customer-review analysis: LLM opinion extraction and
//! semantic phrase-cluster summaries, per product.
//!
//! Review Lens ingests free-text marketplace reviews, extracts structured
//! opinion fields (sentiment, pros, cons, complaints, suggestions,
//! expectations, feature categories) through a language model, and collapses
//! the near-duplicate free-text tags into a small set of frequency-ranked
//! themes per product.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────┐   ┌─────────────┐
//! │ Review     │──▶│ raw_reviews  │──▶│ Opinion   │──▶│ review_     │
//! │ export     │   │ (SQLite)     │   │ Extractor │   │ analysis    │
//! └────────────┘   └──────────────┘   └───────────┘   └──────┬──────┘
//!                                                            │
//!                       ┌────────────────────────────────────┤
//!                       ▼                                    ▼
//!                 ┌───────────┐   ┌───────────┐   ┌──────────────────┐
//!                 │ Embedder  │──▶│ Phrase    │──▶│ analysis_summary │
//!                 │           │   │ Clusterer │   │ (per product)    │
//!                 └───────────┘   └───────────┘   └──────────────────┘
//! ```
//!
//! Each review is analyzed at most once, across any number of runs: a review
//! is "pending" precisely while it has no `review_analysis` row, and that row
//! is write-once. Summaries are recomputed from the full analysis set on
//! every run, so they are always consistent with the facts.
//!
//! ## Quick Start
//!
//! ```bash
//! rlens init                             # create database
//! rlens run export.json --product 8883139  # ingest + analyze + summarize
//! rlens summary 8883139                  # print the ranked themes
//! rlens serve                            # summaries over HTTP
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and the feature-category vocabulary |
//! | [`loader`] | Review-export JSON parsing |
//! | [`store`] | Store contracts over the three tables |
//! | [`extractor`] | Opinion extraction boundary (Ollama, OpenAI) |
//! | [`embedding`] | Embedding boundary (Ollama, OpenAI) |
//! | [`cluster`] | Semantic phrase clustering and ranking |
//! | [`summarize`] | Per-product summary recomputation |
//! | [`pipeline`] | Run orchestration and reporting |
//! | [`server`] | Read-only HTTP query surface |
//! | [`report`] | Summary lookup shared by CLI and server |
//! | [`stats`] | Database progress overview |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod cluster;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extractor;
pub mod loader;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod server;
pub mod stats;
pub mod store;
pub mod summarize;

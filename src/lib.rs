//! # keepsake
//!
//! Batch ingestion of a personal document archive: letters, diaries, memos
//! and notes in `.txt`, `.md`, `.doc` and `.docx`.
//!
//! Each run walks the source tree, extracts plain text, infers when every
//! document was written, sorts it into thematic routes (and mood tags),
//! layers human corrections from `overrides.json` on top, and writes a set of
//! deterministic artifacts for the viewers to read.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌────────┐   ┌──────────┐   ┌───────────┐   ┌──────────┐
//! │  Walker  │──▶│ Extract  │──▶│ Dates  │──▶│ Classify │──▶│ Overrides │──▶│  Export  │
//! │ fs + aux │   │ txt/docx │   │        │   │ + policy │   │  + ids    │   │ JSON/txt │
//! └──────────┘   └──────────┘   └────────┘   └──────────┘   └───────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and settings resolution |
//! | [`error`] | Fatal error taxonomy |
//! | [`models`] | Core data types and artifact payloads |
//! | [`collate`] | Natural, case-insensitive ordering |
//! | [`connector_fs`] | Filesystem walker |
//! | [`extract`] | Text extraction and the converter seam |
//! | [`dates`] | Date inference |
//! | [`classify`] | Route and mood classification |
//! | [`policy`] | Project-specific classification rules |
//! | [`overrides`] | Human-authored corrections |
//! | [`ids`] | Stable document ids |
//! | [`export`] | Artifact writer |
//! | [`ingest`] | Pipeline orchestration |
//! | [`progress`] | Progress reporting |

pub mod classify;
pub mod collate;
pub mod config;
pub mod connector_fs;
pub mod dates;
pub mod error;
pub mod export;
pub mod extract;
pub mod ids;
pub mod ingest;
pub mod models;
pub mod overrides;
pub mod policy;
pub mod progress;

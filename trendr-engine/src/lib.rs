//! Hot-topic aggregation engine
//!
//! Turns raw per-source rank snapshots into weighted keyword-group
//! statistics plus new-title deltas, and packs the resulting report into
//! byte-bounded message batches per push channel.

pub mod batch;
pub mod diagnostics;
pub mod matcher;
pub mod new_items;
pub mod pipeline;
pub mod report;
pub mod scoring;
pub mod title_store;

pub use diagnostics::{Diagnostic, Diagnostics};
pub use pipeline::{Pipeline, RunInput, RunOutcome};
pub use report::ReportData;
pub use title_store::RawTitle;

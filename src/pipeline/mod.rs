//! Pipeline entry points built on the sources and the repository.
//!
//! - `refresh`: Fetch every source and store the combined batch
//! - `cache`: Serve recent fetches without re-scraping
//! - `answer`: Route interpreted free-text queries to storage

pub mod answer;
pub mod cache;
pub mod refresh;

pub use answer::{Intent, Interpretation, QueryInterpreter, answer_query, format_river_report};
pub use cache::{Snapshot, SnapshotCache};
pub use refresh::{RefreshOutcome, RefreshReport, Refresher};

//! Output generation modules for CSV, JSON, and Markdown.
//!
//! # Submodules
//!
//! - [`csv`]: Reads and writes article datasets (the interchange format)
//! - [`json`]: Writes stats snapshots and query results
//! - [`markdown`]: Renders the dataset report and query tables
//!
//! # Output Structure
//!
//! ```text
//! data/
//! ├── sources/
//! │   ├── kenya-national-highways-authority.csv   # One file per source
//! │   └── ghana-news-agency.csv
//! ├── combined_data.csv                           # Merged + categorized dataset
//! └── report/
//!     ├── report.md                               # Overview, breakdowns, latest articles
//!     └── stats.json                              # Same numbers, machine-readable
//! ```

pub mod csv;
pub mod json;
pub mod markdown;

//! # Tools
//!
//! External collaborators a work-plan step may declare in `required_tools`.
//!
//! - `search` - web search used to augment a step's instruction
//! - `spreadsheet` - spreadsheet generation driven by a tool-call loop

pub mod search;
pub mod spreadsheet;

pub use search::{SearchResponse, SearchResult, SearxngSearch, WebSearch};
pub use spreadsheet::{CsvBundleWriter, Sheet, SpreadsheetGenerator, SpreadsheetOutput};

/// Tool tag: issue one web search before the step runs
pub const WEB_SEARCH: &str = "web_search";
/// Tool tag: produce a spreadsheet artifact through the tool-call loop
pub const SPREADSHEET: &str = "spreadsheet";
/// Tool tag: the step reads externally parsed documents from the base context
pub const DOCUMENT_PARSE: &str = "document_parse";

//! Built-in tools, seeded into the registry as tool capabilities at
//! startup.

mod browser;
mod glob;
mod grep;
mod http;
mod json_parse;
mod knowledge;
mod list_directory;
mod messaging;
mod read_file;
mod run_command;
mod search;
mod write_file;

pub use browser::HeadlessBrowserTool;
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use http::{HtmlScraperTool, HttpGetTool};
pub use json_parse::JsonParseTool;
pub use knowledge::KnowledgeQueryTool;
pub use list_directory::ListDirectoryTool;
pub use messaging::MessagingSinkTool;
pub use read_file::ReadFileTool;
pub use run_command::RunCommandTool;
pub use search::SearchTool;
pub use write_file::WriteFileTool;

//! Nutriscan Tools
//!
//! Tool implementations behind the MCP server and the CLI.

pub mod estimate;
pub mod reference;
pub mod status;

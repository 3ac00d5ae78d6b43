//! Command line interface for the `alice` tool.

pub mod commands;

//! Integration tests for the orgtree hierarchy index

mod cli_commands;
mod merge_queue;
mod properties;
mod scenarios;

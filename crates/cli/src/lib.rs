//! The `codeloop` command line front end.

pub mod bootstrap;
pub mod cli;

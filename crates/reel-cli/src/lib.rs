//! Argument surface for the `reel` binary, exposed for parsing tests.

pub mod cli_args;

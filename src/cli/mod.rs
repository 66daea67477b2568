//! # CLI Module
//!
//! Command-line front end of the scaffolder.
//!
//! ```bash
//! openapi-glue-gen [-p <name>] [-b <dir>] [-c] [-l] <specification>
//! ```
//!
//! Options:
//! - `-p, --project-name <NAME>` - Project name (default: `generated-project`)
//! - `-b, --base-dir <DIR>` - Directory the project is created in (default: `.`)
//! - `-c, --checksum-only` - Print a JSON manifest of file checksums, write nothing
//! - `-l, --local-plugin` - Depend on this checkout of openapi-glue by path
//!
//! Any usage or generation error prints its message to standard output and
//! exits with status 1.
//!
//! ## Usage from Code
//!
//! ```rust,ignore
//! use openapi_glue::cli::{run_cli, Cli};
//! use clap::Parser;
//!
//! let cli = Cli::parse();
//! run_cli(&cli)?;
//! ```

mod commands;


pub use commands::{main_with_args, run_cli, Cli, CliOutput};

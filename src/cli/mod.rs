//! # CLI Module
//!
//! The `apistream` binary works on line-schema files without registering any route.
//!
//! ## Commands
//!
//! ### `compile`
//!
//! Print what a line schema compiles to: the derived JSON Schema, the default
//! document and the coercion table.
//!
//! ```bash
//! apistream compile --schema ad_list.in --direction in
//! ```
//!
//! ### `check`
//!
//! Run a JSON document through merge-defaults, validation and coercion and print the
//! result. A rejected document prints the error envelope and exits with status 1.
//!
//! ```bash
//! echo '{"title":"promo","size":"5"}' | apistream check --schema ad_list.in --input -
//! ```
//!
//! ## Usage from Code
//!
//! ```rust,ignore
//! use apistream::cli::{run_cli, Cli};
//! use clap::Parser;
//!
//! let outcome = run_cli(Cli::parse(), &mut std::io::stdout())?;
//! ```

mod commands;


pub use commands::{check_document, compile_report, run_cli, Cli, Commands, Outcome};

//! # CLI Module
//!
//! The `dyndispatch` binary.
//!
//! ```bash
//! # Serve the bundled handlers
//! dyndispatch serve --config config/config.yaml --addr 127.0.0.1:8080
//!
//! # Show the handler/action table
//! dyndispatch routes
//!
//! # Dispatch one path without starting a server
//! dyndispatch dispatch /dynamic/account/photo/1045.jpg --attempts 3
//! ```

mod commands;


pub use commands::{render_routes, run_cli, Cli, Commands};

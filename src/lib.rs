//! # dyndispatch
//!
//! **dyndispatch** maps request paths to handler actions by name at runtime.
//! A path such as `/dynamic/account/photo/1045.jpg` names a handler
//! (`account` → `AccountController`), an action on it (`photo`) and an
//! argument (`1045`). Handlers are registered once at startup with their
//! constructor dependencies and action table; each request gets a fresh
//! instance built from the shared service registry.
//!
//! ## Architecture
//!
//! - **[`dispatcher`]** - Path decoding, type resolution, activation,
//!   invocation and result unification
//! - **[`server`]** - HTTP server on `may_minihttp`, with a stage pipeline
//!   whose dynamic dispatch stage falls through when a path does not apply
//! - **[`middleware`]** - Request hooks for tracing and metrics
//! - **[`config`]** - YAML configuration with `DYND_*` overrides
//! - **[`runtime_config`]** - Coroutine stack size and tokio worker settings
//! - **[`logging`]** - `tracing-subscriber` setup
//! - **[`retry`]** - Bounded retry for callers of the dispatcher
//! - **[`demo`]** - The handlers served by the `dyndispatch` binary
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as AppService<br/>(may coroutine)
//!     participant Pipeline as Pipeline<br/>(tokio)
//!     participant Stage as DynamicDispatchStage
//!     participant Dispatcher
//!     participant Handler
//!
//!     Client->>Server: GET /dynamic/account/photo/1045.jpg
//!     Server->>Pipeline: spawn handle(request)
//!     Pipeline->>Stage: process(request)
//!     Stage->>Dispatcher: dispatch_path::<Vec<u8>>(path)
//!     Dispatcher->>Dispatcher: decode, resolve_type, activate
//!     Dispatcher->>Handler: photo(["1045"])
//!     Handler-->>Dispatcher: realized or pending value
//!     Dispatcher-->>Stage: Completed(bytes)
//!     Stage-->>Pipeline: Respond(200 image/jpeg)
//!     Pipeline-->>Server: response over may channel
//!     Server-->>Client: 200 OK
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cargo run --bin dyndispatch -- serve --config config/config.yaml
//! curl -o photo.jpg http://127.0.0.1:8080/dynamic/account/photo/1045.jpg
//! ```

pub mod cli;
pub mod config;
pub mod demo;
pub mod dispatcher;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod retry;
pub mod runtime_config;
pub mod server;

pub use config::{ConfigError, DispatchConfig};
pub use dispatcher::{DispatchError, DispatchOutcome, Dispatcher};
pub use ids::RequestId;
pub use retry::RetryPolicy;

//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `serve`  | `Serve`          |
//! | `run`    | `Run`            |
//! | `config` | `CheckConfig`    |

pub mod config;
pub mod run;
pub mod serve;

pub use config::cmd_check_config;
pub use run::cmd_run;
pub use serve::cmd_serve;

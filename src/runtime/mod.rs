//! Application lifecycle and execution modes
//!
//! - `lifetime`: 启动装配与优雅关闭
//! - `modes`: HTTP 服务与一次性维护命令

pub mod lifetime;
pub mod modes;

pub use modes::{run_command, run_server};

//! Mode routing
//!
//! `serve` 启动 HTTP 服务，其余子命令执行一次后退出。

pub mod maintenance;
pub mod server;

pub use maintenance::run_command;
pub use server::run_server;

//! 外部世界的接口：进程执行、命令白名单、端口探测、网页搜索

pub mod net;
pub mod runner;
pub mod shell;
pub mod web;

pub use runner::{split_args, CommandRunner, HealingRunner, ProcessRunner, RunOutput};
pub use shell::CommandPolicy;
pub use web::{SearchHit, WebClient, WebSource};

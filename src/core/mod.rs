//! 核心层：错误类型、输入清洗、命令路由、会话状态、关闭信号与主控循环

pub mod agent;
pub mod error;
pub mod input;
pub mod router;
pub mod session;
pub mod shutdown;

pub use agent::{Agent, BuildReport, Repair, Reply};
pub use error::{AgentError, Result};
pub use router::{route, Command};
pub use session::Session;
pub use shutdown::{ShutdownManager, ShutdownReason};

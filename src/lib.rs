//! Mason - 自学习的应用构建智能体
//!
//! 模块划分：
//! - **catalog**: 生成器定义目录（内置模板、未知短语脚手架）
//! - **resolver**: 意图解析（同义词缓存 → 关键词规则 → 相似度 → 脚手架）
//! - **tools**: 外部进程执行、命令白名单、端口探测、联网搜索
//! - **heal**: 失败分类与自愈规则、联网研究与离线知识
//! - **artifact**: Web 宿主、控制台程序、样式引擎
//! - **selftest**: 产物自测（HTTP 轮询、控件检查、控制台输出核对）
//! - **memory**: 工作区持久化（同义词、hint、知识库、进度、课程）
//! - **core**: 错误、输入清洗、路由、会话、主控循环
//! - **integrations**: 本机控制面板
//! - **config** / **observability**: 配置加载与日志

pub mod artifact;
pub mod catalog;
pub mod config;
pub mod core;
pub mod heal;
pub mod integrations;
pub mod memory;
pub mod observability;
pub mod resolver;
pub mod selftest;
pub mod tools;

//! 外部入口：本机 HTTP 控制面板

pub mod panel;

pub use panel::{router, serve, PanelState};

//! 生成物：Web 宿主、控制台项目、风格注入

pub mod console;
pub mod host;
pub mod style;

pub use console::{expected_output, ConsoleBuilder, ConsoleOutcome, LAST_CONSOLE_FILE};
pub use host::{sanitize_id, write_files, HostedApp, WebHost, LAST_URL_FILE, PLAYGROUND_DIR};
pub use style::{StyleProfile, StyleStore};

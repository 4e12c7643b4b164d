//! 安全命令白名单：只允许配置中的命令名（首词，如 dotnet、npm、npx），禁止控制/重定向字符
//!
//! 联网诊断挖到的命令行必须先过这里才会被执行。

use std::collections::HashSet;

/// 控制与重定向字符：出现任意一个即拒绝
const FORBIDDEN_CHARS: &[char] = &[';', '&', '|', '<', '>', '`', '$'];

/// 即使首词在白名单中也拒绝的子串
const FORBIDDEN_SUBSTR: &[&str] = &["rm -rf", "rm -fr", "curl | sh", "chmod 777", "mkfs", "dd if="];

#[derive(Debug, Clone)]
pub struct CommandPolicy {
    allowed: HashSet<String>,
}

impl CommandPolicy {
    pub fn new(allowed_commands: &[String]) -> Self {
        Self {
            allowed: allowed_commands.iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    /// 只取第一个 token 作为命令名
    pub fn command_name(raw: &str) -> &str {
        raw.split_whitespace().next().unwrap_or("")
    }

    pub fn check(&self, raw: &str) -> Result<(), String> {
        let raw = raw.trim();
        if let Some(c) = raw.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
            return Err(format!("Forbidden character: {}", c));
        }
        let lower = raw.to_lowercase();
        for forbidden in FORBIDDEN_SUBSTR {
            if lower.contains(forbidden) {
                return Err(format!("Forbidden pattern: {}", forbidden));
            }
        }
        let name = Self::command_name(&lower);
        if name.is_empty() {
            return Err("Empty command".to_string());
        }
        if self.allowed.contains(name) {
            return Ok(());
        }
        Err(format!("Command '{}' not in allowlist", name))
    }

    pub fn is_safe(&self, raw: &str) -> bool {
        self.check(raw).is_ok()
    }

    /// 拆成 (工具, 参数串)，不安全时返回 None
    pub fn split<'a>(&self, raw: &'a str) -> Option<(&'a str, &'a str)> {
        if !self.is_safe(raw) {
            return None;
        }
        let raw = raw.trim();
        let tool = Self::command_name(raw);
        Some((tool, raw[tool.len()..].trim()))
    }
}

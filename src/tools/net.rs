//! 本地端口探测

use std::net::{Ipv4Addr, TcpListener};

/// 能在 127.0.0.1 上绑定即视为空闲
pub fn is_free(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
}

/// 从 start 起向上探测 attempts 个端口（跳过 exclude），都被占用时交给系统分配
pub fn find_free(start: u16, attempts: u16, exclude: &[u16]) -> u16 {
    for offset in 0..attempts {
        let Some(port) = start.checked_add(offset) else {
            break;
        };
        if port != 0 && !exclude.contains(&port) && is_free(port) {
            return port;
        }
    }
    loop {
        let assigned = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .and_then(|l| l.local_addr())
            .map(|a| a.port())
            .unwrap_or(0);
        if assigned != 0 && !exclude.contains(&assigned) {
            return assigned;
        }
        if assigned == 0 {
            // 连系统分配都失败时只能原样返回起点
            return start;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_port_is_not_free_and_is_skipped() {
        let held = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = held.local_addr().unwrap().port();
        assert!(!is_free(port));
        let chosen = find_free(port, 5, &[]);
        assert_ne!(chosen, port);
    }

    #[test]
    fn test_excluded_ports_are_never_returned() {
        let held = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = held.local_addr().unwrap().port();
        drop(held);
        let chosen = find_free(port, 1, &[port]);
        assert_ne!(chosen, port);
        assert_ne!(chosen, 0);
    }
}

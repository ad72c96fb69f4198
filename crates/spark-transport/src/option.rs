use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 出站套接字选项。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 统一描述建连前后需要设置的内核参数，配置文件与代码使用同一结构；
/// - `None` 表示保持操作系统默认值，避免无意覆盖内核调优结果。
///
/// ## 默认值（What）
/// - `TCP_NODELAY`、`SO_KEEPALIVE`、`SO_REUSEADDR` 开启；
/// - 建连超时 3 秒；
/// - 写水位线 32 KiB / 64 KiB，供传输实现做写入背压提示。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketOptions {
    tcp_nodelay: bool,
    keep_alive: bool,
    reuse_address: bool,
    allow_half_closure: bool,
    send_buffer_size: Option<u32>,
    recv_buffer_size: Option<u32>,
    linger_ms: Option<u64>,
    ip_tos: Option<u32>,
    write_buffer_low_water_mark: usize,
    write_buffer_high_water_mark: usize,
    connect_timeout_ms: u64,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            tcp_nodelay: true,
            keep_alive: true,
            reuse_address: true,
            allow_half_closure: false,
            send_buffer_size: None,
            recv_buffer_size: None,
            linger_ms: None,
            ip_tos: None,
            write_buffer_low_water_mark: 32 * 1024,
            write_buffer_high_water_mark: 64 * 1024,
            connect_timeout_ms: 3_000,
        }
    }
}

impl SocketOptions {
    /// 是否关闭 Nagle 算法。
    pub fn tcp_nodelay(&self) -> bool {
        self.tcp_nodelay
    }

    /// 设置 `TCP_NODELAY`。
    pub fn set_tcp_nodelay(&mut self, value: bool) -> &mut Self {
        self.tcp_nodelay = value;
        self
    }

    /// 是否开启 `SO_KEEPALIVE`。
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// 设置 `SO_KEEPALIVE`。
    pub fn set_keep_alive(&mut self, value: bool) -> &mut Self {
        self.keep_alive = value;
        self
    }

    /// 是否开启 `SO_REUSEADDR`。
    pub fn reuse_address(&self) -> bool {
        self.reuse_address
    }

    /// 设置 `SO_REUSEADDR`。
    pub fn set_reuse_address(&mut self, value: bool) -> &mut Self {
        self.reuse_address = value;
        self
    }

    /// 对端关闭写方向后是否保留本端写方向。
    pub fn allow_half_closure(&self) -> bool {
        self.allow_half_closure
    }

    /// 设置半关闭策略。
    pub fn set_allow_half_closure(&mut self, value: bool) -> &mut Self {
        self.allow_half_closure = value;
        self
    }

    /// `SO_SNDBUF`。
    pub fn send_buffer_size(&self) -> Option<u32> {
        self.send_buffer_size
    }

    /// 设置 `SO_SNDBUF`。
    pub fn set_send_buffer_size(&mut self, value: Option<u32>) -> &mut Self {
        self.send_buffer_size = value;
        self
    }

    /// `SO_RCVBUF`。
    pub fn recv_buffer_size(&self) -> Option<u32> {
        self.recv_buffer_size
    }

    /// 设置 `SO_RCVBUF`。
    pub fn set_recv_buffer_size(&mut self, value: Option<u32>) -> &mut Self {
        self.recv_buffer_size = value;
        self
    }

    /// `SO_LINGER`。
    pub fn linger(&self) -> Option<Duration> {
        self.linger_ms.map(Duration::from_millis)
    }

    /// 设置 `SO_LINGER`。
    pub fn set_linger(&mut self, value: Option<Duration>) -> &mut Self {
        self.linger_ms = value.map(duration_to_millis);
        self
    }

    /// `IP_TOS`。
    pub fn ip_tos(&self) -> Option<u32> {
        self.ip_tos
    }

    /// 设置 `IP_TOS`。
    pub fn set_ip_tos(&mut self, value: Option<u32>) -> &mut Self {
        self.ip_tos = value;
        self
    }

    /// 写缓冲低水位线。
    pub fn write_buffer_low_water_mark(&self) -> usize {
        self.write_buffer_low_water_mark
    }

    /// 写缓冲高水位线。
    pub fn write_buffer_high_water_mark(&self) -> usize {
        self.write_buffer_high_water_mark
    }

    /// 设置写缓冲水位线；`low` 大于 `high` 时以 `high` 为准。
    pub fn set_write_buffer_water_marks(&mut self, low: usize, high: usize) -> &mut Self {
        self.write_buffer_high_water_mark = high;
        self.write_buffer_low_water_mark = low.min(high);
        self
    }

    /// 建连超时。
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// 设置建连超时。
    pub fn set_connect_timeout(&mut self, value: Duration) -> &mut Self {
        self.connect_timeout_ms = duration_to_millis(value);
        self
    }
}

fn duration_to_millis(value: Duration) -> u64 {
    u64::try_from(value.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_outbound_profile() {
        let options = SocketOptions::default();
        assert!(options.tcp_nodelay());
        assert!(options.keep_alive());
        assert!(options.reuse_address());
        assert!(!options.allow_half_closure());
        assert_eq!(options.connect_timeout(), Duration::from_secs(3));
        assert_eq!(options.linger(), None);
    }

    #[test]
    fn water_marks_keep_low_below_high() {
        let mut options = SocketOptions::default();
        options.set_write_buffer_water_marks(10, 4);
        assert_eq!(options.write_buffer_low_water_mark(), 4);
        assert_eq!(options.write_buffer_high_water_mark(), 4);
    }
}

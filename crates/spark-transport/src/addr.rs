use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// 尚未解析的远端地址：主机名（或 IP 字面量）+ 端口。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 连接注册表与连接池以“逻辑远端”为键，而 DNS 解析结果可能随时间变化，不能作为身份；
/// - 主机名以 `Arc<str>` 保存，克隆只增加引用计数，适合在多张表之间共享。
///
/// ## 合同（What）
/// - 相等与哈希按 `(host, port)` 比较，主机名大小写敏感；
/// - `Display` 输出 `host:port`，IPv6 字面量带方括号，可经 [`FromStr`] 还原。
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnresolvedAddress {
    host: Arc<str>,
    port: u16,
}

impl UnresolvedAddress {
    /// 以主机与端口构造地址。
    pub fn new(host: impl Into<Arc<str>>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// 主机名或 IP 字面量。
    pub fn host(&self) -> &str {
        &self.host
    }

    /// 端口。
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for UnresolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Debug for UnresolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for UnresolvedAddress {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TransportError::InvalidAddress {
            address: s.to_owned(),
        };
        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        let host = match host.strip_prefix('[') {
            Some(rest) => rest.strip_suffix(']').ok_or_else(invalid)?,
            None if host.contains(':') => return Err(invalid()),
            None => host,
        };
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }
}

impl From<SocketAddr> for UnresolvedAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let addr: UnresolvedAddress = "service.local:8080".parse().expect("合法地址");
        assert_eq!(addr.host(), "service.local");
        assert_eq!(addr.port(), 8080);
        assert_eq!(addr.to_string(), "service.local:8080");

        let v6: UnresolvedAddress = "[::1]:9000".parse().expect("IPv6 字面量");
        assert_eq!(v6.host(), "::1");
        assert_eq!(v6.to_string(), "[::1]:9000");
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        for input in ["no-port", ":80", "host:99999", "::1:80", "[::1:80", "host:"] {
            let err = input.parse::<UnresolvedAddress>().expect_err(input);
            assert_eq!(err.code(), "spark.transport.invalid_address", "输入 {input}");
        }
    }

    #[test]
    fn socket_addr_conversion_keeps_identity() {
        let socket: SocketAddr = "127.0.0.1:7000".parse().unwrap();
        let addr = UnresolvedAddress::from(socket);
        assert_eq!(addr, UnresolvedAddress::new("127.0.0.1", 7000));
    }
}

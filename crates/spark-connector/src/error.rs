use std::time::Duration;

use spark_transport::{TransportError, UnresolvedAddress};
use thiserror::Error;

/// 连接池错误。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PoolError {
    /// 在等待预算内没有可用连接。
    #[error("no available connection to {address} after waiting {waited:?}")]
    NoAvailableConnection {
        /// 远端地址。
        address: UnresolvedAddress,
        /// 实际等待时长。
        waited: Duration,
    },
}

impl PoolError {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            PoolError::NoAvailableConnection { .. } => "spark.connector.pool.no_available_connection",
        }
    }
}

/// 连接器错误。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectorError {
    /// 同步建连失败。
    #[error("connect to {address} failed")]
    ConnectFailed {
        /// 远端地址。
        address: UnresolvedAddress,
        /// 底层传输错误。
        #[source]
        source: TransportError,
    },
    /// 连接器已关闭。
    #[error("connector has been shut down")]
    Shutdown,
}

impl ConnectorError {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ConnectorError::ConnectFailed { .. } => "spark.connector.connect_failed",
            ConnectorError::Shutdown => "spark.connector.shutdown",
        }
    }
}

/// 配置解析错误。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// TOML 语法或字段类型错误。
    #[error("invalid connector config: {source}")]
    Parse {
        /// 底层解析错误。
        #[from]
        source: toml::de::Error,
    },
    /// 字段取值越界。
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// 字段路径。
        field: &'static str,
        /// 失败原因。
        reason: &'static str,
    },
}

impl ConfigError {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Parse { .. } => "spark.connector.config.parse_failed",
            ConfigError::InvalidValue { .. } => "spark.connector.config.invalid_value",
        }
    }
}

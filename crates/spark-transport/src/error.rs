use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::channel::ChannelId;
use spark_codec_frame::FrameError;

/// 传输层错误。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 上层需要区分“可以重试”的网络故障与“重试也无意义”的配置错误；
/// - 每个变体携带稳定错误码，日志与告警按码聚合而非按文案。
///
/// ## 契约说明（What）
/// - [`TransportError::code`] 返回 `spark.transport.*` 命名空间下的稳定字符串；
/// - [`TransportError::is_retryable`] 对建连失败、超时与 IO 故障返回 `true`。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// 建连失败。
    #[error("connect to {address} failed: {source}")]
    ConnectFailed {
        /// 远端地址。
        address: String,
        /// 底层 IO 错误。
        #[source]
        source: io::Error,
    },
    /// 建连超时。
    #[error("connect to {address} timed out after {timeout:?}")]
    ConnectTimeout {
        /// 远端地址。
        address: String,
        /// 超时阈值。
        timeout: Duration,
    },
    /// 地址无法解析。
    #[error("invalid address `{address}`")]
    InvalidAddress {
        /// 原始输入。
        address: String,
    },
    /// 通道已关闭。
    #[error("channel {id} is closed")]
    ChannelClosed {
        /// 通道标识。
        id: ChannelId,
    },
    /// 定时器已停止。
    #[error("timer has been stopped")]
    TimerStopped,
    /// 分帧失败。
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// 其他 IO 故障。
    #[error("{operation} failed: {source}")]
    Io {
        /// 操作名。
        operation: &'static str,
        /// 底层 IO 错误。
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            TransportError::ConnectFailed { .. } => "spark.transport.connect_failed",
            TransportError::ConnectTimeout { .. } => "spark.transport.connect_timeout",
            TransportError::InvalidAddress { .. } => "spark.transport.invalid_address",
            TransportError::ChannelClosed { .. } => "spark.transport.channel_closed",
            TransportError::TimerStopped => "spark.transport.timer_stopped",
            TransportError::Frame(err) => err.code(),
            TransportError::Io { .. } => "spark.transport.io_failed",
        }
    }

    /// 是否值得重试。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectFailed { .. }
                | TransportError::ConnectTimeout { .. }
                | TransportError::Io { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_retry_policy() {
        let refused = TransportError::ConnectFailed {
            address: "127.0.0.1:1".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(refused.code(), "spark.transport.connect_failed");
        assert!(refused.is_retryable());

        let frame = TransportError::from(FrameError::FrameTooLarge { length: 9, max: 8 });
        assert_eq!(frame.code(), "spark.codec.frame.too_large");
        assert!(!frame.is_retryable());
        assert!(!TransportError::TimerStopped.is_retryable());
    }
}

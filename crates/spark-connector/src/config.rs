//! 连接器配置。
//!
//! 所有时长字段以毫秒整数表达（`*_ms`），缺省字段取内置默认值。
//!
//! ```toml
//! [pool]
//! capacity = 4
//! acquire_timeout_ms = 3000
//!
//! [watchdog]
//! backoff_step_ms = 200
//!
//! [socket]
//! connect_timeout_ms = 3000
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use spark_codec_frame::DEFAULT_MAX_FRAME_LENGTH;
use spark_transport::SocketOptions;

use crate::error::ConfigError;
use crate::watchdog::ReconnectBackoff;

/// 连接器总配置。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// 连接池参数。
    pub pool: PoolConfig,
    /// 看门狗参数。
    pub watchdog: WatchdogConfig,
    /// 套接字选项。
    pub socket: SocketOptions,
    /// 分帧参数。
    pub frame: FrameConfig,
}

impl ConnectorConfig {
    /// 从 TOML 文本解析并校验。
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验字段取值。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.poll_window_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pool.poll_window_ms",
                reason: "must be greater than zero",
            });
        }
        if self.pool.capacity == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "pool.capacity",
                reason: "must be greater than zero",
            });
        }
        if self.watchdog.backoff_max_steps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "watchdog.backoff_max_steps",
                reason: "must be greater than zero",
            });
        }
        if self.watchdog.notify_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "watchdog.notify_queue_capacity",
                reason: "must be greater than zero",
            });
        }
        if self.frame.max_frame_length < spark_codec_frame::HEADER_LENGTH {
            return Err(ConfigError::InvalidValue {
                field: "frame.max_frame_length",
                reason: "must cover the frame header",
            });
        }
        Ok(())
    }
}

/// 连接池参数。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// 期望的连接数上限；缺省表示不限。
    pub capacity: Option<usize>,
    /// 预热时长。
    pub warm_up_ms: u64,
    /// 连接全部丢失后到失联截止时间的间隔。
    pub loss_interval_ms: u64,
    /// `next()` 单次等待窗口。
    pub poll_window_ms: u64,
    /// `next()` 的总等待预算；缺省表示一直等待到有连接为止。
    pub acquire_timeout_ms: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            warm_up_ms: 600_000,
            loss_interval_ms: 300_000,
            poll_window_ms: 1_000,
            acquire_timeout_ms: None,
        }
    }
}

impl PoolConfig {
    /// 容量；不限时为 `usize::MAX`。
    pub fn capacity(&self) -> usize {
        self.capacity.unwrap_or(usize::MAX)
    }

    /// 预热时长。
    pub fn warm_up(&self) -> Duration {
        Duration::from_millis(self.warm_up_ms)
    }

    /// 失联间隔。
    pub fn loss_interval(&self) -> Duration {
        Duration::from_millis(self.loss_interval_ms)
    }

    /// 等待窗口。
    pub fn poll_window(&self) -> Duration {
        Duration::from_millis(self.poll_window_ms)
    }

    /// 总等待预算。
    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }
}

/// 看门狗参数。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// 退避步长。
    pub backoff_step_ms: u64,
    /// 退避步数上限。
    pub backoff_max_steps: u32,
    /// 异步通知队列容量。
    pub notify_queue_capacity: usize,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            backoff_step_ms: 200,
            backoff_max_steps: 12,
            notify_queue_capacity: 1_024,
        }
    }
}

impl WatchdogConfig {
    /// 退避策略。
    pub fn backoff(&self) -> ReconnectBackoff {
        ReconnectBackoff::new(
            Duration::from_millis(self.backoff_step_ms),
            self.backoff_max_steps,
        )
    }
}

/// 分帧参数。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// 帧总长上限（头部 + 负载）。
    pub max_frame_length: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

#![deny(unsafe_code)]
#![doc = "spark-connector: 出站连接核心。"]
#![doc = ""]
#![doc = "== 使命概述 =="]
#![doc = "- **Why**：RPC 客户端需要对每个远端地址维持一组长连接，并在断线后自动、有节制地重连。"]
#![doc = "- **What**：[`ConnectionPool`] 负责轮询选路与等待可用，[`ReconnectWatchdog`] 负责断线检测与退避重连，[`ConnectionRegistry`] 负责按地址批量停止重连，[`Connector`] 把三者装配到一起。"]
#![doc = "- **How**：成员集合采用 `ArcSwap` 写时复制，读路径无锁；等待路径使用 `parking_lot` 条件变量并以“需要唤醒”标志省去无人等待时的广播。"]

pub mod clock;
pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod pool;
pub mod registry;
pub mod watchdog;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::{ConnectorConfig, FrameConfig, PoolConfig, WatchdogConfig};
pub use connection::{Connection, ReconnectSwitch};
pub use connector::Connector;
pub use error::{ConfigError, ConnectorError, PoolError};
pub use pool::ConnectionPool;
pub use registry::ConnectionRegistry;
pub use watchdog::{
    ListenerError, ReconnectBackoff, ReconnectListener, ReconnectWatchdog,
    ReconnectWatchdogBuilder, listener_fn,
};

#![deny(unsafe_code)]
#![doc = "spark-transport: 出站连接核心的传输层契约。"]
#![doc = ""]
#![doc = "== 使命概述 =="]
#![doc = "- **Why**：连接池、重连看门狗与注册表只依赖抽象的通道、引导器与定时器，具体 TCP 实现可替换为内存模拟。"]
#![doc = "- **What**：定义 [`Channel`]、[`ChannelHandler`]、[`Bootstrap`]、[`Timer`] 等 trait，以及 [`UnresolvedAddress`]、[`SocketOptions`]、[`TransportError`] 等基础结构。"]
#![doc = "- **How**：所有异步操作以 `BoxFuture<'static, _>` 暴露，调用方可在任意执行器上驱动。"]

pub mod addr;
pub mod bootstrap;
pub mod channel;
pub mod error;
pub mod handler;
pub mod option;
pub mod timer;

pub use addr::UnresolvedAddress;
pub use bootstrap::{Bootstrap, ConnectFuture};
pub use channel::{Channel, ChannelId, ChannelRef, CloseFuture};
pub use error::TransportError;
pub use handler::{ChannelHandler, NoopHandler};
pub use option::SocketOptions;
pub use spark_codec_frame::{FrameCodec, FrameError, FrameHeader, ProtoFrame};
pub use timer::{Timeout, Timer, TimerTask};

/// 传输层内部使用的统一返回别名。
pub type Result<T, E = TransportError> = core::result::Result<T, E>;

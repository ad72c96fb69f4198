use std::sync::Arc;

use futures::future::BoxFuture;

use crate::{Result, addr::UnresolvedAddress, channel::ChannelRef, handler::ChannelHandler};

/// 建连返回的 Future。
pub type ConnectFuture = BoxFuture<'static, Result<ChannelRef>>;

/// 出站连接引导器。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 重连看门狗只需要“按地址发起一次连接”的能力，真实 TCP 与测试用的内存实现都可以满足；
/// - 处理器在建连时注入，通道建立后第一个事件即为 `channel_active`。
///
/// ## 契约说明（What）
/// - 成功时返回的通道已经向 `handler` 投递过 `channel_active`；
/// - 失败时不向 `handler` 投递任何事件；
/// - 实现需允许并发调用，串行化策略由调用方决定。
pub trait Bootstrap: Send + Sync + 'static {
    /// 对 `address` 发起一次连接。
    fn connect(
        &self,
        address: &UnresolvedAddress,
        handler: Arc<dyn ChannelHandler>,
    ) -> ConnectFuture;
}

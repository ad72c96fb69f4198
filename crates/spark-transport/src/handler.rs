use crate::channel::ChannelRef;
use crate::error::TransportError;
use spark_codec_frame::ProtoFrame;

/// 通道生命周期事件的接收方。
///
/// # 契约说明（What）
/// - 同一通道的事件按 `channel_active` → (`channel_read` | `exception_caught`)* → `channel_inactive` 顺序投递；
/// - 建连失败不会产生任何事件，失败结果只通过 [`crate::Bootstrap::connect`] 的返回值体现；
/// - 所有方法默认空实现，处理器只需覆盖关心的事件。
pub trait ChannelHandler: Send + Sync + 'static {
    /// 通道建立。
    fn channel_active(&self, channel: &ChannelRef) {
        let _ = channel;
    }

    /// 通道关闭。
    fn channel_inactive(&self, channel: &ChannelRef) {
        let _ = channel;
    }

    /// 收到一帧。
    fn channel_read(&self, channel: &ChannelRef, frame: ProtoFrame) {
        let _ = (channel, frame);
    }

    /// 通道上出现异常；传输实现随后会关闭通道。
    fn exception_caught(&self, channel: &ChannelRef, error: &TransportError) {
        let _ = (channel, error);
    }
}

/// 忽略所有事件的处理器。
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl ChannelHandler for NoopHandler {}

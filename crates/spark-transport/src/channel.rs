use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::channel::oneshot;
use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::{Result, addr::UnresolvedAddress};
use spark_codec_frame::ProtoFrame;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// 通道标识，进程内单调递增且唯一。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    /// 分配一个新的标识。
    pub fn next() -> Self {
        Self(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// 数值形式。
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({:#010x})", self.0)
    }
}

/// 一条已建立的双向消息通道。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 连接池只需要“身份 + 是否存活 + 关闭通知”三件事即可维护成员集合；
/// - 写入以整帧为单位，编解码细节留在传输实现内部。
///
/// ## 契约说明（What）
/// - `close_future()` 在通道关闭时恰好完成一次，且先于处理器收到 `channel_inactive`；
/// - `close` 幂等，多次调用只触发一次关闭流程；
/// - `write` 在通道已关闭时返回 [`crate::TransportError::ChannelClosed`]。
pub trait Channel: Send + Sync + 'static {
    /// 通道标识。
    fn id(&self) -> ChannelId;

    /// 建连时使用的逻辑远端地址。
    fn remote_address(&self) -> &UnresolvedAddress;

    /// 通道是否仍处于活跃状态。
    fn is_active(&self) -> bool;

    /// 请求关闭通道。
    fn close(&self);

    /// 关闭通知。
    fn close_future(&self) -> &CloseFuture;

    /// 发送一帧。
    fn write(&self, frame: ProtoFrame) -> Result<()>;
}

/// 共享的通道句柄。
pub type ChannelRef = Arc<dyn Channel>;

type CloseHook = Box<dyn FnOnce() + Send + 'static>;

enum CloseState {
    Open(Vec<CloseHook>),
    Closed,
}

/// 通道关闭通知点。
///
/// # 行为概览（How）
/// - 关闭前注册的回调被暂存，[`CloseFuture::complete`] 时按注册顺序在调用线程执行；
/// - 关闭后注册的回调立即在注册线程执行；
/// - 回调在锁外执行，回调内部再次注册不会死锁。
pub struct CloseFuture {
    state: Mutex<CloseState>,
}

impl CloseFuture {
    /// 构造尚未完成的通知点。
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CloseState::Open(Vec::new())),
        }
    }

    /// 注册关闭回调。
    pub fn add_listener<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock();
        match &mut *state {
            CloseState::Open(hooks) => hooks.push(Box::new(hook)),
            CloseState::Closed => {
                drop(state);
                hook();
            }
        }
    }

    /// 标记关闭并触发所有回调；仅首次调用返回 `true`。
    pub fn complete(&self) -> bool {
        let hooks = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, CloseState::Closed) {
                CloseState::Open(hooks) => hooks,
                CloseState::Closed => return false,
            }
        };
        for hook in hooks {
            hook();
        }
        true
    }

    /// 是否已关闭。
    pub fn is_done(&self) -> bool {
        matches!(*self.state.lock(), CloseState::Closed)
    }

    /// 返回一个在关闭时完成的 Future。
    pub fn closed(&self) -> BoxFuture<'static, ()> {
        let (tx, rx) = oneshot::channel::<()>();
        self.add_listener(move || {
            let _ = tx.send(());
        });
        Box::pin(async move {
            let _ = rx.await;
        })
    }
}

impl Default for CloseFuture {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CloseFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseFuture")
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn hooks_fire_exactly_once() {
        let close = CloseFuture::new();
        let fired = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let fired = Arc::clone(&fired);
            close.add_listener(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(close.complete(), "首次完成返回 true");
        assert!(!close.complete(), "重复完成返回 false");
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert!(close.is_done());
    }

    #[test]
    fn late_listener_runs_immediately() {
        let close = CloseFuture::new();
        close.complete();
        let fired = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&fired);
        close.add_listener(move || {
            observed.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1, "关闭后注册的回调应立即执行");
    }

    #[test]
    fn closed_future_resolves_after_complete() {
        let close = Arc::new(CloseFuture::new());
        let waiter = close.closed();
        let trigger = Arc::clone(&close);
        let handle = std::thread::spawn(move || {
            trigger.complete();
        });
        futures::executor::block_on(waiter);
        handle.join().unwrap();
        assert!(close.is_done());
    }

    #[test]
    fn channel_ids_are_unique() {
        let a = ChannelId::next();
        let b = ChannelId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }
}

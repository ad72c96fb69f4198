use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;

use crate::Result;

/// 定时器到期后执行的任务。
pub type TimerTask = BoxFuture<'static, ()>;

/// 一次性延时调度器。
///
/// # 契约说明（What）
/// - `schedule` 在 `delay` 之后驱动 `task`，返回可取消的 [`Timeout`]；
/// - 定时器在 `stop` 之后拒绝新任务并返回 [`crate::TransportError::TimerStopped`]，已登记未到期的任务不再执行；
/// - 到期任务在执行前调用 [`Timeout::mark_fired`]，返回 `false` 时必须跳过。
pub trait Timer: Send + Sync + 'static {
    /// 登记延时任务。
    fn schedule(&self, delay: Duration, task: TimerTask) -> Result<Timeout>;

    /// 停止定时器。
    fn stop(&self);
}

const PENDING: u8 = 0;
const CANCELLED: u8 = 1;
const FIRED: u8 = 2;

/// 延时任务句柄。
///
/// 取消与到期通过一次 CAS 竞争，二者恰有一方成功。
#[derive(Clone)]
pub struct Timeout {
    state: Arc<AtomicU8>,
}

impl Timeout {
    /// 构造处于等待状态的句柄。
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(PENDING)),
        }
    }

    /// 取消任务；任务已执行或已取消时返回 `false`。
    pub fn cancel(&self) -> bool {
        self.state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 标记任务开始执行；已取消时返回 `false`。
    pub fn mark_fired(&self) -> bool {
        self.state
            .compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 是否已取消。
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    /// 是否已执行。
    pub fn is_fired(&self) -> bool {
        self.state.load(Ordering::Acquire) == FIRED
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.load(Ordering::Acquire) {
            PENDING => "pending",
            CANCELLED => "cancelled",
            _ => "fired",
        };
        f.debug_struct("Timeout").field("state", &state).finish()
    }
}

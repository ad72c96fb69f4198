use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use spark_transport::{Timeout, Timer, TimerTask, TransportError};
use tokio::runtime::Handle;
use tokio::sync::watch;

/// 在 Tokio 运行时上调度一次性延时任务的定时器。
///
/// - 每个任务对应一个休眠后执行的 Tokio 任务；
/// - `stop` 通过广播信号让所有未到期任务立即退出，之后的 `schedule` 返回 [`TransportError::TimerStopped`]；
/// - 定时器被丢弃时未到期任务同样被取消。
#[derive(Debug)]
pub struct TokioTimer {
    handle: Handle,
    stopped: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl TokioTimer {
    /// 在指定运行时上构造。
    pub fn new(handle: Handle) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            handle,
            stopped: AtomicBool::new(false),
            shutdown,
        }
    }

    /// 是否已停止。
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Timer for TokioTimer {
    fn schedule(&self, delay: Duration, task: TimerTask) -> Result<Timeout, TransportError> {
        if self.is_stopped() {
            return Err(TransportError::TimerStopped);
        }
        let timeout = Timeout::new();
        let guard = timeout.clone();
        let mut stop = self.shutdown.subscribe();
        self.handle.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let stopped = *stop.borrow();
                    if !stopped && guard.mark_fired() {
                        task.await;
                    }
                }
                _ = stop.changed() => {
                    guard.cancel();
                }
            }
        });
        Ok(timeout)
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            self.shutdown.send_replace(true);
            tracing::debug!(target: "spark.transport.tcp", "timer stopped");
        }
    }
}

use std::thread;

use crossbeam_channel::{Sender, TrySendError};
use parking_lot::Mutex;

pub(crate) type NotifyJob = Box<dyn FnOnce() + Send + 'static>;

/// 看门狗私有的单线程通知队列。
///
/// # 教案级说明
/// - **意图 (Why)**：重连成功的通知可能执行任意用户代码，不能占用完成建连的 I/O 线程；
/// - **契约 (What)**：任务按提交顺序在同一后台线程上执行；队列满时丢弃任务并记录 `warn`；
/// - **实现提示 (How)**：首次提交时才创建线程与有界通道，`shutdown` 丢弃发送端让线程在排空后退出，
///   之后再次提交会重新创建。
pub(crate) struct Notifier {
    capacity: usize,
    sender: Mutex<Option<Sender<NotifyJob>>>,
}

impl Notifier {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            sender: Mutex::new(None),
        }
    }

    /// 提交任务；被丢弃时返回 `false`。
    pub(crate) fn submit(&self, job: NotifyJob) -> bool {
        let mut slot = self.sender.lock();
        if slot.is_none() {
            let (tx, rx) = crossbeam_channel::bounded::<NotifyJob>(self.capacity);
            let spawned = thread::Builder::new()
                .name("spark-watchdog-notify".into())
                .spawn(move || {
                    for job in rx {
                        job();
                    }
                });
            if let Err(error) = spawned {
                tracing::error!(
                    target: "spark.connector.watchdog",
                    %error,
                    "failed to spawn notification worker"
                );
                return false;
            }
            *slot = Some(tx);
        }
        let Some(sender) = slot.as_ref() else {
            return false;
        };
        match sender.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    target: "spark.connector.watchdog",
                    capacity = self.capacity,
                    "notification queue full, dropping reconnect notification"
                );
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                *slot = None;
                false
            }
        }
    }

    /// 关闭后台线程。
    pub(crate) fn shutdown(&self) {
        self.sender.lock().take();
    }

    /// 后台线程的发送端是否存在。
    pub(crate) fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }
}

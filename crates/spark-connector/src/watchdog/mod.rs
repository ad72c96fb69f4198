//! 重连看门狗。
//!
//! # 教案级说明
//! - **意图 (Why)**：长连接断开后需要自动、有节制地重建，重试间隔随失败次数线性增长并封顶；
//! - **契约 (What)**：看门狗绑定唯一的 `(bootstrap, timer, address, pool)`，处于 `STARTED` 时对每次断开
//!   安排一次重连；`stop` 后不再发起新的连接，也不再回调监听器；
//! - **实现提示 (How)**：真实的 `channel_inactive` 事件与建连失败路径共用 [`ReconnectWatchdog`] 内部的
//!   断开转移函数，重试循环因此显式可见，而不是依赖关闭通道后再次触发事件。

mod backoff;
mod notify;

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use spark_codec_frame::ProtoFrame;
use spark_transport::{
    Bootstrap, ChannelHandler, ChannelRef, ConnectFuture, Timeout, Timer, TransportError,
    UnresolvedAddress,
};

use crate::connection::ReconnectSwitch;
use crate::pool::ConnectionPool;

pub use self::backoff::ReconnectBackoff;
use self::notify::Notifier;

const STARTED: u8 = 0;
const STOPPED: u8 = 1;

const DEFAULT_NOTIFY_CAPACITY: usize = 1_024;

/// 监听器返回的错误类型。
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 重连结果监听器。
///
/// - 成功结果在看门狗私有的通知线程上异步投递；
/// - 失败结果在发起重连的线程上同步投递，随后才安排下一次重连；
/// - 返回 `Err` 或发生 panic 只会被记录，不影响其他监听器与看门狗状态。
pub trait ReconnectListener: Send + Sync + 'static {
    /// 一次重连尝试结束。
    fn operation_complete(
        &self,
        success: bool,
        attempts: u32,
        watchdog: &ReconnectWatchdog,
    ) -> Result<(), ListenerError>;
}

impl<F> ReconnectListener for F
where
    F: Fn(bool, u32, &ReconnectWatchdog) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    fn operation_complete(
        &self,
        success: bool,
        attempts: u32,
        watchdog: &ReconnectWatchdog,
    ) -> Result<(), ListenerError> {
        self(success, attempts, watchdog)
    }
}

/// 把闭包包装为监听器。
pub fn listener_fn<F>(f: F) -> Arc<dyn ReconnectListener>
where
    F: Fn(bool, u32, &ReconnectWatchdog) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// [`ReconnectWatchdog`] 构造器。
pub struct ReconnectWatchdogBuilder {
    bootstrap: Arc<dyn Bootstrap>,
    timer: Arc<dyn Timer>,
    address: UnresolvedAddress,
    pool: Option<ConnectionPool>,
    backoff: ReconnectBackoff,
    next_handler: Option<Arc<dyn ChannelHandler>>,
    notify_capacity: usize,
}

impl ReconnectWatchdogBuilder {
    /// 绑定连接池；通道建立后加入该池，池满时不再重连。
    pub fn pool(mut self, pool: ConnectionPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// 退避策略。
    pub fn backoff(mut self, backoff: ReconnectBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// 事件继续转发的下游处理器。
    pub fn next_handler(mut self, handler: Arc<dyn ChannelHandler>) -> Self {
        self.next_handler = Some(handler);
        self
    }

    /// 异步通知队列容量。
    pub fn notify_capacity(mut self, capacity: usize) -> Self {
        self.notify_capacity = capacity;
        self
    }

    /// 构造处于 `STARTED` 状态的看门狗。
    pub fn build(self) -> Arc<ReconnectWatchdog> {
        Arc::new_cyclic(|self_ref| ReconnectWatchdog {
            self_ref: self_ref.clone(),
            bootstrap: self.bootstrap,
            timer: self.timer,
            address: self.address,
            pool: self.pool,
            backoff: self.backoff,
            next_handler: self.next_handler,
            state: AtomicU8::new(STARTED),
            attempts: AtomicU32::new(0),
            listeners: RwLock::new(Vec::new()),
            connect_guard: Mutex::new(()),
            pending: Mutex::new(None),
            notifier: Notifier::new(self.notify_capacity),
        })
    }
}

/// 单条连接的重连监督者。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 把“断开 → 等待 → 重连 → 通知”封装为一个可独立测试的状态机；
/// - 作为 [`ChannelHandler`] 挂在通道上，第一时间感知通道的建立与断开。
///
/// ## 契约说明（What）
/// - `channel_active`：尝试次数清零，通道加入连接池，事件继续下传；
/// - `channel_inactive`：满足重连条件时尝试次数加一并按退避延迟登记定时任务，事件继续下传；
/// - 定时任务到期：重新评估重连条件，不满足则放弃；满足则在互斥锁保护下发起建连；
/// - 重连条件：处于 `STARTED`，且未绑定连接池或连接池成员数小于容量；
/// - 没有最大重试次数，只有通道建立才会清零尝试次数。
///
/// ## 风险提示（Trade-offs）
/// - `stop` 只影响后续调度，已经发出的建连请求不会被中断；
/// - 监听器增删与正在进行的通知并发时，可能漏投或重投一次。
pub struct ReconnectWatchdog {
    self_ref: Weak<ReconnectWatchdog>,
    bootstrap: Arc<dyn Bootstrap>,
    timer: Arc<dyn Timer>,
    address: UnresolvedAddress,
    pool: Option<ConnectionPool>,
    backoff: ReconnectBackoff,
    next_handler: Option<Arc<dyn ChannelHandler>>,
    state: AtomicU8,
    attempts: AtomicU32,
    listeners: RwLock<Vec<Arc<dyn ReconnectListener>>>,
    connect_guard: Mutex<()>,
    pending: Mutex<Option<Timeout>>,
    notifier: Notifier,
}

impl ReconnectWatchdog {
    /// 开始构造看门狗。
    pub fn builder(
        bootstrap: Arc<dyn Bootstrap>,
        timer: Arc<dyn Timer>,
        address: UnresolvedAddress,
    ) -> ReconnectWatchdogBuilder {
        ReconnectWatchdogBuilder {
            bootstrap,
            timer,
            address,
            pool: None,
            backoff: ReconnectBackoff::default(),
            next_handler: None,
            notify_capacity: DEFAULT_NOTIFY_CAPACITY,
        }
    }

    /// 远端地址。
    pub fn remote_address(&self) -> &UnresolvedAddress {
        &self.address
    }

    /// 绑定的连接池。
    pub fn pool(&self) -> Option<&ConnectionPool> {
        self.pool.as_ref()
    }

    /// 退避策略。
    pub fn backoff(&self) -> ReconnectBackoff {
        self.backoff
    }

    /// 自上次建连成功以来的重连次数。
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    /// 是否处于 `STARTED`。
    pub fn is_started(&self) -> bool {
        self.state.load(Ordering::Acquire) == STARTED
    }

    /// 进入 `STARTED`；状态发生变化时返回 `true`。
    pub fn start(&self) -> bool {
        let changed = self.state.swap(STARTED, Ordering::AcqRel) != STARTED;
        if changed {
            tracing::debug!(target: "spark.connector.watchdog", address = %self.address, "watchdog started");
        }
        changed
    }

    /// 进入 `STOPPED`，取消尚未到期的重连并关闭通知线程；状态发生变化时返回 `true`。
    pub fn stop(&self) -> bool {
        let changed = self.state.swap(STOPPED, Ordering::AcqRel) != STOPPED;
        if let Some(pending) = self.pending.lock().take() {
            pending.cancel();
        }
        self.notifier.shutdown();
        if changed {
            tracing::debug!(target: "spark.connector.watchdog", address = %self.address, "watchdog stopped");
        }
        changed
    }

    /// 添加监听器。
    pub fn add_reconnect_listener(&self, listener: Arc<dyn ReconnectListener>) {
        self.listeners.write().push(listener);
    }

    /// 按 `Arc` 身份移除监听器；找到时返回 `true`。
    pub fn remove_reconnect_listener(&self, listener: &Arc<dyn ReconnectListener>) -> bool {
        let target = Arc::as_ptr(listener) as *const ();
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|existing| Arc::as_ptr(existing) as *const () != target);
        listeners.len() != before
    }

    /// 当前是否需要重连。
    pub fn reconnect_needed(&self) -> bool {
        self.is_started()
            && self
                .pool
                .as_ref()
                .is_none_or(|pool| pool.size() < pool.capacity())
    }

    /// 在 `delay` 之后发起一次重连尝试。
    pub fn schedule_reconnect(&self, delay: Duration) -> Result<(), TransportError> {
        let Some(this) = self.self_ref.upgrade() else {
            return Ok(());
        };
        let timeout = self.timer.schedule(delay, Box::pin(this.run_attempt()))?;
        *self.pending.lock() = Some(timeout);
        Ok(())
    }

    /// 立即发起一次建连并等待结果。
    ///
    /// 成功时按重连成功的方式异步通知监听器；失败时只返回错误，不安排重连。
    pub async fn connect_now(self: &Arc<Self>) -> Result<ChannelRef, TransportError> {
        let attempts = self.attempts();
        let channel = self.issue_connect().await?;
        self.notify_success(attempts);
        Ok(channel)
    }

    fn issue_connect(self: &Arc<Self>) -> ConnectFuture {
        let handler: Arc<dyn ChannelHandler> = Arc::clone(self) as Arc<dyn ChannelHandler>;
        let _guard = self.connect_guard.lock();
        self.bootstrap.connect(&self.address, handler)
    }

    async fn run_attempt(self: Arc<Self>) {
        if !self.reconnect_needed() {
            tracing::debug!(
                target: "spark.connector.watchdog",
                address = %self.address,
                started = self.is_started(),
                "reconnect abandoned"
            );
            return;
        }
        let attempts = self.attempts();
        match self.issue_connect().await {
            Ok(channel) => {
                tracing::debug!(
                    target: "spark.connector.watchdog",
                    address = %self.address,
                    channel = %channel.id(),
                    attempts,
                    "reconnected"
                );
                self.notify_success(attempts);
            }
            Err(error) => {
                tracing::warn!(
                    target: "spark.connector.watchdog",
                    address = %self.address,
                    attempts,
                    code = error.code(),
                    %error,
                    "reconnect attempt failed"
                );
                if self.is_started() {
                    self.dispatch(false, attempts);
                }
                self.on_disconnected();
            }
        }
    }

    /// 断开转移：真实的断开事件与建连失败共用。
    fn on_disconnected(&self) {
        if !self.reconnect_needed() {
            tracing::debug!(
                target: "spark.connector.watchdog",
                address = %self.address,
                started = self.is_started(),
                "reconnect not needed"
            );
            return;
        }
        let attempts = self.attempts.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        let delay = self.backoff.delay_for(attempts);
        tracing::debug!(
            target: "spark.connector.watchdog",
            address = %self.address,
            attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "reconnect scheduled"
        );
        if let Err(error) = self.schedule_reconnect(delay) {
            tracing::warn!(
                target: "spark.connector.watchdog",
                address = %self.address,
                code = error.code(),
                %error,
                "failed to schedule reconnect"
            );
        }
    }

    fn notify_success(&self, attempts: u32) {
        // 已停止时不提交，否则通知线程会在 `stop` 之后被重新拉起。
        if !self.is_started() || self.listeners.read().is_empty() {
            return;
        }
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        self.notifier.submit(Box::new(move || {
            if this.is_started() {
                this.dispatch(true, attempts);
            }
        }));
    }

    fn dispatch(&self, success: bool, attempts: u32) {
        let listeners: Vec<Arc<dyn ReconnectListener>> = self.listeners.read().clone();
        for listener in listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                listener.operation_complete(success, attempts, self)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(error)) => tracing::error!(
                    target: "spark.connector.watchdog",
                    address = %self.address,
                    success,
                    attempts,
                    %error,
                    "reconnect listener failed"
                ),
                Err(_) => tracing::error!(
                    target: "spark.connector.watchdog",
                    address = %self.address,
                    success,
                    attempts,
                    "reconnect listener panicked"
                ),
            }
        }
    }
}

impl ChannelHandler for ReconnectWatchdog {
    fn channel_active(&self, channel: &ChannelRef) {
        self.attempts.store(0, Ordering::Release);
        if let Some(pool) = &self.pool {
            pool.add(Arc::clone(channel));
        }
        tracing::debug!(
            target: "spark.connector.watchdog",
            address = %self.address,
            channel = %channel.id(),
            "channel active"
        );
        if let Some(next) = &self.next_handler {
            next.channel_active(channel);
        }
    }

    fn channel_inactive(&self, channel: &ChannelRef) {
        tracing::debug!(
            target: "spark.connector.watchdog",
            address = %self.address,
            channel = %channel.id(),
            "channel inactive"
        );
        self.on_disconnected();
        if let Some(next) = &self.next_handler {
            next.channel_inactive(channel);
        }
    }

    fn channel_read(&self, channel: &ChannelRef, frame: ProtoFrame) {
        if let Some(next) = &self.next_handler {
            next.channel_read(channel, frame);
        }
    }

    fn exception_caught(&self, channel: &ChannelRef, error: &TransportError) {
        tracing::debug!(
            target: "spark.connector.watchdog",
            address = %self.address,
            channel = %channel.id(),
            code = error.code(),
            %error,
            "channel exception"
        );
        if let Some(next) = &self.next_handler {
            next.exception_caught(channel, error);
        }
    }
}

impl ReconnectSwitch for ReconnectWatchdog {
    fn set_reconnect(&self, enabled: bool) {
        if enabled {
            self.start();
        } else {
            self.stop();
        }
    }
}

impl fmt::Debug for ReconnectWatchdog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectWatchdog")
            .field("address", &self.address)
            .field("started", &self.is_started())
            .field("attempts", &self.attempts())
            .field("backoff", &self.backoff)
            .finish()
    }
}

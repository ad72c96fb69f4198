use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering, fence};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use parking_lot::{Condvar, Mutex};
use spark_transport::{ChannelId, ChannelRef, UnresolvedAddress};

use crate::clock::Clock;
use crate::config::PoolConfig;
use crate::error::PoolError;

const NO_DEADLINE: u64 = u64::MAX;

/// 单个远端地址的连接池。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 同一地址的多条长连接由多个 I/O 线程并发增删，而业务线程高频读取做轮询选路；
/// - 读多写少，成员集合采用写时复制：读路径只做一次原子加载，不加锁也不分配。
///
/// ## 架构定位（Architecture）
/// - 由 [`crate::Connector`] 按地址惰性创建，同一地址的所有看门狗共享一个实例；
/// - 看门狗在通道建立时 `add`，通道关闭时由关闭回调自动 `remove`。
///
/// ## 契约说明（What）
/// - 成员按通道标识去重；
/// - `capacity` 只是提示，`add` 不会因超过容量而拒绝，看门狗据此决定是否继续重连；
/// - `next` 返回的通道可能在返回后立即被关闭，调用方需容忍写失败。
///
/// ## 逻辑解析（How）
/// - 成员：`ArcSwap<Vec<ChannelRef>>`，写方 `rcu` 复制后整体替换；
/// - 等待：`Mutex<()>` + `Condvar`。等待方在持锁状态下先置位 `signal_needed` 再复查成员，
///   新增方先发布成员再交换清零 `signal_needed`，两侧之间以 `SeqCst` 栅栏排序，
///   因此“复查为空”与“新增方看到标志为假”不可能同时成立，不会丢失唤醒；
/// - 时间：相对构造时刻的纳秒偏移存入 `AtomicU64`，`u64::MAX` 表示无截止时间。
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    address: UnresolvedAddress,
    clock: Arc<dyn Clock>,
    base: Instant,
    members: ArcSwap<Vec<ChannelRef>>,
    cursor: AtomicUsize,
    capacity: AtomicUsize,
    warm_up_nanos: AtomicU64,
    loss_interval: Duration,
    poll_window: Duration,
    acquire_timeout: Option<Duration>,
    last_change: AtomicU64,
    loss_deadline: AtomicU64,
    signal_needed: AtomicBool,
    lock: Mutex<()>,
    available: Condvar,
}

impl ConnectionPool {
    /// 以默认参数构造。
    pub fn new(address: UnresolvedAddress, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(address, clock, &PoolConfig::default())
    }

    /// 以指定参数构造。
    pub fn with_config(address: UnresolvedAddress, clock: Arc<dyn Clock>, config: &PoolConfig) -> Self {
        let base = clock.now();
        Self {
            inner: Arc::new(PoolInner {
                address,
                clock,
                base,
                members: ArcSwap::from_pointee(Vec::new()),
                cursor: AtomicUsize::new(0),
                capacity: AtomicUsize::new(config.capacity()),
                warm_up_nanos: AtomicU64::new(duration_to_nanos(config.warm_up())),
                loss_interval: config.loss_interval(),
                poll_window: config.poll_window().max(Duration::from_millis(1)),
                acquire_timeout: config.acquire_timeout(),
                last_change: AtomicU64::new(0),
                loss_deadline: AtomicU64::new(NO_DEADLINE),
                signal_needed: AtomicBool::new(false),
                lock: Mutex::new(()),
                available: Condvar::new(),
            }),
        }
    }

    /// 远端地址。
    pub fn remote_address(&self) -> &UnresolvedAddress {
        &self.inner.address
    }

    /// 轮询取出一条连接；为空时按配置的等待策略阻塞。
    ///
    /// 未配置总等待预算时以 `poll_window` 为周期反复等待，直到出现可用连接；
    /// 配置了预算时等价于 [`ConnectionPool::next_timeout`]。
    pub fn next(&self) -> Result<ChannelRef, PoolError> {
        if let Some(timeout) = self.inner.acquire_timeout {
            return self.next_timeout(timeout);
        }
        loop {
            if let Some(channel) = self.try_next() {
                return Ok(channel);
            }
            if !self.wait_for_available(self.inner.poll_window) {
                tracing::trace!(
                    target: "spark.connector.pool",
                    address = %self.inner.address,
                    window = ?self.inner.poll_window,
                    "still waiting for an available connection"
                );
            }
        }
    }

    /// 轮询取出一条连接，总等待时长不超过 `timeout`。
    pub fn next_timeout(&self, timeout: Duration) -> Result<ChannelRef, PoolError> {
        let started = Instant::now();
        loop {
            if let Some(channel) = self.try_next() {
                return Ok(channel);
            }
            let waited = started.elapsed();
            let Some(remaining) = timeout.checked_sub(waited).filter(|d| !d.is_zero()) else {
                return Err(PoolError::NoAvailableConnection {
                    address: self.inner.address.clone(),
                    waited,
                });
            };
            self.wait_for_available(remaining.min(self.inner.poll_window));
        }
    }

    /// 非阻塞地轮询取出一条连接。
    pub fn try_next(&self) -> Option<ChannelRef> {
        let members = self.inner.members.load();
        match members.len() {
            0 => None,
            1 => Some(Arc::clone(&members[0])),
            len => {
                let index = self.inner.cursor.fetch_add(1, Ordering::Relaxed) & (isize::MAX as usize);
                Some(Arc::clone(&members[index % len]))
            }
        }
    }

    /// 加入连接；已是成员时返回 `false`。
    pub fn add(&self, channel: ChannelRef) -> bool {
        let id = channel.id();
        // 先于发布清除截止时间：与之竞争的清空操作总在发布之后写入，不会被覆盖。
        self.inner.loss_deadline.store(NO_DEADLINE, Ordering::SeqCst);
        let mut added = false;
        self.inner.members.rcu(|current| {
            if current.iter().any(|member| member.id() == id) {
                added = false;
                return Arc::clone(current);
            }
            added = true;
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&channel));
            Arc::new(next)
        });
        if !added {
            return false;
        }

        self.inner.touch();

        // 关闭早于注册时回调会立即执行，成员随即被移除。
        let pool: Weak<PoolInner> = Arc::downgrade(&self.inner);
        channel.close_future().add_listener(move || {
            if let Some(inner) = pool.upgrade() {
                ConnectionPool { inner }.remove_by_id(id);
            }
        });

        tracing::debug!(
            target: "spark.connector.pool",
            address = %self.inner.address,
            channel = %id,
            size = self.size(),
            "channel added"
        );

        fence(Ordering::SeqCst);
        if self.inner.signal_needed.swap(false, Ordering::SeqCst) {
            let _guard = self.inner.lock.lock();
            self.inner.available.notify_all();
        }
        true
    }

    /// 移除连接；不是成员时返回 `false`。
    pub fn remove(&self, channel: &ChannelRef) -> bool {
        self.remove_by_id(channel.id())
    }

    fn remove_by_id(&self, id: ChannelId) -> bool {
        let mut removed = false;
        let mut emptied = false;
        self.inner.members.rcu(|current| {
            removed = current.iter().any(|member| member.id() == id);
            if !removed {
                emptied = false;
                return Arc::clone(current);
            }
            let next: Vec<ChannelRef> = current
                .iter()
                .filter(|member| member.id() != id)
                .cloned()
                .collect();
            emptied = next.is_empty();
            Arc::new(next)
        });
        if !removed {
            return false;
        }

        let now = self.inner.touch();
        if emptied {
            let deadline = now.saturating_add(duration_to_nanos(self.inner.loss_interval));
            self.inner
                .loss_deadline
                .store(deadline.min(NO_DEADLINE - 1), Ordering::SeqCst);
        }
        tracing::debug!(
            target: "spark.connector.pool",
            address = %self.inner.address,
            channel = %id,
            size = self.size(),
            "channel removed"
        );
        true
    }

    /// 当前成员数。
    pub fn size(&self) -> usize {
        self.inner.members.load().len()
    }

    /// 是否至少有一条连接。
    pub fn is_available(&self) -> bool {
        !self.inner.members.load().is_empty()
    }

    /// 阻塞等待直到出现可用连接或超时；返回最终是否可用。
    ///
    /// 超时按真实时间计算，与注入的 [`Clock`] 无关；超出 [`Instant`] 表示范围的超时
    /// （如 `Duration::MAX`）视为无限等待。
    pub fn wait_for_available(&self, timeout: Duration) -> bool {
        if self.is_available() {
            return true;
        }
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.inner.lock.lock();
        loop {
            self.inner.signal_needed.store(true, Ordering::SeqCst);
            fence(Ordering::SeqCst);
            if self.is_available() {
                return true;
            }
            match deadline {
                Some(deadline) => {
                    if self
                        .inner
                        .available
                        .wait_until(&mut guard, deadline)
                        .timed_out()
                    {
                        return self.is_available();
                    }
                }
                None => self.inner.available.wait(&mut guard),
            }
        }
    }

    /// 期望容量。
    pub fn capacity(&self) -> usize {
        self.inner.capacity.load(Ordering::Acquire)
    }

    /// 设置期望容量。
    pub fn set_capacity(&self, capacity: usize) {
        self.inner.capacity.store(capacity, Ordering::Release);
    }

    /// 预热时长。
    pub fn warm_up(&self) -> Duration {
        Duration::from_nanos(self.inner.warm_up_nanos.load(Ordering::Acquire))
    }

    /// 设置预热时长。
    pub fn set_warm_up(&self, warm_up: Duration) {
        self.inner
            .warm_up_nanos
            .store(duration_to_nanos(warm_up), Ordering::Release);
    }

    /// 自最近一次成员变化起是否已超过预热时长。
    pub fn is_warm_up_complete(&self) -> bool {
        let now = self.inner.elapsed_nanos();
        let last_change = self.inner.last_change.load(Ordering::Acquire);
        let warm_up = self.inner.warm_up_nanos.load(Ordering::Acquire);
        now.saturating_sub(last_change) > warm_up
    }

    /// 最近一次成员变化的时间；从未变化时为构造时间。
    pub fn last_change(&self) -> Instant {
        self.inner.instant_at(self.inner.last_change.load(Ordering::Acquire))
    }

    /// 失联截止时间；成员非空时为 `None`。
    pub fn loss_deadline(&self) -> Option<Instant> {
        if self.is_available() {
            return None;
        }
        match self.inner.loss_deadline.load(Ordering::SeqCst) {
            NO_DEADLINE => None,
            nanos => Some(self.inner.instant_at(nanos)),
        }
    }

    /// 成员快照。
    pub fn channels(&self) -> Vec<ChannelRef> {
        Vec::clone(&self.inner.members.load())
    }

    /// 轮询游标的当前值。
    pub fn round_robin_cursor(&self) -> usize {
        self.inner.cursor.load(Ordering::Relaxed)
    }
}

impl PoolInner {
    fn elapsed_nanos(&self) -> u64 {
        duration_to_nanos(self.clock.now().saturating_duration_since(self.base))
    }

    fn instant_at(&self, nanos: u64) -> Instant {
        self.base + Duration::from_nanos(nanos)
    }

    fn touch(&self) -> u64 {
        let now = self.elapsed_nanos();
        self.last_change.store(now, Ordering::Release);
        now
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("address", &self.inner.address)
            .field("size", &self.size())
            .field("capacity", &self.capacity())
            .field("warm_up", &self.warm_up())
            .finish()
    }
}

fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(NO_DEADLINE - 1)
}

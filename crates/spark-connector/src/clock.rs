//! 可注入的单调时钟。
//!
//! # 教案级说明
//! - **意图 (Why)**：连接池的预热判定与失联截止时间都依赖“当前时间”，直接读取系统时钟会让测试不可复现；
//! - **契约 (What)**：[`Clock::now`] 返回单调递增的 [`Instant`]；
//! - **实现提示 (How)**：生产环境注入 [`SystemClock`]，测试注入 [`MockClock`] 并调用 [`MockClock::advance`] 推进时间。

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// 时间来源。
pub trait Clock: Send + Sync + 'static {
    /// 当前的单调时间点。
    fn now(&self) -> Instant;
}

/// 直接读取 [`Instant::now`] 的系统时钟。
#[derive(Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// 手动推进的虚拟时钟。
///
/// 克隆体共享同一时间线，推进任一克隆体对所有持有者可见。
#[derive(Clone, Debug)]
pub struct MockClock {
    origin: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// 以当前系统时间为起点。
    pub fn new() -> Self {
        Self::with_start(Instant::now())
    }

    /// 以指定时间点为起点。
    pub fn with_start(origin: Instant) -> Self {
        Self {
            origin,
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// 推进虚拟时间。
    pub fn advance(&self, delta: Duration) {
        let mut elapsed = self.elapsed.lock();
        *elapsed = elapsed.saturating_add(delta);
    }

    /// 自起点以来的虚拟时间偏移。
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_is_shared_between_clones() {
        let clock = MockClock::new();
        let start = clock.now();
        let clone = clock.clone();
        clone.advance(Duration::from_millis(250));
        assert_eq!(clock.now() - start, Duration::from_millis(250));
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
    }
}

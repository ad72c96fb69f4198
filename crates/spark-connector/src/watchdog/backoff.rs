use std::time::Duration;

/// 线性、封顶的重连退避策略。
///
/// 第 `n` 次重连的延迟为 `step × min(n, max_steps)`；默认 200 ms 步长、12 步封顶，
/// 即 200、400、…、2400 ms，之后恒为 2400 ms。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectBackoff {
    step: Duration,
    max_steps: u32,
}

impl ReconnectBackoff {
    /// 默认步长。
    pub const DEFAULT_STEP: Duration = Duration::from_millis(200);
    /// 默认步数上限。
    pub const DEFAULT_MAX_STEPS: u32 = 12;

    /// 指定步长与步数上限；步数上限至少为 1。
    pub fn new(step: Duration, max_steps: u32) -> Self {
        Self {
            step,
            max_steps: max_steps.max(1),
        }
    }

    /// 第 `attempts` 次重连前的延迟。
    pub fn delay_for(&self, attempts: u32) -> Duration {
        self.step.saturating_mul(attempts.min(self.max_steps))
    }

    /// 步长。
    pub fn step(&self) -> Duration {
        self.step
    }

    /// 步数上限。
    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_STEP, Self::DEFAULT_MAX_STEPS)
    }
}

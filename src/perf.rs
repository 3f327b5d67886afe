// ==========================================
// 性能统计 Guard
// ==========================================
// 记录 elapsed_ms + 求解次数, 日志 target = "perf"
// 开关: PAWS_PERF=0 关闭（默认开启）
// ==========================================

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use std::time::Instant;

static PERF_ENABLED: AtomicBool = AtomicBool::new(true);
static PERF_ENV: Once = Once::new();

thread_local! {
    static PERF_DEPTH: Cell<u32> = const { Cell::new(0) };
    static SOLVE_COUNT: Cell<u64> = const { Cell::new(0) };
}

fn is_true(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

fn enabled() -> bool {
    PERF_ENV.call_once(|| {
        if let Ok(v) = std::env::var("PAWS_PERF") {
            PERF_ENABLED.store(is_true(&v), Ordering::Relaxed);
        }
    });
    PERF_ENABLED.load(Ordering::Relaxed)
}

/// 记录一次 LP 求解（仅在 Guard 活跃期间计数）
pub fn record_solve() {
    let active = PERF_DEPTH.with(|d| d.get() > 0);
    if active {
        SOLVE_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

/// 性能统计 Guard：记录 elapsed_ms + 期间 LP 求解次数
///
/// 使用方式：
/// ```ignore
/// let _perf = paws_sim::perf::PerfGuard::new("window").with_period(t);
/// // do work...
/// ```
pub struct PerfGuard {
    op: &'static str,
    period: Option<u32>,
    start: Instant,
    solve_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        PERF_DEPTH.with(|d| d.set(d.get().saturating_add(1)));
        Self {
            op,
            period: None,
            start: Instant::now(),
            solve_start: SOLVE_COUNT.with(|c| c.get()),
        }
    }

    pub fn with_period(mut self, period: u32) -> Self {
        self.period = Some(period);
        self
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        let solve_count = SOLVE_COUNT
            .with(|c| c.get())
            .saturating_sub(self.solve_start);

        if enabled() {
            tracing::info!(
                target: "perf",
                op = self.op,
                period = ?self.period,
                elapsed_ms,
                solve_count,
                "done"
            );
        }

        PERF_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solves_counted_only_inside_guard() {
        record_solve();
        let guard = PerfGuard::new("test").with_period(3);
        record_solve();
        record_solve();
        let counted = SOLVE_COUNT.with(|c| c.get()) - guard.solve_start;
        assert_eq!(counted, 2);
        drop(guard);
        assert_eq!(PERF_DEPTH.with(|d| d.get()), 0);
    }
}

use log::info;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Accumulated wall time of one named stage.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StageTiming {
    pub total: Duration,
    pub calls: u64,
}

impl StageTiming {
    pub fn mean(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.total / self.calls as u32
        }
    }
}

/// Per-stage timings of the step pipeline such as pp, pm and green_function.
#[derive(Default)]
pub struct Profiler {
    stages: HashMap<&'static str, StageTiming>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: &'static str, elapsed: Duration) {
        let t = self.stages.entry(stage).or_default();
        t.total += elapsed;
        t.calls += 1;
    }

    pub fn stage(&self, stage: &str) -> Option<StageTiming> {
        self.stages.get(stage).copied()
    }

    /// Stages ordered by total time, longest first.
    pub fn report(&self) -> Vec<(&'static str, StageTiming)> {
        let mut v: Vec<_> = self.stages.iter().map(|(n, t)| (*n, *t)).collect();
        v.sort_by(|a, b| b.1.total.cmp(&a.1.total).then(a.0.cmp(b.0)));
        v
    }

    pub fn clear(&mut self) {
        self.stages.clear();
    }

    pub fn print_and_clear(&mut self) {
        for (name, t) in self.report() {
            info!(
                "[profile] {:<16} total {:?} over {} calls (mean {:?})",
                name,
                t.total,
                t.calls,
                t.mean()
            );
        }
        self.clear();
    }
}

pub struct ProfilerGuard {
    name: &'static str,
    start: Instant,
}

impl ProfilerGuard {
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Start timing a stage. With the `profiling` feature the guard adds its
/// elapsed time to the global profiler when dropped.
pub fn start(name: &'static str) -> ProfilerGuard {
    ProfilerGuard {
        name,
        start: Instant::now(),
    }
}

#[cfg(feature = "profiling")]
impl Drop for ProfilerGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        crate::PROFILER.lock().record(self.name, elapsed);
    }
}

/// Time the enclosing scope only when the `profiling` feature is enabled.
#[macro_export]
macro_rules! profile_scope {
    ($name:expr) => {
        #[cfg(feature = "profiling")]
        let _guard = $crate::profiler::start($name);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_accumulate_calls_and_time() {
        let mut p = Profiler::new();
        p.record("pp", Duration::from_millis(4));
        p.record("pp", Duration::from_millis(2));
        p.record("pm", Duration::from_millis(1));
        let pp = p.stage("pp").unwrap();
        assert_eq!(pp.calls, 2);
        assert_eq!(pp.mean(), Duration::from_millis(3));
        assert_eq!(p.report()[0].0, "pp");
        p.clear();
        assert!(p.stage("pm").is_none());
    }

    #[test]
    fn guard_measures_its_scope() {
        let g = start("green");
        assert!(g.elapsed() >= Duration::ZERO);
    }
}

//! Sliding-window sample store.
//!
//! Samples are kept per instance for a bounded retention horizon and
//! aggregated as an arithmetic mean across whichever instances currently
//! count toward the aggregate. Instances that leave the fleet are pruned
//! with their series.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::fleet::instance::Instance;
use crate::telemetry::source::MetricSample;

/// Per-instance sample series bounded by a retention horizon (the longest
/// rule window in play). Aggregation takes the window per call, so rules
/// with different windows share one store.
#[derive(Debug)]
pub struct MetricWindow {
    retention: Duration,
    series: HashMap<Uuid, VecDeque<MetricSample>>,
}

impl MetricWindow {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            series: HashMap::new(),
        }
    }

    /// Record one sample, pruning anything that slid past retention.
    pub fn record(&mut self, sample: MetricSample) {
        let series = self.series.entry(sample.instance).or_default();
        series.push_back(sample);
        let cutoff = sample.at.checked_sub(self.retention);
        if let Some(cutoff) = cutoff {
            while series.front().is_some_and(|s| s.at <= cutoff) {
                series.pop_front();
            }
        }
    }

    /// Drop the series of an instance that left the fleet.
    pub fn forget(&mut self, instance: Uuid) {
        self.series.remove(&instance);
    }

    /// Keep only the series of instances still present.
    pub fn retain(&mut self, known: &std::collections::HashSet<Uuid>) {
        self.series.retain(|id, _| known.contains(id));
    }

    /// Windowed arithmetic mean over the given instances' samples.
    /// None when no sample is in the window (no decision can be made).
    pub fn mean(
        &self,
        now: Instant,
        window: Duration,
        instances: &[Arc<Instance>],
    ) -> Option<f64> {
        let cutoff = now.checked_sub(window);
        let mut sum = 0.0;
        let mut count = 0usize;
        for instance in instances {
            let Some(series) = self.series.get(&instance.id) else {
                continue;
            };
            for sample in series {
                if cutoff.is_none_or(|c| sample.at > c) {
                    sum += sample.value;
                    count += 1;
                }
            }
        }
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::instance::InstanceState;

    const WINDOW: Duration = Duration::from_secs(300);

    fn running(port: u16) -> Arc<Instance> {
        let inst = Arc::new(Instance::new(
            format!("127.0.0.1:{}", port).parse().unwrap(),
            port as u64,
        ));
        inst.set_state(InstanceState::Running);
        inst.mark_success(1);
        inst
    }

    fn sample(instance: &Instance, at: Instant, value: f64) -> MetricSample {
        MetricSample {
            instance: instance.id,
            at,
            value,
        }
    }

    #[test]
    fn mean_spans_instances_and_samples() {
        let mut window = MetricWindow::new(Duration::from_secs(300));
        let a = running(9001);
        let b = running(9002);
        let now = Instant::now();

        window.record(sample(&a, now, 80.0));
        window.record(sample(&b, now, 60.0));

        let mean = window.mean(now, WINDOW, &[a, b]).unwrap();
        assert!((mean - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn expired_samples_fall_out() {
        let mut window = MetricWindow::new(Duration::from_secs(300));
        let a = running(9001);
        let start = Instant::now();

        window.record(sample(&a, start, 100.0));
        // Six minutes later only the fresh sample counts.
        let later = start + Duration::from_secs(360);
        window.record(sample(&a, later, 50.0));

        let mean = window.mean(later, WINDOW, &[a]).unwrap();
        assert!((mean - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn excluded_instance_contributes_nothing() {
        let mut window = MetricWindow::new(Duration::from_secs(300));
        let a = running(9001);
        let b = running(9002);
        let now = Instant::now();

        window.record(sample(&a, now, 90.0));
        window.record(sample(&b, now, 10.0));

        // Aggregate over a alone ignores b's series entirely.
        let mean = window.mean(now, WINDOW, &[a]).unwrap();
        assert!((mean - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_window_yields_none() {
        let window = MetricWindow::new(Duration::from_secs(300));
        assert!(window.mean(Instant::now(), WINDOW, &[running(9001)]).is_none());
    }

    #[test]
    fn rolling_average_crosses_threshold_late() {
        // Load jumps to 90 with three old idle samples in the window: the
        // 5-minute mean crosses 75 only once enough hot samples accrue.
        let mut window = MetricWindow::new(Duration::from_secs(300));
        let a = running(9001);
        let start = Instant::now();

        for i in 0..3u64 {
            window.record(sample(&a, start + Duration::from_secs(60 * i), 20.0));
        }
        let mut crossed_at = None;
        for i in 3..10u64 {
            let at = start + Duration::from_secs(60 * i);
            window.record(sample(&a, at, 90.0));
            let mean = window.mean(at, WINDOW, std::slice::from_ref(&a)).unwrap();
            if mean > 75.0 && crossed_at.is_none() {
                crossed_at = Some(i);
            }
        }
        // With a 5-sample window, [20,90,90,90,90] -> 76 on the fourth hot
        // sample.
        assert_eq!(crossed_at, Some(6));
    }
}

use std::collections::VecDeque;
use std::time::Instant;

const MAX_STEP_SAMPLES: usize = 60;

/// Wall-clock timing of the one-off symbolic setup and a rolling window of
/// per-tick step times.
pub struct Profiler {
    setup_start: Option<Instant>,
    step_start: Option<Instant>,

    // Timing history
    step_samples: VecDeque<f32>,

    // Statistics
    pub setup_time_ms: f32,
    pub avg_step_time_ms: f32,
    pub max_step_time_ms: f32,

    step_count: u32,
}

impl Profiler {
    pub fn new() -> Self {
        Self {
            setup_start: None,
            step_start: None,
            step_samples: VecDeque::new(),
            setup_time_ms: 0.0,
            avg_step_time_ms: 0.0,
            max_step_time_ms: 0.0,
            step_count: 0,
        }
    }

    fn elapsed_ms(start: Instant) -> f32 {
        (start.elapsed().as_secs_f64() * 1000.0) as f32
    }

    pub fn begin_setup(&mut self) {
        self.setup_start = Some(Instant::now());
    }

    pub fn end_setup(&mut self) {
        if let Some(start) = self.setup_start.take() {
            self.setup_time_ms = Self::elapsed_ms(start);
        }
    }

    pub fn begin_step(&mut self) {
        self.step_start = Some(Instant::now());
    }

    pub fn end_step(&mut self) {
        if let Some(start) = self.step_start.take() {
            self.record_step(Self::elapsed_ms(start));
        }
    }

    fn record_step(&mut self, time_ms: f32) {
        self.step_count += 1;

        self.step_samples.push_back(time_ms);
        if self.step_samples.len() > MAX_STEP_SAMPLES {
            self.step_samples.pop_front();
        }

        self.update_statistics();
    }

    fn update_statistics(&mut self) {
        if self.step_samples.is_empty() {
            return;
        }

        let sum: f32 = self.step_samples.iter().sum();
        self.avg_step_time_ms = sum / self.step_samples.len() as f32;
        self.max_step_time_ms = self.step_samples.iter().copied().fold(0.0, f32::max);
    }

    pub fn get_latest_sample(&self) -> Option<f32> {
        self.step_samples.back().copied()
    }

    pub fn get_step_count(&self) -> u32 {
        self.step_count
    }

    pub fn log_summary(&self) {
        log::info!("Setup took {:.3} ms", self.setup_time_ms);
        let Some(latest) = self.get_latest_sample() else {
            log::info!("No steps taken");
            return;
        };
        log::info!(
            "{} steps, last {} avg {:.4} ms, max {:.4} ms, latest {:.4} ms",
            self.get_step_count(),
            self.step_samples.len(),
            self.avg_step_time_ms,
            self.max_step_time_ms,
            latest
        );
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

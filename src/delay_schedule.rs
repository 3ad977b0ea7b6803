//! Delay schedule (C3, `spec.md` §4.2): wall-clock instants of the next N
//! ticks for a waveform, given a cycle origin. Purely advisory — the engine
//! loop (`crate::engine`) measures its own drift rather than trusting the
//! schedule exclusively, but pre-expanding ten cycles at a time amortizes the
//! per-tick `Instant` arithmetic, mirroring
//! `original_source/src/node-engine/delay_calculator/delay_calculator_impl.go`.

use tokio::time::{Duration, Instant};

const CYCLES_PER_EXPANSION: u32 = 10;

/// Produces the wall-clock instant of each tick within a waveform cycle,
/// regenerating a fresh ten-cycle schedule whenever the current one is
/// exhausted.
pub struct DelaySchedule {
    duration_ms: u64,
    tick_frequency_ms: u32,
    schedule: Vec<Instant>,
    next_index: usize,
}

impl DelaySchedule {
    pub fn new(duration_ms: u64, tick_frequency_ms: u32) -> Self {
        DelaySchedule {
            duration_ms,
            tick_frequency_ms,
            schedule: Vec::new(),
            next_index: 0,
        }
    }

    /// Returns the instant of the next tick, expanding the schedule from
    /// `Instant::now()` if exhausted.
    pub fn next_tick(&mut self) -> Instant {
        if self.next_index >= self.schedule.len() {
            self.make_cycle_schedule(Instant::now());
        }
        let t = self.schedule[self.next_index];
        self.next_index += 1;
        t
    }

    fn make_cycle_schedule(&mut self, origin: Instant) {
        let tick_count = if self.tick_frequency_ms == 0 {
            0
        } else {
            self.duration_ms / self.tick_frequency_ms as u64
        };
        let has_partial = self.tick_frequency_ms != 0
            && self.duration_ms % self.tick_frequency_ms as u64 != 0;
        let per_cycle = tick_count + if has_partial { 1 } else { 0 };

        let mut schedule = Vec::with_capacity((per_cycle * CYCLES_PER_EXPANSION as u64) as usize);
        let mut start_time = origin;

        for _ in 0..CYCLES_PER_EXPANSION {
            for i in 1..=tick_count {
                schedule.push(start_time + Duration::from_millis(i * self.tick_frequency_ms as u64));
            }
            if has_partial {
                schedule.push(start_time + Duration::from_millis(self.duration_ms));
            }
            start_time += Duration::from_millis(self.duration_ms);
        }

        self.schedule = schedule;
        self.next_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_ten_cycles_with_partial_tick() {
        let mut s = DelaySchedule::new(250, 100);
        // tick_count = 2, has_partial = true -> 3 ticks per cycle, 30 total
        let mut prev = None;
        for _ in 0..30 {
            let t = s.next_tick();
            if let Some(p) = prev {
                assert!(t >= p);
            }
            prev = Some(t);
        }
    }

    #[test]
    fn regenerates_after_exhaustion() {
        let mut s = DelaySchedule::new(100, 100);
        // 1 tick per cycle, 10 per expansion
        for _ in 0..10 {
            s.next_tick();
        }
        // this should trigger regeneration without panicking
        let _ = s.next_tick();
    }
}

//! Deterministic clock for tests and offline drivers.

use std::sync::{Arc, Mutex};

use super::{AudioClock, RepeatHandle, TickFn, lock};
use crate::composition::NoteValue;

pub(crate) const DEFAULT_BPM: f64 = 120.0;

type SharedTick = Arc<Mutex<TickFn>>;

struct Repeat {
    id: u64,
    interval: NoteValue,
    next_time: f64,
    tick: SharedTick,
}

struct ManualState {
    bpm: f64,
    next_id: u64,
    repeats: Vec<Repeat>,
}

/// A clock that only moves when told to. Deterministic, for tests and
/// offline drivers.
#[derive(Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        ManualClock::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            state: Arc::new(Mutex::new(ManualState {
                bpm: DEFAULT_BPM,
                next_id: 0,
                repeats: Vec::new(),
            })),
        }
    }

    /// Fire every active repeat `ticks` times, in registration order.
    ///
    /// Callbacks run without the clock locked, so they may cancel repeats
    /// or schedule new ones.
    pub fn advance(&self, ticks: usize) {
        for _ in 0..ticks {
            let due: Vec<(u64, f64, SharedTick)> = {
                let mut state = lock(&self.state);
                let bpm = state.bpm;
                state
                    .repeats
                    .iter_mut()
                    .map(|r| {
                        let time = r.next_time;
                        r.next_time += r.interval.seconds(bpm);
                        (r.id, time, Arc::clone(&r.tick))
                    })
                    .collect()
            };

            for (id, time, tick) in due {
                if !self.is_registered(id) {
                    continue;
                }
                let mut callback = lock(&tick);
                (*callback)(time);
            }
        }
    }

    /// Repeats registered and not cancelled.
    pub fn active_repeats(&self) -> usize {
        lock(&self.state).repeats.len()
    }

    fn is_registered(&self, id: u64) -> bool {
        lock(&self.state).repeats.iter().any(|r| r.id == id)
    }
}

impl AudioClock for ManualClock {
    fn set_bpm(&self, bpm: f64) {
        lock(&self.state).bpm = bpm;
    }

    fn bpm(&self) -> f64 {
        lock(&self.state).bpm
    }

    fn schedule_repeat(&self, interval: NoteValue, tick: TickFn) -> Box<dyn RepeatHandle> {
        let mut state = lock(&self.state);
        let id = state.next_id;
        state.next_id += 1;
        state.repeats.push(Repeat {
            id,
            interval,
            next_time: 0.0,
            tick: Arc::new(Mutex::new(tick)),
        });
        Box::new(ManualRepeat {
            id,
            state: Arc::clone(&self.state),
        })
    }
}

struct ManualRepeat {
    id: u64,
    state: Arc<Mutex<ManualState>>,
}

impl RepeatHandle for ManualRepeat {
    fn cancel(&mut self) {
        lock(&self.state).repeats.retain(|r| r.id != self.id);
    }

    fn is_active(&self) -> bool {
        lock(&self.state).repeats.iter().any(|r| r.id == self.id)
    }
}

impl Drop for ManualRepeat {
    fn drop(&mut self) {
        self.cancel();
    }
}

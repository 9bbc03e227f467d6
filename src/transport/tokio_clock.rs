//! Wall-clock tempo clock on tokio timers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::clock::DEFAULT_BPM;
use super::{AudioClock, RepeatHandle, TickFn};
use crate::composition::NoteValue;

fn store_bpm(cell: &AtomicU64, bpm: f64) {
    cell.store(bpm.to_bits(), Ordering::Release);
}

fn load_bpm(cell: &AtomicU64) -> f64 {
    f64::from_bits(cell.load(Ordering::Acquire))
}

/// Wall-clock tempo clock driven by tokio timers.
///
/// Each repeat runs as a single task, so its callback never overlaps itself.
/// The period is re-read from the current tempo after every tick.
#[derive(Debug, Clone)]
pub struct TokioClock {
    handle: Handle,
    origin: Instant,
    bpm: Arc<AtomicU64>,
}

impl TokioClock {
    pub fn new(handle: Handle) -> Self {
        TokioClock {
            handle,
            origin: Instant::now(),
            bpm: Arc::new(AtomicU64::new(DEFAULT_BPM.to_bits())),
        }
    }

    /// A clock on the runtime this is called from.
    pub fn current() -> Result<Self, tokio::runtime::TryCurrentError> {
        Ok(TokioClock::new(Handle::try_current()?))
    }

    /// Seconds since the clock was created.
    pub fn elapsed(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

impl AudioClock for TokioClock {
    fn set_bpm(&self, bpm: f64) {
        store_bpm(&self.bpm, bpm);
    }

    fn bpm(&self) -> f64 {
        load_bpm(&self.bpm)
    }

    fn schedule_repeat(&self, interval: NoteValue, mut tick: TickFn) -> Box<dyn RepeatHandle> {
        let active = Arc::new(AtomicBool::new(true));
        let running = Arc::clone(&active);
        let bpm = Arc::clone(&self.bpm);
        let origin = self.origin;

        let task = self.handle.spawn(async move {
            let mut next = Instant::now();
            loop {
                tokio::time::sleep_until(next).await;
                if !running.load(Ordering::Acquire) {
                    break;
                }
                tick(origin.elapsed().as_secs_f64());

                let period = Duration::from_secs_f64(interval.seconds(load_bpm(&bpm)));
                next += period;
                // Skip ticks missed while the runtime was busy.
                let now = Instant::now();
                if next < now {
                    next = now + period;
                }
            }
        });

        Box::new(TokioRepeat { active, task })
    }
}

struct TokioRepeat {
    active: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl RepeatHandle for TokioRepeat {
    fn cancel(&mut self) {
        self.active.store(false, Ordering::Release);
        self.task.abort();
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && !self.task.is_finished()
    }
}

impl Drop for TokioRepeat {
    fn drop(&mut self) {
        self.cancel();
    }
}

//! Polyphonic container with sample-accurate note scheduling.

/// A single renderable note.
pub trait VoiceRender {
    fn next_sample(&mut self) -> f64;
    fn note_off(&mut self);
    fn is_finished(&self) -> bool;
}

#[derive(Debug)]
struct Scheduled<V> {
    voice: V,
    start_sample: u64,
    release_sample: u64,
    released: bool,
}

/// Notes of one instrument, positioned on the instrument's sample clock.
///
/// `time` arguments are seconds on that clock; notes scheduled in the past
/// start at the next rendered sample.
#[derive(Debug)]
pub struct Polyphony<V> {
    sample_rate: f64,
    /// Samples rendered so far.
    clock: u64,
    notes: Vec<Scheduled<V>>,
}

impl<V: VoiceRender> Polyphony<V> {
    pub fn new(sample_rate: f64) -> Self {
        Polyphony {
            sample_rate,
            clock: 0,
            notes: Vec::new(),
        }
    }

    /// Schedule `voice` to start at `time` and release after `duration`.
    pub fn schedule(&mut self, voice: V, time: f64, duration: f64) {
        let start_sample = self.to_samples(time).max(self.clock);
        let release_sample = start_sample + self.to_samples(duration).max(1);
        self.notes.push(Scheduled {
            voice,
            start_sample,
            release_sample,
            released: false,
        });
    }

    /// Release every held note and drop notes that have not started yet.
    pub fn release_all(&mut self) {
        let clock = self.clock;
        self.notes.retain(|n| n.start_sample < clock);
        for note in &mut self.notes {
            if !note.released {
                note.voice.note_off();
                note.released = true;
            }
        }
    }

    /// Drop every note immediately, including release tails.
    pub fn clear(&mut self) {
        self.notes.clear();
    }

    /// Notes scheduled or held that have not been released.
    pub fn sounding(&self) -> usize {
        self.notes.iter().filter(|n| !n.released).count()
    }

    /// Add this instrument's output to `out` and advance the clock.
    pub fn render_add(&mut self, out: &mut [f64]) {
        for (i, slot) in out.iter_mut().enumerate() {
            let now = self.clock + i as u64;
            for note in &mut self.notes {
                if now < note.start_sample {
                    continue;
                }
                if !note.released && now >= note.release_sample {
                    note.voice.note_off();
                    note.released = true;
                }
                *slot += note.voice.next_sample();
            }
        }
        self.clock += out.len() as u64;
        let clock = self.clock;
        self.notes
            .retain(|n| n.start_sample >= clock || !n.voice.is_finished());
    }

    fn to_samples(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Constant output until released, then silent and finished.
    struct Dc {
        level: f64,
        off: bool,
    }

    impl Dc {
        fn new(level: f64) -> Self {
            Dc { level, off: false }
        }
    }

    impl VoiceRender for Dc {
        fn next_sample(&mut self) -> f64 {
            if self.off { 0.0 } else { self.level }
        }
        fn note_off(&mut self) {
            self.off = true;
        }
        fn is_finished(&self) -> bool {
            self.off
        }
    }

    #[test]
    fn notes_start_on_schedule() {
        let mut poly = Polyphony::new(100.0);
        poly.schedule(Dc::new(1.0), 0.05, 1.0);

        let mut out = [0.0; 10];
        poly.render_add(&mut out);
        assert_eq!(&out[..5], &[0.0; 5]);
        assert_eq!(&out[5..], &[1.0; 5]);
    }

    #[test]
    fn notes_release_after_duration() {
        let mut poly = Polyphony::new(100.0);
        poly.schedule(Dc::new(1.0), 0.0, 0.04);
        assert_eq!(poly.sounding(), 1);

        let mut out = [0.0; 10];
        poly.render_add(&mut out);
        assert_eq!(&out[..4], &[1.0; 4]);
        assert_eq!(&out[4..], &[0.0; 6]);
        assert_eq!(poly.sounding(), 0);
        assert!(poly.notes.is_empty());
    }

    #[test]
    fn past_times_start_immediately() {
        let mut poly = Polyphony::new(100.0);
        let mut out = [0.0; 20];
        poly.render_add(&mut out);

        poly.schedule(Dc::new(0.5), 0.0, 1.0);
        let mut out = [0.0; 2];
        poly.render_add(&mut out);
        assert_eq!(out, [0.5, 0.5]);
    }

    #[test]
    fn release_all_silences_held_and_pending() {
        let mut poly = Polyphony::new(100.0);
        poly.schedule(Dc::new(1.0), 0.0, 10.0);
        poly.schedule(Dc::new(1.0), 5.0, 1.0);
        let mut out = [0.0; 4];
        poly.render_add(&mut out);
        assert_eq!(poly.sounding(), 2);

        poly.release_all();
        assert_eq!(poly.sounding(), 0);

        let mut out = [0.0; 1000];
        poly.render_add(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(poly.notes.is_empty());
    }

    #[test]
    fn release_all_twice_is_harmless() {
        let mut poly: Polyphony<Dc> = Polyphony::new(100.0);
        poly.release_all();
        poly.schedule(Dc::new(1.0), 0.0, 1.0);
        poly.release_all();
        poly.release_all();
        assert_eq!(poly.sounding(), 0);
    }

    #[test]
    fn output_accumulates() {
        let mut poly = Polyphony::new(100.0);
        poly.schedule(Dc::new(0.25), 0.0, 1.0);
        let mut out = [1.0; 3];
        poly.render_add(&mut out);
        assert_eq!(out, [1.25; 3]);
    }
}

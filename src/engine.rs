//! Engine — the caller-facing playback controller.
//!
//! Owns the voice bank, the running transport and the phase tracker. The
//! bank and transport live behind one mutex shared with the clock's tick
//! callback, with per-voice sample loads, and with [`EngineOutput`], which
//! the host audio callback pulls samples from.
//!
//! Loading and playing spawn onto the current tokio runtime.

use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use tokio::task::JoinSet;

use crate::composition::{Composition, CompositionVector, NoteValue, Voice};
use crate::config::EngineConfig;
use crate::ensemble::{LoadedStates, SampleSource, VoiceBank, spawn_voice_loads};
use crate::error::EngineError;
use crate::playback::{Phase, PhaseTracker};
use crate::transport::{AudioClock, RepeatHandle, TickFn, Transport, lock};

struct Shared {
    bank: VoiceBank,
    transport: Option<Transport>,
    /// Bumped on every start and stop. A tick carrying an older value
    /// belongs to a stopped transport and does nothing.
    generation: u64,
    /// Bumped on every load and dispose. A load settling under an older
    /// value was abandoned and is not installed.
    load_epoch: u64,
}

/// Plays composition vectors on a four-voice ensemble.
pub struct Engine<S: SampleSource + 'static, C: AudioClock> {
    config: EngineConfig,
    source: Arc<S>,
    clock: C,
    shared: Arc<Mutex<Shared>>,
    repeat: Option<Box<dyn RepeatHandle>>,
    /// Voice loads still in flight.
    loading: Option<JoinSet<()>>,
    phases: PhaseTracker,
    initialized: bool,
}

impl<S: SampleSource + 'static, C: AudioClock> Engine<S, C> {
    pub fn new(config: EngineConfig, source: S, clock: C) -> Result<Self, EngineError> {
        config.validate()?;
        let shared = Shared {
            bank: VoiceBank::new(&config),
            transport: None,
            generation: 0,
            load_epoch: 0,
        };
        Ok(Engine {
            config,
            source: Arc::new(source),
            clock,
            shared: Arc::new(Mutex::new(shared)),
            repeat: None,
            loading: None,
            phases: PhaseTracker::new(),
            initialized: false,
        })
    }

    /// Load every voice's sample and wait until each load has settled.
    ///
    /// Voices are installed one by one as their loads finish, so playback
    /// picks up a sample as soon as it is ready even while this is still
    /// waiting on a slower voice. Never fails: voices that could not be
    /// loaded play their fallback synthesizer. If loads are already in
    /// flight from a lazy `play`, this waits on those.
    pub async fn load(&mut self) -> LoadedStates {
        if self.loading.is_none() {
            self.start_loading();
        }
        while let Some(tasks) = self.loading.as_mut() {
            match tasks.join_next().await {
                Some(Err(e)) if e.is_panic() => warn!("sample load task panicked: {e}"),
                Some(_) => {}
                None => self.loading = None,
            }
        }

        let states = self.loaded_states();
        info!(
            "ensemble ready: {}/{} voices sampled",
            states.ready_count(),
            Voice::ALL.len()
        );
        states
    }

    /// Stop whatever is playing and start looping `vector`, then report
    /// `phase`.
    ///
    /// The vector is validated before anything else happens; a rejected
    /// vector leaves playback, phase and readiness untouched. On first use
    /// this starts loading samples without waiting for them: playback begins
    /// on the fallback synthesizers and each voice switches to its sample
    /// once loaded.
    pub async fn play(&mut self, vector: &[f64], phase: Phase) -> Result<(), EngineError> {
        if phase == Phase::Idle {
            return Err(EngineError::IdlePhase);
        }
        let vector = CompositionVector::new(vector)?;
        let composition = Composition::from_vector(&vector, self.config.step_count);

        if !self.initialized {
            self.start_loading();
        }

        self.halt();
        self.clock.set_bpm(composition.bpm);

        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.transport = Some(Transport::new(&composition, &self.config));
            shared.generation
        };
        let tick = transport_tick(Arc::clone(&self.shared), generation);
        self.repeat = Some(self.clock.schedule_repeat(NoteValue::Sixteenth, tick));

        info!("playing {phase} at {:.1} bpm", composition.bpm);
        self.phases.enter(phase);
        Ok(())
    }

    /// Silence everything and return to idle. Safe to call at any time.
    pub fn stop(&mut self) {
        if self.halt() {
            debug!("transport stopped");
        }
        if self.phases.phase() != Phase::Idle {
            self.phases.enter(Phase::Idle);
        }
    }

    /// Stop, abandon loads in flight and release all sample resources. The
    /// next `play` reloads.
    pub fn dispose(&mut self) {
        self.stop();
        self.loading = None;
        {
            let mut shared = lock(&self.shared);
            shared.load_epoch += 1;
            shared.bank.dispose();
        }
        self.initialized = false;
        debug!("ensemble disposed");
    }

    /// Dispose and load again.
    pub async fn reset(&mut self) -> LoadedStates {
        self.dispose();
        self.load().await
    }

    /// Replace the phase observer.
    pub fn set_phase_callback(&mut self, observer: impl FnMut(Phase) + Send + 'static) {
        self.phases.set_observer(Box::new(observer));
    }

    pub fn loaded_states(&self) -> LoadedStates {
        lock(&self.shared).bank.loaded_states()
    }

    pub fn phase(&self) -> Phase {
        self.phases.phase()
    }

    pub fn is_playing(&self) -> bool {
        self.repeat.as_ref().is_some_and(|r| r.is_active())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// A handle for pulling rendered audio.
    pub fn output(&self) -> EngineOutput {
        EngineOutput {
            shared: Arc::clone(&self.shared),
            scratch: Vec::new(),
        }
    }

    /// Spawn one load per voice. Each installs itself when it settles,
    /// unless a later load or a dispose has superseded it.
    fn start_loading(&mut self) {
        let epoch = {
            let mut shared = lock(&self.shared);
            shared.load_epoch += 1;
            shared.load_epoch
        };
        let shared = Arc::clone(&self.shared);
        let tasks = spawn_voice_loads(Arc::clone(&self.source), move |voice, result| {
            let mut shared = lock(&shared);
            if shared.load_epoch == epoch && shared.bank.install(voice, result) {
                debug!("{voice} sample installed");
            }
        });
        self.loading = Some(tasks);
        self.initialized = true;
    }

    /// Cancel the transport and release all notes without reporting a
    /// phase change. Returns whether a transport was running.
    fn halt(&mut self) -> bool {
        let was_running = match self.repeat.take() {
            Some(mut repeat) => {
                repeat.cancel();
                true
            }
            None => false,
        };
        let mut shared = lock(&self.shared);
        shared.generation += 1;
        shared.transport = None;
        shared.bank.release_all();
        was_running
    }
}

fn transport_tick(shared: Arc<Mutex<Shared>>, generation: u64) -> TickFn {
    Box::new(move |_clock_time| {
        let mut guard = lock(&shared);
        let Shared {
            bank,
            transport,
            generation: current,
            ..
        } = &mut *guard;
        if *current != generation {
            return;
        }
        if let Some(transport) = transport.as_mut() {
            let at = bank.now();
            transport.tick(at, bank);
        }
    })
}

/// Pull side of an [`Engine`], for the host audio callback. Each clone
/// keeps its own conversion buffer.
#[derive(Clone)]
pub struct EngineOutput {
    shared: Arc<Mutex<Shared>>,
    scratch: Vec<f64>,
}

impl EngineOutput {
    /// Fill `out` with the next block of the mix.
    pub fn render(&self, out: &mut [f64]) {
        lock(&self.shared).bank.render(out);
    }

    /// Like [`render`](Self::render), for hosts that want `f32`. Allocates
    /// only when `out` is longer than any block seen before.
    pub fn render_f32(&mut self, out: &mut [f32]) {
        self.scratch.resize(out.len(), 0.0);
        lock(&self.shared).bank.render(&mut self.scratch);
        for (dst, &src) in out.iter_mut().zip(&self.scratch) {
            *dst = src as f32;
        }
    }

    /// Held notes on `voice`.
    pub fn sounding_notes(&self, voice: Voice) -> usize {
        lock(&self.shared).bank.sounding_notes(voice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::VECTOR_WIDTH;
    use crate::ensemble::NoSamples;
    use crate::ensemble::loader::tests::PartialSource;
    use crate::transport::{ManualClock, TokioClock};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn recorder<S: SampleSource + 'static, C: AudioClock>(
        engine: &mut Engine<S, C>,
    ) -> Arc<Mutex<Vec<Phase>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        engine.set_phase_callback(move |p| sink.lock().unwrap().push(p));
        seen
    }

    fn synth_engine() -> (Engine<NoSamples, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let engine = Engine::new(EngineConfig::default(), NoSamples, clock.clone()).unwrap();
        (engine, clock)
    }

    fn vector(value: f64) -> Vec<f64> {
        vec![value; VECTOR_WIDTH]
    }

    /// Let spawned load tasks run until `done` holds or patience runs out.
    async fn settle<S: SampleSource + 'static, C: AudioClock>(
        engine: &Engine<S, C>,
        done: impl Fn(LoadedStates) -> bool,
    ) -> LoadedStates {
        for _ in 0..100 {
            if done(engine.loaded_states()) {
                break;
            }
            tokio::task::yield_now().await;
        }
        engine.loaded_states()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig {
            step_count: 0,
            ..EngineConfig::default()
        };
        assert!(Engine::new(config, NoSamples, ManualClock::new()).is_err());
    }

    #[tokio::test]
    async fn stop_when_idle_is_silent_and_idempotent() {
        let (mut engine, _clock) = synth_engine();
        let seen = recorder(&mut engine);
        engine.stop();
        engine.stop();
        assert!(seen.lock().unwrap().is_empty());

        engine.play(&vector(0.01), Phase::Traversal).await.unwrap();
        engine.stop();
        engine.stop();
        assert_eq!(*seen.lock().unwrap(), vec![Phase::Traversal, Phase::Idle]);
        assert!(!engine.is_playing());
    }

    #[tokio::test]
    async fn replay_never_overlaps_transports() {
        let (mut engine, clock) = synth_engine();
        for phase in [Phase::Start, Phase::Traversal, Phase::Traversal, Phase::End] {
            engine.play(&vector(0.02), phase).await.unwrap();
            assert_eq!(clock.active_repeats(), 1);
        }
        engine.stop();
        assert_eq!(clock.active_repeats(), 0);
    }

    #[tokio::test]
    async fn start_then_end_reports_no_idle_between() {
        let (mut engine, _clock) = synth_engine();
        let seen = recorder(&mut engine);
        engine.play(&vector(0.0), Phase::Start).await.unwrap();
        engine.play(&vector(0.03), Phase::End).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Phase::Start, Phase::End]);
        assert_eq!(engine.phase(), Phase::End);
    }

    #[tokio::test]
    async fn malformed_vector_changes_nothing() {
        let (mut engine, clock) = synth_engine();
        let seen = recorder(&mut engine);
        engine.play(&vector(0.01), Phase::Start).await.unwrap();

        let err = engine.play(&[0.0; 10], Phase::End).await.unwrap_err();
        assert!(matches!(err, EngineError::VectorWidth { found: 10, .. }));

        let mut poisoned = vector(0.01);
        poisoned[7] = f64::NAN;
        let err = engine.play(&poisoned, Phase::End).await.unwrap_err();
        assert!(matches!(err, EngineError::NonFinite { index: 7, .. }));

        assert_eq!(engine.phase(), Phase::Start);
        assert!(engine.is_playing());
        assert_eq!(clock.active_repeats(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![Phase::Start]);
    }

    #[tokio::test]
    async fn malformed_vector_before_first_play_does_not_load() {
        let source = PartialSource::serving(&Voice::ALL);
        let mut engine =
            Engine::new(EngineConfig::default(), source, ManualClock::new()).unwrap();
        assert!(engine.play(&[1.0; 3], Phase::Start).await.is_err());
        let states = settle(&engine, |s| s.ready_count() > 0).await;
        assert_eq!(states.ready_count(), 0);
    }

    #[tokio::test]
    async fn idle_phase_is_rejected() {
        let (mut engine, clock) = synth_engine();
        let err = engine.play(&vector(0.0), Phase::Idle).await.unwrap_err();
        assert!(matches!(err, EngineError::IdlePhase));
        assert_eq!(clock.active_repeats(), 0);
    }

    #[tokio::test]
    async fn play_loads_lazily() {
        let source = PartialSource::serving(&Voice::ALL);
        let clock = ManualClock::new();
        let mut engine = Engine::new(EngineConfig::default(), source, clock.clone()).unwrap();
        assert_eq!(engine.loaded_states().ready_count(), 0);

        engine.play(&vector(0.0), Phase::Start).await.unwrap();
        assert_eq!(clock.active_repeats(), 1);

        let states = engine.load().await;
        assert_eq!(states.ready_count(), 4);
    }

    #[tokio::test]
    async fn stalled_sample_load_does_not_block_playback() {
        let source = PartialSource {
            available: Voice::ALL.to_vec(),
            stalled: vec![Voice::Bass],
        };
        let clock = ManualClock::new();
        let mut engine = Engine::new(EngineConfig::default(), source, clock.clone()).unwrap();

        let played = tokio::time::timeout(
            Duration::from_secs(2),
            engine.play(&vector(0.0), Phase::Start),
        )
        .await;
        assert!(matches!(played, Ok(Ok(()))), "play waited on a stalled load");
        assert_eq!(clock.active_repeats(), 1);

        clock.advance(1);
        let output = engine.output();
        for voice in Voice::ALL {
            assert_eq!(output.sounding_notes(voice), 1, "{voice} silent on step 0");
        }

        let states = settle(&engine, |s| s.ready_count() == 3).await;
        assert!(!states.bass, "stalled voice must stay on fallback");
        assert!(states.tenor && states.alto && states.soprano);
    }

    #[tokio::test]
    async fn partial_load_failure_still_sounds_every_voice() {
        let _ = env_logger::builder().is_test(true).try_init();
        let source = PartialSource::serving(&[Voice::Bass, Voice::Soprano]);
        let clock = ManualClock::new();
        let mut engine = Engine::new(EngineConfig::default(), source, clock.clone()).unwrap();

        let states = engine.load().await;
        assert!(states.bass && states.soprano);
        assert!(!states.tenor && !states.alto);

        engine.play(&vector(0.0), Phase::Start).await.unwrap();
        clock.advance(1);

        let output = engine.output();
        for voice in Voice::ALL {
            assert_eq!(output.sounding_notes(voice), 1, "{voice} silent on step 0");
        }
        let mut block = vec![0.0; 4410];
        output.render(&mut block);
        assert!(block.iter().any(|s| s.abs() > 1e-3));
    }

    #[tokio::test]
    async fn clock_tempo_follows_composition() {
        let (mut engine, clock) = synth_engine();
        engine.play(&vector(0.0), Phase::Start).await.unwrap();
        assert_eq!(clock.bpm(), 60.0);
        engine.play(&vector(0.05), Phase::Traversal).await.unwrap();
        assert_eq!(clock.bpm(), 160.0);
    }

    #[tokio::test]
    async fn stop_silences_held_notes() {
        let (mut engine, clock) = synth_engine();
        engine.play(&vector(0.0), Phase::Start).await.unwrap();
        clock.advance(1);
        let output = engine.output();
        assert_eq!(output.sounding_notes(Voice::Bass), 1);

        engine.stop();
        clock.advance(8);
        for voice in Voice::ALL {
            assert_eq!(output.sounding_notes(voice), 0);
        }
    }

    #[tokio::test]
    async fn f32_output_matches_f64_mix() {
        let (mut wide, wide_clock) = synth_engine();
        let (mut narrow, narrow_clock) = synth_engine();
        for (engine, clock) in [(&mut wide, &wide_clock), (&mut narrow, &narrow_clock)] {
            engine.play(&vector(0.02), Phase::Start).await.unwrap();
            clock.advance(1);
        }

        let mut expected = vec![0.0; 512];
        wide.output().render(&mut expected);

        let mut output = narrow.output();
        let mut first = vec![0.0_f32; 256];
        let mut second = vec![0.0_f32; 256];
        output.render_f32(&mut first);
        output.render_f32(&mut second);

        for (i, (&got, &want)) in first.iter().chain(&second).zip(&expected).enumerate() {
            assert!((got as f64 - want).abs() < 1e-6, "sample {i}: {got} vs {want}");
        }
    }

    /// A tokio clock that counts every tick it delivers.
    #[derive(Clone)]
    struct CountingClock {
        inner: TokioClock,
        ticks: Arc<AtomicUsize>,
    }

    impl AudioClock for CountingClock {
        fn set_bpm(&self, bpm: f64) {
            self.inner.set_bpm(bpm);
        }
        fn bpm(&self) -> f64 {
            self.inner.bpm()
        }
        fn schedule_repeat(&self, interval: NoteValue, mut tick: TickFn) -> Box<dyn RepeatHandle> {
            let ticks = Arc::clone(&self.ticks);
            self.inner.schedule_repeat(
                interval,
                Box::new(move |time| {
                    ticks.fetch_add(1, Ordering::SeqCst);
                    tick(time);
                }),
            )
        }
    }

    #[tokio::test(start_paused = true)]
    async fn live_clock_runs_one_transport_at_a_time() {
        let clock = CountingClock {
            inner: TokioClock::current().unwrap(),
            ticks: Arc::new(AtomicUsize::new(0)),
        };
        let ticks = Arc::clone(&clock.ticks);
        let mut engine = Engine::new(EngineConfig::default(), NoSamples, clock).unwrap();
        let output = engine.output();

        // A zero vector plays at 60 bpm: a sixteenth every 250 ms, the
        // first one immediately.
        engine.play(&vector(0.0), Phase::Start).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        for voice in Voice::ALL {
            assert_eq!(output.sounding_notes(voice), 1, "{voice} silent on step 0");
        }

        engine.play(&vector(0.0), Phase::Traversal).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);

        // Only the second transport keeps ticking: 260, 510, 760, 1010 ms.
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 6);
        assert!(engine.is_playing());

        engine.stop();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 6);
        assert!(!engine.is_playing());
        for voice in Voice::ALL {
            assert_eq!(output.sounding_notes(voice), 0);
        }
    }

    /// Hands out handles whose cancel does nothing, like a tick already in
    /// flight when stop runs.
    #[derive(Clone, Default)]
    struct LeakyClock {
        ticks: Arc<Mutex<Vec<TickFn>>>,
    }

    struct NeverCancels;

    impl RepeatHandle for NeverCancels {
        fn cancel(&mut self) {}
        fn is_active(&self) -> bool {
            true
        }
    }

    impl AudioClock for LeakyClock {
        fn set_bpm(&self, _bpm: f64) {}
        fn bpm(&self) -> f64 {
            120.0
        }
        fn schedule_repeat(&self, _interval: NoteValue, tick: TickFn) -> Box<dyn RepeatHandle> {
            self.ticks.lock().unwrap().push(tick);
            Box::new(NeverCancels)
        }
    }

    #[tokio::test]
    async fn stale_ticks_after_stop_are_ignored() {
        let clock = LeakyClock::default();
        let mut engine =
            Engine::new(EngineConfig::default(), NoSamples, clock.clone()).unwrap();
        engine.play(&vector(0.0), Phase::Start).await.unwrap();
        engine.stop();

        for tick in clock.ticks.lock().unwrap().iter_mut() {
            tick(0.0);
        }
        assert_eq!(engine.output().sounding_notes(Voice::Bass), 0);
    }

    #[tokio::test]
    async fn dispose_abandons_loads_in_flight() {
        let source = PartialSource::serving(&Voice::ALL);
        let mut engine =
            Engine::new(EngineConfig::default(), source, ManualClock::new()).unwrap();
        engine.play(&vector(0.0), Phase::Start).await.unwrap();
        engine.dispose();

        let states = settle(&engine, |s| s.ready_count() > 0).await;
        assert_eq!(states.ready_count(), 0);
    }

    #[tokio::test]
    async fn reset_reloads_after_dispose() {
        let source = PartialSource::serving(&[Voice::Tenor]);
        let mut engine =
            Engine::new(EngineConfig::default(), source, ManualClock::new()).unwrap();
        let seen = recorder(&mut engine);

        engine.play(&vector(0.0), Phase::Traversal).await.unwrap();
        engine.dispose();
        assert_eq!(engine.loaded_states().ready_count(), 0);
        assert_eq!(engine.phase(), Phase::Idle);

        let states = engine.reset().await;
        assert!(states.tenor);
        assert_eq!(states.ready_count(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![Phase::Traversal, Phase::Idle]);
    }
}

//! Concurrent per-voice sample loading.

use std::sync::Arc;

use log::warn;
use tokio::task::JoinSet;

use super::source::SampleSource;
use crate::composition::Voice;
use crate::dsp::sampler::{SampleBuffer, Sampler};
use crate::error::SampleError;

/// Outcome of loading one voice.
pub type VoiceLoad = Result<Sampler, SampleError>;

/// Fetch and decode one voice's sample.
pub async fn load_sampler<S: SampleSource>(source: &S, voice: Voice) -> VoiceLoad {
    let bytes = source.fetch(voice).await?;
    let buffer = SampleBuffer::decode(&bytes)?;
    Ok(Sampler::new(buffer, voice.sample_root_note()))
}

/// Start one load task per voice on the current runtime.
///
/// `on_settled` runs as soon as each voice's load finishes, whatever the
/// others are doing, so a fetch that never resolves holds back only its own
/// voice. Joining the returned set waits for all four; dropping it aborts
/// loads still in flight.
pub fn spawn_voice_loads<S, F>(source: Arc<S>, on_settled: F) -> JoinSet<()>
where
    S: SampleSource + 'static,
    F: Fn(Voice, VoiceLoad) + Send + Sync + 'static,
{
    let on_settled = Arc::new(on_settled);
    let mut tasks = JoinSet::new();
    for voice in Voice::ALL {
        let source = Arc::clone(&source);
        let on_settled = Arc::clone(&on_settled);
        tasks.spawn(async move {
            let result = load_sampler(source.as_ref(), voice).await;
            if let Err(e) = &result {
                warn!("{voice} sample unavailable, using fallback synthesizer: {e}");
            }
            on_settled(voice, result);
        });
    }
    tasks
}

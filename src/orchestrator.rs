//! Component G — Stream Orchestrator.
//!
//! The sliding-window state machine described in spec §4.G, kept
//! transport-agnostic: [`Session`] only tracks buffered samples and
//! timing, and [`analyze_buffer`] only runs the A→D→F pipeline against a
//! snapshot. `api::ws` is the thing that actually reads frames off a
//! socket and hands `analyze_buffer` calls to a blocking worker pool
//! (spec §5) — this module has no I/O of its own, which is what makes it
//! straightforward to drive from tests without a live connection.

use serde::Serialize;

use crate::config::{
    DEFAULT_WS_SAMPLE_RATE, MAX_LISTEN_DURATION_SECS, RECOGNITION_INTERVAL_SECS, RECOGNITION_WINDOW_SECS, SAMPLE_RATE,
};
use crate::error::MusicaError;
use crate::matcher::{self, MatchOutcome};
use crate::pipeline;
use crate::store::{SongSummary, Store};
use crate::waveform;

/// Session states per spec §4.G: `waiting_config → buffering → analyzing
/// ↔ buffering → terminal`. Only `analyzing → buffering` is ever
/// revisited; `Terminal` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    WaitingConfig,
    Buffering,
    Analyzing,
    Terminal,
}

/// Tagged union of everything the orchestrator can emit, serialized at the
/// WS/REST boundary (spec §9 "tagged variants over dict payloads").
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status")]
#[serde(rename_all = "snake_case")]
pub enum StreamEvent {
    Listening { duration: f32 },
    Analyzing,
    MatchFound { song: SongSummary, confidence: f32, source: &'static str },
    NoMatch { message: String },
    Error { message: String },
}

/// Pure state for one live recognition session. Holds the rolling buffer
/// (trimmed for memory, spec §5 bound) and `total_samples` (never trimmed
/// — it's what `duration()` and the `MAX_LISTEN_DURATION` timeout are
/// measured against).
pub struct Session {
    sample_rate: u32,
    buffer: Vec<f32>,
    total_samples: u64,
    last_attempt_duration: Option<f32>,
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_WS_SAMPLE_RATE,
            buffer: Vec::new(),
            total_samples: 0,
            last_attempt_duration: None,
            state: SessionState::WaitingConfig,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Applies a `config` control frame. Only meaningful before audio
    /// arrives, but the spec places no restriction on when it may be sent
    /// — later frames simply change the rate future duration math uses.
    pub fn configure_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        if self.state == SessionState::WaitingConfig {
            self.state = SessionState::Buffering;
        }
    }

    /// Appends a binary audio frame and returns the `listening` event to
    /// emit for it (spec §4.G: "On each binary frame ... emit a
    /// `listening` event").
    pub fn push_audio(&mut self, chunk: &[f32]) -> StreamEvent {
        if self.state == SessionState::WaitingConfig {
            self.state = SessionState::Buffering;
        }
        self.buffer.extend_from_slice(chunk);
        self.total_samples += chunk.len() as u64;
        StreamEvent::Listening { duration: self.duration() }
    }

    pub fn duration(&self) -> f32 {
        self.total_samples as f32 / self.sample_rate as f32
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// True once `RECOGNITION_WINDOW` has elapsed and either no attempt
    /// has run yet or `RECOGNITION_INTERVAL` has passed since the last one.
    pub fn ready_for_attempt(&self) -> bool {
        let duration = self.duration();
        if duration < RECOGNITION_WINDOW_SECS {
            return false;
        }
        match self.last_attempt_duration {
            None => true,
            Some(last) => duration - last >= RECOGNITION_INTERVAL_SECS,
        }
    }

    /// True once `MAX_LISTEN_DURATION` has elapsed with no match — the
    /// caller should emit `no_match` and terminate (spec §4.G, §7 item 6).
    pub fn expired(&self) -> bool {
        self.duration() >= MAX_LISTEN_DURATION_SECS
    }

    /// Marks an attempt as starting and returns the buffer snapshot to
    /// analyze. Transitions `Buffering -> Analyzing`.
    pub fn begin_attempt(&mut self) -> Vec<f32> {
        self.state = SessionState::Analyzing;
        self.last_attempt_duration = Some(self.duration());
        self.buffer.clone()
    }

    /// Records a failed attempt: returns to `Buffering` and trims the
    /// buffer when it has grown past twice the keep window (spec §4.G,
    /// §9 Open Question 2 resolution).
    pub fn complete_attempt_no_match(&mut self) {
        self.state = SessionState::Buffering;
        self.trim_buffer();
    }

    /// Records a successful attempt: the session is now `Terminal`.
    pub fn complete_attempt_match(&mut self) {
        self.state = SessionState::Terminal;
    }

    pub fn terminate(&mut self) {
        self.state = SessionState::Terminal;
    }

    fn trim_buffer(&mut self) {
        let keep_secs = (RECOGNITION_WINDOW_SECS - RECOGNITION_INTERVAL_SECS).max(0.0);
        let keep_samples = (keep_secs * self.sample_rate as f32) as usize;

        if self.buffer.len() > 2 * keep_samples {
            let drop = self.buffer.len() - keep_samples;
            self.buffer.drain(0..drop);
        }
    }
}

/// Runs the A(resample)→B→C→D→F pipeline against a buffer snapshot taken
/// at `sample_rate` (spec §4.G "each attempt concatenates the buffer, runs
/// A→D→F"). CPU-heavy; callers run this on a blocking worker, never on
/// the I/O task (spec §5).
pub fn analyze_buffer(store: &Store, samples: &[f32], sample_rate: u32) -> Result<Option<MatchOutcome>, MusicaError> {
    let resampled = waveform::resample(samples, sample_rate, SAMPLE_RATE)?;
    let fingerprints = pipeline::fingerprint_samples(&resampled);
    matcher::match_fingerprints(store, &fingerprints)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_waiting_config_and_moves_to_buffering_on_first_audio() {
        let mut session = Session::new();
        assert_eq!(session.state(), SessionState::WaitingConfig);
        session.push_audio(&[0.0; 10]);
        assert_eq!(session.state(), SessionState::Buffering);
    }

    #[test]
    fn not_ready_before_recognition_window_elapses() {
        let mut session = Session::new();
        session.configure_sample_rate(1000);
        session.push_audio(&vec![0.0; 1000 * 4]); // 4s
        assert!(!session.ready_for_attempt());
        session.push_audio(&vec![0.0; 1000 * 4]); // 8s total
        assert!(session.ready_for_attempt());
    }

    #[test]
    fn not_ready_again_until_recognition_interval_elapses() {
        let mut session = Session::new();
        session.configure_sample_rate(1000);
        session.push_audio(&vec![0.0; 1000 * 8]); // 8s
        assert!(session.ready_for_attempt());
        session.begin_attempt();
        session.complete_attempt_no_match();
        assert!(!session.ready_for_attempt());

        session.push_audio(&vec![0.0; 1000 * 2]); // +2s, 10s total, only 2s since last attempt
        assert!(!session.ready_for_attempt());
        session.push_audio(&vec![0.0; 1000 * 1]); // +1s, 11s total, 3s since last attempt
        assert!(session.ready_for_attempt());
    }

    #[test]
    fn expires_at_max_listen_duration() {
        let mut session = Session::new();
        session.configure_sample_rate(1000);
        session.push_audio(&vec![0.0; 1000 * 34]);
        assert!(!session.expired());
        session.push_audio(&vec![0.0; 1000]);
        assert!(session.expired());
    }

    #[test]
    fn buffer_trims_only_past_twice_the_keep_window() {
        // keep window = RECOGNITION_WINDOW - RECOGNITION_INTERVAL = 5s; trim
        // threshold is 2x that, i.e. 10s (spec §4.G / §9 Open Question 2).
        let mut session = Session::new();
        session.configure_sample_rate(1000);
        session.push_audio(&vec![0.0; 1000 * 8]); // 8s, under the 10s trim threshold
        session.begin_attempt();
        session.complete_attempt_no_match();
        assert_eq!(session.buffer.len(), 8000);

        session.push_audio(&vec![0.0; 1000 * 3]); // total buffered 11s > 10s (2x5s)
        session.begin_attempt();
        session.complete_attempt_no_match();
        let keep_secs = RECOGNITION_WINDOW_SECS - RECOGNITION_INTERVAL_SECS;
        assert_eq!(session.buffer.len(), (keep_secs * 1000.0) as usize);
    }

    #[test]
    fn total_samples_keeps_growing_across_a_trim() {
        let mut session = Session::new();
        session.configure_sample_rate(1000);
        session.push_audio(&vec![0.0; 1000 * 20]);
        session.begin_attempt();
        session.complete_attempt_no_match();
        // duration must reflect everything ever received, not the trimmed buffer
        assert_eq!(session.duration(), 20.0);
    }

    #[test]
    fn match_found_state_is_absorbing() {
        let mut session = Session::new();
        session.push_audio(&vec![0.0; 100]);
        session.begin_attempt();
        session.complete_attempt_match();
        assert_eq!(session.state(), SessionState::Terminal);
    }
}

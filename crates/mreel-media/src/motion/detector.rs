//! State machine for converting frame signals to motion segments.
//!
//! The segmenter consumes one file's per-frame presence/movement signals
//! in order and produces the time ranges where a human kept moving long
//! enough to matter.
//!
//! # State Machine
//!
//! ```text
//!              moving run reaches min_moving_frames
//!  ┌──────┐   ┌──────────────┐   (start backdated)   ┌──────┐
//!  │ Idle │──▶│ Accumulating │──────────────────────▶│ Open │
//!  └──────┘   └──────────────┘                       └──────┘
//!     ▲              │ non-moving frame                  │
//!     │◀─────────────┘ (run must be contiguous)          │
//!     │                                                  │
//!     └────────── stationary run reaches ────────────────┘
//!                 max_stationary_frames (emit segment)
//! ```

use mreel_models::{FrameSignal, Segment};

use super::config::DetectorParams;
use crate::error::{MediaError, MediaResult};

/// Internal state for the segmenter state machine.
enum State {
    /// No recent movement.
    Idle,
    /// Counting consecutive moving frames, not yet a segment.
    Accumulating { run_start: f64, moving_frames: u32 },
    /// Inside a segment, tracking the stationary run that would close it.
    Open { start: f64, stationary_frames: u32 },
}

/// Converts a stream of frame signals into motion segments.
pub struct MotionSegmenter {
    params: DetectorParams,
    state: State,
    segments: Vec<Segment>,
}

impl MotionSegmenter {
    /// Create a new segmenter with the given parameters.
    pub fn new(params: DetectorParams) -> Self {
        Self {
            params,
            state: State::Idle,
            segments: Vec::new(),
        }
    }

    /// Process a single frame signal at the given timestamp (seconds).
    ///
    /// A frame counts as "moving" only when a pose is present AND a
    /// movement score was computable for it AND that score clears the
    /// threshold. The first present frame of any run carries no score and
    /// can therefore never open a segment by itself.
    pub fn ingest_frame(&mut self, signal: &FrameSignal, time: f64) {
        let is_moving = signal.present
            && signal
                .movement_score
                .is_some_and(|score| score >= self.params.movement_threshold);

        match (&mut self.state, is_moving) {
            (State::Idle, true) => {
                if self.params.min_moving_frames <= 1 {
                    self.state = State::Open {
                        start: time,
                        stationary_frames: 0,
                    };
                } else {
                    self.state = State::Accumulating {
                        run_start: time,
                        moving_frames: 1,
                    };
                }
            }
            (State::Idle, false) => {}
            (State::Accumulating {
                run_start,
                moving_frames,
            }, true) => {
                *moving_frames += 1;
                if *moving_frames >= self.params.min_moving_frames {
                    // Detection lag is backdated: the segment starts at the
                    // first frame of the moving run, not the one that
                    // confirmed it.
                    let start = *run_start;
                    self.state = State::Open {
                        start,
                        stationary_frames: 0,
                    };
                }
            }
            (State::Accumulating { .. }, false) => {
                // The run must be contiguous
                self.state = State::Idle;
            }
            (State::Open {
                stationary_frames, ..
            }, true) => {
                *stationary_frames = 0;
            }
            (State::Open {
                start,
                stationary_frames,
            }, false) => {
                *stationary_frames += 1;
                if *stationary_frames >= self.params.max_stationary_frames {
                    self.segments.push(Segment::new(*start, time));
                    self.state = State::Idle;
                }
            }
        }
    }

    /// Finalize processing and return the merged segment list.
    ///
    /// Must be called after all frames have been ingested; a segment still
    /// open at end of stream closes at `duration`.
    pub fn finalize(mut self, duration: f64) -> Vec<Segment> {
        if let State::Open { start, .. } = self.state {
            if start < duration {
                self.segments.push(Segment::new(start, duration));
            }
        }
        merge_close_segments(self.segments, self.params.merge_gap)
    }
}

/// Detect motion segments over a full frame-signal stream.
///
/// Single pass, O(frames). Timestamps are derived as `frame_index / fps`;
/// `duration` is the caller's `frame_count / fps`. A non-positive frame
/// rate makes timestamps meaningless and is a fatal input error. An empty
/// stream, or movement that never sustains `min_moving_frames`, yields an
/// empty list — the "nothing interesting happened" outcome.
pub fn detect_segments<I>(
    frames: I,
    fps: f64,
    duration: f64,
    params: &DetectorParams,
) -> MediaResult<Vec<Segment>>
where
    I: IntoIterator<Item = FrameSignal>,
{
    if fps <= 0.0 {
        return Err(MediaError::invalid_video(
            "Unable to read a positive frame rate from video",
        ));
    }

    let mut segmenter = MotionSegmenter::new(params.clone());
    for (frame_idx, signal) in frames.into_iter().enumerate() {
        segmenter.ingest_frame(&signal, frame_idx as f64 / fps);
    }
    Ok(segmenter.finalize(duration))
}

/// Merge adjacent segments whose gap is below the threshold.
///
/// Input segments are sorted and non-overlapping (the segmenter emits them
/// that way), so one left-to-right pass settles every merge. Idempotent on
/// its own output.
pub fn merge_close_segments(segments: Vec<Segment>, gap_threshold: f64) -> Vec<Segment> {
    let mut iter = segments.into_iter();
    let Some(first) = iter.next() else {
        return Vec::new();
    };

    let mut merged = Vec::new();
    let mut current = first;

    for next in iter {
        if next.start - current.end < gap_threshold {
            current.end = next.end; // extend across the small gap
        } else {
            merged.push(current);
            current = next;
        }
    }

    merged.push(current);
    merged
}

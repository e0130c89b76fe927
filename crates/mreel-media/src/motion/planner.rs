//! Extraction-window planning: buffer, clamp, deduplicate, drop.

use mreel_models::{ExtractionWindow, Segment};

use super::config::PlannerParams;

/// Windows shorter than this are not worth a cut.
const MIN_WINDOW_SECS: f64 = 1.0;

/// Turn detected segments into padded, clamped extraction windows.
///
/// Each segment gets `buffer_before`/`buffer_after` seconds of context,
/// clamped to `[0, duration]`. Padding can push neighboring windows into
/// each other; a window starting inside its predecessor is trimmed forward
/// so the cuts stay disjoint. Windows shorter than one second after
/// clamping are dropped. Order follows segment order (ascending start).
///
/// An empty result means "no plannable content" — the same outcome as an
/// empty segment list, not an error.
pub fn plan_windows(
    segments: &[Segment],
    duration: f64,
    params: &PlannerParams,
) -> Vec<ExtractionWindow> {
    let mut windows: Vec<ExtractionWindow> = Vec::with_capacity(segments.len());

    for segment in segments {
        let mut start = (segment.start - params.buffer_before).max(0.0);
        let end = (segment.end + params.buffer_after).min(duration);

        if let Some(prev) = windows.last() {
            if start < prev.end {
                start = prev.end;
            }
        }

        if end - start < MIN_WINDOW_SECS {
            continue;
        }

        windows.push(ExtractionWindow::new(start, end));
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(before: f64, after: f64) -> PlannerParams {
        PlannerParams {
            buffer_before: before,
            buffer_after: after,
        }
    }

    #[test]
    fn window_is_clamped_at_timeline_start() {
        let windows = plan_windows(&[Segment::new(1.0, 2.0)], 10.0, &params(2.0, 3.0));
        assert_eq!(windows.len(), 1);
        assert!((windows[0].start - 0.0).abs() < 1e-9);
        assert!((windows[0].end - 5.0).abs() < 1e-9);
    }

    #[test]
    fn tiny_segment_survives_when_buffers_carry_it_past_minimum() {
        let windows = plan_windows(&[Segment::new(0.1, 0.2)], 10.0, &params(2.0, 3.0));
        assert_eq!(windows.len(), 1);
        assert!((windows[0].start - 0.0).abs() < 1e-9);
        assert!((windows[0].end - 3.2).abs() < 1e-9);
        assert!(windows[0].duration() >= MIN_WINDOW_SECS);
    }

    #[test]
    fn sub_second_window_is_dropped() {
        let windows = plan_windows(&[Segment::new(9.95, 10.0)], 10.0, &params(0.0, 0.0));
        assert!(windows.is_empty());
    }

    #[test]
    fn window_is_clamped_at_timeline_end() {
        let windows = plan_windows(&[Segment::new(8.0, 9.5)], 10.0, &params(1.0, 5.0));
        assert_eq!(windows.len(), 1);
        assert!((windows[0].end - 10.0).abs() < 1e-9);
    }

    #[test]
    fn overlapping_padded_windows_are_trimmed_disjoint() {
        // Padding pushes the second window into the first
        let segments = [Segment::new(5.0, 8.4), Segment::new(12.0, 13.4)];
        let windows = plan_windows(&segments, 20.0, &params(2.0, 3.0));
        assert_eq!(windows.len(), 2);
        assert!((windows[0].start - 3.0).abs() < 1e-9);
        assert!((windows[0].end - 11.4).abs() < 1e-9);
        assert!((windows[1].start - 11.4).abs() < 1e-9);
        assert!((windows[1].end - 16.4).abs() < 1e-9);
        assert!(windows[0].end <= windows[1].start);
    }

    #[test]
    fn empty_segments_plan_nothing() {
        assert!(plan_windows(&[], 10.0, &PlannerParams::default()).is_empty());
    }

    #[test]
    fn order_follows_segment_order() {
        let segments = [
            Segment::new(1.0, 3.0),
            Segment::new(10.0, 12.0),
            Segment::new(20.0, 22.0),
        ];
        let windows = plan_windows(&segments, 30.0, &params(0.5, 0.5));
        assert_eq!(windows.len(), 3);
        for pair in windows.windows(2) {
            assert!(pair[0].start < pair[1].start);
        }
    }
}

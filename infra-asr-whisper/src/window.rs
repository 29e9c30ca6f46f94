use scribe_domain::{ChunkingParams, SAMPLE_RATE_HZ};

/// Slack when deciding whether a segment runs into the window edge.
const EDGE_TOLERANCE_SECONDS: f64 = 0.02;

/// One decoding window over the input, in samples.
///
/// Consecutive windows overlap by twice the stride. Each window owns the
/// middle of its span so that every instant of audio is owned by exactly one
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    pub len: usize,
    pub owned_from: usize,
    pub owned_to: usize,
    pub is_last: bool,
}

impl Window {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    pub fn offset_seconds(&self) -> f64 {
        to_seconds(self.offset)
    }

    pub fn duration_seconds(&self) -> f64 {
        to_seconds(self.len)
    }

    /// Whether a segment starting at `absolute_start` seconds belongs here.
    pub fn owns(&self, absolute_start: f64) -> bool {
        let from = to_seconds(self.owned_from);
        let to = to_seconds(self.owned_to);
        absolute_start >= from && (absolute_start < to || (self.is_last && absolute_start <= to))
    }

    /// A segment running into the right edge of a non-final window was cut
    /// off and has no trustworthy end.
    pub fn truncates(&self, relative_end: f64) -> bool {
        !self.is_last && relative_end >= self.duration_seconds() - EDGE_TOLERANCE_SECONDS
    }
}

pub fn plan_windows(sample_count: usize, params: &ChunkingParams) -> Vec<Window> {
    if sample_count == 0 {
        return Vec::new();
    }
    let chunk = to_samples(params.chunk_length_seconds).max(1);
    let stride = to_samples(params.stride_length_seconds).min((chunk - 1) / 2);
    let step = chunk - 2 * stride;

    let mut windows = Vec::new();
    let mut offset = 0;
    loop {
        let is_last = offset + chunk >= sample_count;
        let len = if is_last { sample_count - offset } else { chunk };
        windows.push(Window {
            offset,
            len,
            owned_from: if offset == 0 { 0 } else { offset + stride },
            owned_to: if is_last {
                sample_count
            } else {
                offset + chunk - stride
            },
            is_last,
        });
        if is_last {
            return windows;
        }
        offset += step;
    }
}

fn to_samples(seconds: f32) -> usize {
    (f64::from(seconds) * f64::from(SAMPLE_RATE_HZ)).round().max(0.0) as usize
}

fn to_seconds(samples: usize) -> f64 {
    samples as f64 / f64::from(SAMPLE_RATE_HZ)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(chunk: f32, stride: f32) -> ChunkingParams {
        ChunkingParams {
            chunk_length_seconds: chunk,
            stride_length_seconds: stride,
            ..ChunkingParams::default()
        }
    }

    #[test]
    fn short_audio_is_a_single_window() {
        let windows = plan_windows(16_000 * 10, &params(30.0, 5.0));

        assert_eq!(
            windows,
            vec![Window {
                offset: 0,
                len: 160_000,
                owned_from: 0,
                owned_to: 160_000,
                is_last: true,
            }]
        );
    }

    #[test]
    fn empty_audio_has_no_windows() {
        assert!(plan_windows(0, &params(30.0, 5.0)).is_empty());
    }

    #[test]
    fn owned_regions_tile_the_input() {
        let total = 16_000 * 95;
        let windows = plan_windows(total, &params(30.0, 5.0));

        assert_eq!(windows.len(), 5);
        assert_eq!(windows[1].offset, 16_000 * 20);
        assert_eq!(windows[0].owned_from, 0);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].owned_to, pair[1].owned_from);
            assert_eq!(pair[0].end() - pair[1].offset, 16_000 * 10);
        }
        let last = windows.last().expect("last window");
        assert!(last.is_last);
        assert_eq!(last.end(), total);
        assert_eq!(last.owned_to, total);
        assert!(windows[..windows.len() - 1].iter().all(|w| !w.is_last));
    }

    #[test]
    fn ownership_is_exclusive_at_boundaries() {
        let windows = plan_windows(16_000 * 60, &params(30.0, 5.0));
        let boundary = to_seconds(windows[0].owned_to);

        assert!(!windows[0].owns(boundary));
        assert!(windows[1].owns(boundary));
        assert!(windows[0].owns(boundary - 0.01));
    }

    #[test]
    fn segments_at_the_edge_of_inner_windows_are_truncated() {
        let windows = plan_windows(16_000 * 60, &params(30.0, 5.0));

        assert!(windows[0].truncates(30.0));
        assert!(!windows[0].truncates(24.0));
        assert!(!windows.last().expect("last").truncates(30.0));
    }
}

//! Parsing of `silencedetect` markers from ffmpeg stderr.

/// One audible interval of a source file, in seconds.
///
/// `end == None` marks an open-ended interval: audio runs from `start` to the
/// end of the file (the tool emitted a `silence_end` with no later
/// `silence_start`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudibleInterval {
    pub start: f64,
    pub end: Option<f64>,
}

impl AudibleInterval {
    /// Interval duration, or `None` when the interval is open-ended.
    pub fn duration(&self) -> Option<f64> {
        self.end.map(|end| end - self.start)
    }
}

/// Derive audible intervals from `silencedetect` stderr output.
///
/// The filter emits line-oriented markers:
///
/// ```text
/// [silencedetect @ 0x...] silence_start: 1.5055
/// [silencedetect @ 0x...] silence_end: 3.504 | silence_duration: 1.9985
/// ```
///
/// Audio is assumed to start at t=0; each `silence_start` closes the current
/// audible interval and each `silence_end` opens the next one. A stream that
/// ends outside silence yields a trailing open-ended interval. No markers at
/// all yields an empty list, which callers treat as a whole-file segment.
pub fn parse_silence_markers(stderr: &str) -> Vec<AudibleInterval> {
    let mut intervals = Vec::new();
    let mut start = 0.0f64;
    let mut in_audio = true;
    let mut saw_marker = false;

    for line in stderr.lines() {
        if let Some(t) = marker_value(line, "silence_start") {
            saw_marker = true;
            if in_audio && t > start {
                intervals.push(AudibleInterval {
                    start,
                    end: Some(t),
                });
            }
            in_audio = false;
        } else if let Some(t) = marker_value(line, "silence_end") {
            saw_marker = true;
            start = t;
            in_audio = true;
        }
    }

    if saw_marker && in_audio {
        intervals.push(AudibleInterval { start, end: None });
    }

    intervals
}

/// Extract the floating-point value following `<marker>:` on a line.
fn marker_value(line: &str, marker: &str) -> Option<f64> {
    let idx = line.find(marker)?;
    let rest = line[idx + marker.len()..]
        .trim_start()
        .trim_start_matches(':')
        .trim_start();
    rest.split_whitespace().next()?.parse().ok()
}

//! Parsing of ffmpeg's `-progress` key=value output.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FfmpegProgress {
    pub frame: u64,
    pub out_time_ms: i64,
    pub speed: f64,
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Percentage of `total_duration_ms` encoded so far.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if self.is_complete {
            return 100.0;
        }
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).clamp(0.0, 100.0)
    }
}

/// Folds one line into `current`; returns a snapshot at the end of each block.
pub fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let (key, value) = line.trim().split_once('=')?;

    match key {
        // ffmpeg reports out_time_ms in microseconds as well
        "out_time_us" | "out_time_ms" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return Some(current.clone());
        }
        _ => {}
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_snapshot_per_block() {
        let mut state = FfmpegProgress::default();

        assert!(parse_progress_line("frame=120", &mut state).is_none());
        assert!(parse_progress_line("out_time_us=5000000", &mut state).is_none());
        assert!(parse_progress_line("speed=1.5x", &mut state).is_none());
        let snap = parse_progress_line("progress=continue", &mut state).unwrap();

        assert_eq!(snap.frame, 120);
        assert_eq!(snap.out_time_ms, 5000);
        assert!((snap.speed - 1.5).abs() < 0.01);
        assert!((snap.percentage(10_000) - 50.0).abs() < 0.01);
    }

    #[test]
    fn end_of_stream_is_complete() {
        let mut state = FfmpegProgress::default();
        let snap = parse_progress_line("progress=end", &mut state).unwrap();
        assert!(snap.is_complete);
        assert_eq!(snap.percentage(0), 100.0);
    }

    #[test]
    fn ignores_noise() {
        let mut state = FfmpegProgress::default();
        assert!(parse_progress_line("speed=N/A", &mut state).is_none());
        assert!(parse_progress_line("garbage", &mut state).is_none());
        assert_eq!(state, FfmpegProgress::default());
    }
}

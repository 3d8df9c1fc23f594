//! Frame energy measurement for the software engine's voice scoring and
//! noise gate.

/// Floor reported for silent frames, well below any gate threshold.
pub const SILENCE_DBFS: f32 = -100.0;

/// Root-mean-square level of a frame, normalized to 0.0..=1.0 of full scale.
pub fn frame_rms(frame: &[i16]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let mean_square = frame
        .iter()
        .map(|&s| {
            let normalized = f64::from(s) / f64::from(i16::MAX);
            normalized * normalized
        })
        .sum::<f64>()
        / frame.len() as f64;
    mean_square.sqrt() as f32
}

pub fn rms_to_dbfs(rms: f32) -> f32 {
    if rms <= 1e-10 {
        return SILENCE_DBFS;
    }
    20.0 * rms.log10()
}

pub fn frame_dbfs(frame: &[i16]) -> f32 {
    rms_to_dbfs(frame_rms(frame))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_frame_reports_the_floor() {
        assert_eq!(frame_dbfs(&[0i16; 320]), SILENCE_DBFS);
        assert_eq!(frame_dbfs(&[]), SILENCE_DBFS);
    }

    #[test]
    fn full_scale_square_wave_is_zero_dbfs() {
        let frame: Vec<i16> = (0..320)
            .map(|i| if i % 2 == 0 { i16::MAX } else { -i16::MAX })
            .collect();
        assert!(frame_dbfs(&frame).abs() < 0.01);
    }

    #[test]
    fn half_scale_square_wave_is_six_db_down() {
        let half = i16::MAX / 2;
        let frame: Vec<i16> = (0..320)
            .map(|i| if i % 2 == 0 { half } else { -half })
            .collect();
        let db = frame_dbfs(&frame);
        assert!((db - (-6.02)).abs() < 0.05, "got {db}");
    }

    #[test]
    fn rms_is_amplitude_linear() {
        let quarter = vec![i16::MAX / 4; 160];
        let half = vec![i16::MAX / 2; 160];
        let ratio = frame_rms(&half) / frame_rms(&quarter);
        assert!((ratio - 2.0).abs() < 0.01, "got {ratio}");
    }
}

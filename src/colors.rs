//! Sentiment color ramp.
//!
//! Scores at or above 0.3 are green, at or below -0.3 red, and yellow in
//! between. Intensity grows with magnitude. Alpha is fixed at 200.

/// Magnitude at which a score stops being neutral.
const NEUTRAL_BAND: f64 = 0.3;
const ALPHA: u8 = 200;

/// RGBA color for a sentiment score in `[-1, 1]`. Out-of-range scores saturate; NaN is neutral.
///
/// # Example
/// ```
/// use sentiment_mapper::sentiment_color;
///
/// assert_eq!(sentiment_color(1.0), [0, 255, 0, 200]);
/// assert_eq!(sentiment_color(-1.0), [255, 0, 0, 200]);
/// assert_eq!(sentiment_color(0.0), [200, 200, 0, 200]);
/// ```
pub fn sentiment_color(sentiment: f64) -> [u8; 4] {
    if sentiment.is_nan() {
        return [200, 200, 0, ALPHA];
    }

    if sentiment >= NEUTRAL_BAND {
        [0, channel(sentiment.min(1.0)), 0, ALPHA]
    } else if sentiment <= -NEUTRAL_BAND {
        [channel(sentiment.abs().min(1.0)), 0, 0, ALPHA]
    } else {
        let level = channel(sentiment.abs() / NEUTRAL_BAND);
        [level, level, 0, ALPHA]
    }
}

fn channel(intensity: f64) -> u8 {
    (200.0 + 55.0 * intensity).floor() as u8
}

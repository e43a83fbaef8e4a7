//! Declared-duration parsing for test metadata.

const SECONDS_PER_MINUTE: u32 = 60;

/// Converts a duration label such as `"30 minutes"` into seconds.
///
/// Only the leading integer is read (leading whitespace is skipped) and it is
/// interpreted as minutes. Labels without a leading number yield `0`, which the
/// session controller rejects before starting a countdown.
#[must_use]
pub fn parse_duration_label(label: &str) -> u32 {
    let digits: String = label
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();

    if digits.is_empty() {
        return 0;
    }

    // Overlong digit runs saturate instead of wrapping.
    let minutes = digits.parse::<u32>().unwrap_or(u32::MAX);
    minutes.saturating_mul(SECONDS_PER_MINUTE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_leading_minutes() {
        assert_eq!(parse_duration_label("30 minutes"), 1800);
        assert_eq!(parse_duration_label("10min"), 600);
        assert_eq!(parse_duration_label("  45 分钟"), 2700);
    }

    #[test]
    fn unparsable_labels_are_zero() {
        assert_eq!(parse_duration_label(""), 0);
        assert_eq!(parse_duration_label("about 30 minutes"), 0);
        assert_eq!(parse_duration_label("-5 minutes"), 0);
    }

    #[test]
    fn huge_values_saturate() {
        assert_eq!(parse_duration_label("99999999999 minutes"), u32::MAX);
    }
}

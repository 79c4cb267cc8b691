/// Characters per word. Fixed by convention.
pub const CHARS_PER_WORD: f64 = 5.0;

/// Words per minute from correctly typed characters over `duration_secs`.
/// A zero duration yields zero.
pub fn compute_wpm(correct_chars: usize, duration_secs: u64) -> u32 {
    if duration_secs == 0 {
        return 0;
    }
    let words = correct_chars as f64 / CHARS_PER_WORD;
    let minutes = duration_secs as f64 / 60.0;
    (words / minutes).round() as u32
}

/// Accuracy as a whole percentage. Nothing typed counts as 100.
pub fn compute_accuracy(correct_chars: usize, total_typed: usize) -> u32 {
    if total_typed == 0 {
        return 100;
    }
    ((correct_chars as f64 / total_typed as f64) * 100.0).round() as u32
}

/// Number of typed characters that match the target at the same position
pub fn correct_chars(target: &str, typed: &[char]) -> usize {
    target
        .chars()
        .zip(typed.iter())
        .filter(|(expected, actual)| expected == *actual)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wpm_zero_duration() {
        assert_eq!(compute_wpm(100, 0), 0);
    }

    #[test]
    fn test_wpm_zero_correct() {
        for secs in [1, 15, 30, 60, 3600] {
            assert_eq!(compute_wpm(0, secs), 0);
        }
    }

    #[test]
    fn test_wpm_half_minute() {
        // (25 / 5) / 0.5
        assert_eq!(compute_wpm(25, 30), 10);
    }

    #[test]
    fn test_wpm_rounds_to_nearest() {
        // (7 / 5) / 1 = 1.4
        assert_eq!(compute_wpm(7, 60), 1);
        // (13 / 5) / 1 = 2.6
        assert_eq!(compute_wpm(13, 60), 3);
        // (12.5 / 5) = 2.5 rounds up
        assert_eq!(compute_wpm(25, 120), 3);
    }

    #[test]
    fn test_accuracy_nothing_typed() {
        assert_eq!(compute_accuracy(0, 0), 100);
        assert_eq!(compute_accuracy(42, 0), 100);
    }

    #[test]
    fn test_accuracy_values() {
        assert_eq!(compute_accuracy(3, 4), 75);
        assert_eq!(compute_accuracy(2, 3), 67);
        assert_eq!(compute_accuracy(1, 3), 33);
        assert_eq!(compute_accuracy(10, 10), 100);
        assert_eq!(compute_accuracy(0, 10), 0);
    }

    #[test]
    fn test_accuracy_monotonic_in_correct() {
        for total in 1..50usize {
            let mut prev = 0;
            for correct in 0..=total {
                let acc = compute_accuracy(correct, total);
                assert!(acc >= prev, "accuracy dropped at {correct}/{total}");
                assert!(acc <= 100);
                prev = acc;
            }
        }
    }

    #[test]
    fn test_correct_chars() {
        let typed: Vec<char> = "xat".chars().collect();
        assert_eq!(correct_chars("cat", &typed), 2);
        assert_eq!(correct_chars("cat", &[]), 0);

        let partial: Vec<char> = "ca".chars().collect();
        assert_eq!(correct_chars("cat", &partial), 2);
    }

    #[test]
    fn test_correct_chars_multibyte() {
        let typed: Vec<char> = "cafe".chars().collect();
        assert_eq!(correct_chars("café", &typed), 3);
    }
}

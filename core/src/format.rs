//! Compact number rendering for summaries: 1234 -> "1.23K".

const SUFFIXES: [&str; 7] = ["", "K", "M", "B", "T", "Qa", "Qi"];

const SIGNIFICANT_DIGITS: u32 = 3;

/// Three significant digits with a thousands suffix. Values below 1000 are
/// printed as-is.
///
/// Digits are computed on integers so exact values never lose a unit to
/// binary float error. Exact halves round down; a result that reaches 1000
/// carries into the next suffix ("999_999" -> "1.00M").
pub fn compact(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = u128::from(value.unsigned_abs());
    if magnitude < 1000 {
        return format!("{sign}{magnitude}");
    }

    let mut tier = 0;
    while tier < SUFFIXES.len() - 1 && magnitude >= 1000u128.pow(tier as u32 + 1) {
        tier += 1;
    }

    let unit = 1000u128.pow(tier as u32);
    let decimals = SIGNIFICANT_DIGITS.saturating_sub(digit_count(magnitude / unit));
    let mut scale = 10u128.pow(decimals);
    let mut rounded = round_half_down(magnitude * scale, unit);

    if rounded >= 1000 * scale && tier < SUFFIXES.len() - 1 {
        // Only a three-digit integer part can reach 1000, so the carry is
        // always exactly 1 of the next suffix.
        tier += 1;
        scale = 10u128.pow(SIGNIFICANT_DIGITS - 1);
        rounded = scale;
    }

    let whole = rounded / scale;
    let text = if scale > 1 {
        let width = scale.ilog10() as usize;
        format!("{whole}.{:0width$}", rounded % scale)
    } else {
        whole.to_string()
    };
    format!("{sign}{text}{}", SUFFIXES[tier])
}

fn digit_count(value: u128) -> u32 {
    if value == 0 { 1 } else { value.ilog10() + 1 }
}

/// `numerator / denominator` to the nearest integer, ties toward zero.
fn round_half_down(numerator: u128, denominator: u128) -> u128 {
    (2 * numerator + denominator - 1) / (2 * denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_are_plain() {
        assert_eq!(compact(0), "0");
        assert_eq!(compact(999), "999");
        assert_eq!(compact(-42), "-42");
    }

    #[test]
    fn suffixes_keep_three_significant_digits() {
        assert_eq!(compact(1_000), "1.00K");
        assert_eq!(compact(1_234), "1.23K");
        assert_eq!(compact(12_345), "12.3K");
        assert_eq!(compact(123_456), "123K");
        assert_eq!(compact(2_500_000), "2.50M");
        assert_eq!(compact(7_000_000_000), "7.00B");
        assert_eq!(compact(-1_500), "-1.50K");
    }

    #[test]
    fn exact_values_do_not_lose_a_unit() {
        assert_eq!(compact(1_150), "1.15K");
        assert_eq!(compact(4_350), "4.35K");
        assert_eq!(compact(2_300_000), "2.30M");
    }

    #[test]
    fn rounding_goes_to_nearest_with_ties_down() {
        assert_eq!(compact(1_236), "1.24K");
        assert_eq!(compact(1_235), "1.23K");
        assert_eq!(compact(45_678), "45.7K");
    }

    #[test]
    fn rounding_up_to_a_thousand_carries_the_suffix() {
        assert_eq!(compact(999_999), "1.00M");
        assert_eq!(compact(999_499), "999K");
        assert_eq!(compact(-999_999_999), "-1.00B");
    }

    #[test]
    fn largest_tier_caps_at_quintillion() {
        assert_eq!(compact(i64::MAX), "9.22Qi");
        assert_eq!(compact(i64::MIN), "-9.22Qi");
    }
}

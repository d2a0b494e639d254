//! Exchange-granularity rounding helpers.

use rust_decimal::Decimal;

/// Floor `value` to the nearest lower multiple of `step`.
///
/// Flooring is deliberate: a sell quantity must never exceed what is
/// actually held, and a limit price must never overshoot the computed
/// target. A non-positive `step` returns `value` unchanged; exchange
/// filters guarantee positive steps.
pub fn floor_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return value;
    }
    (value / step).floor() * step
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn result_never_exceeds_input() {
        let cases = [
            ("0.0454", "0.001"),
            ("1.9999", "0.5"),
            ("60936.6667", "0.01"),
            ("0.0001", "0.001"),
        ];
        for (value, step) in cases {
            assert!(floor_to_step(dec(value), dec(step)) <= dec(value));
        }
    }

    #[test]
    fn result_is_exact_multiple_of_step() {
        let floored = floor_to_step(dec("0.0454"), dec("0.001"));
        assert_eq!(floored, dec("0.045"));
        assert_eq!(floored % dec("0.001"), Decimal::ZERO);
    }

    #[test]
    fn exact_multiples_pass_through() {
        assert_eq!(floor_to_step(dec("0.045"), dec("0.001")), dec("0.045"));
        assert_eq!(floor_to_step(dec("61000"), dec("0.01")), dec("61000"));
    }

    #[test]
    fn sub_step_quantity_floors_to_zero() {
        assert_eq!(floor_to_step(dec("0.0004"), dec("0.001")), Decimal::ZERO);
    }

    #[test]
    fn non_positive_step_leaves_value_unchanged() {
        assert_eq!(floor_to_step(dec("1.23"), Decimal::ZERO), dec("1.23"));
    }
}

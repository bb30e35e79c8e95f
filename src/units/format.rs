//! Presentation formatting by unit.

use super::UnitType;

/// Placeholder shown when a value is missing.
const NO_DATA: &str = "-";

/// Human-readable unit name.
pub fn unit_label(unit: UnitType) -> &'static str {
    match unit {
        UnitType::Count => "Count",
        UnitType::Currency => "Currency",
        UnitType::Ratio => "Ratio",
        UnitType::Percentage => "Percentage",
        UnitType::Duration => "Duration",
        UnitType::Number => "Number",
    }
}

/// Format a value for display according to its unit's storage rules.
///
/// Currency is stored in cents and rendered in major units; percentages are
/// stored as fractions; durations are stored in seconds.
pub fn format_value_by_unit(value: Option<f64>, unit: UnitType) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return NO_DATA.to_string();
    };

    match unit {
        UnitType::Currency => {
            let (sign, digits) = fixed(value / 100.0, 2);
            format!("{}${}", sign, digits)
        }
        UnitType::Count => {
            let (sign, digits) = fixed(value, 0);
            format!("{}{}", sign, digits)
        }
        UnitType::Ratio => {
            let (sign, digits) = fixed(value, 2);
            format!("{}{}", sign, digits)
        }
        UnitType::Percentage => {
            let (sign, digits) = fixed(value * 100.0, 1);
            format!("{}{}%", sign, digits)
        }
        UnitType::Duration => format_duration(value),
        UnitType::Number => {
            let (sign, digits) = fixed(value, 2);
            let digits = if digits.contains('.') {
                digits.trim_end_matches('0').trim_end_matches('.').to_string()
            } else {
                digits
            };
            format!("{}{}", sign, digits)
        }
    }
}

/// Fixed-point digits with thousands separators, plus the sign separately
/// so callers can put a currency symbol between them. Values that round to
/// zero never carry a sign.
fn fixed(value: f64, decimals: usize) -> (&'static str, String) {
    let text = format!("{:.*}", decimals, value.abs());
    let is_zero = text.chars().all(|c| c == '0' || c == '.');
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };

    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => (sign, format!("{}.{}", grouped, frac)),
        None => (sign, grouped),
    }
}

fn format_duration(seconds: f64) -> String {
    let sign = if seconds < 0.0 { "-" } else { "" };
    let total = seconds.abs().round() as u64;

    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let secs = total % 60;

    let parts: Vec<String> = [(days, "d"), (hours, "h"), (minutes, "m"), (secs, "s")]
        .iter()
        .skip_while(|(n, _)| *n == 0)
        .take(2)
        .filter(|(n, _)| *n > 0)
        .map(|(n, suffix)| format!("{}{}", n, suffix))
        .collect();

    if parts.is_empty() {
        "0s".to_string()
    } else {
        format!("{}{}", sign, parts.join(" "))
    }
}

//! Display formatting for metric values.
//!
//! Pure string helpers used by whatever surface renders the stored
//! snapshot. Non-finite inputs render as their zero form rather than
//! leaking `NaN` into output.

use chrono::NaiveDate;

/// `$1,234.56` with thousands separators, `$0.00` for non-finite input.
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return "$0.00".to_string();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}${}", group_thousands(value.abs()))
}

/// Signed percentage with two decimals, e.g. `+2.34%` or `-1.23%`.
pub fn format_percentage(value: f64) -> String {
    if !value.is_finite() {
        return "0.00%".to_string();
    }
    let sign = if value > 0.0 { "+" } else { "" };
    format!("{sign}{value:.2}%")
}

/// One-decimal percentage. Values in 0..=1 are treated as fractions,
/// larger values as already-scaled percentages.
pub fn format_probability(value: f64) -> String {
    if !value.is_finite() {
        return "0.0%".to_string();
    }
    let percentage = if value > 1.0 { value } else { value * 100.0 };
    format!("{percentage:.1}%")
}

/// Abbreviated magnitude: `1.20K`, `3.40M`, `1.50B`.
pub fn format_large_number(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let abs = value.abs();
    let sign = if value < 0.0 { "-" } else { "" };
    if abs >= 1_000_000_000.0 {
        format!("{sign}{:.2}B", abs / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("{sign}{:.2}M", abs / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{sign}{:.2}K", abs / 1_000.0)
    } else {
        format!("{sign}{abs:.2}")
    }
}

/// Relative age of a millisecond timestamp, e.g. `5 minutes ago`.
/// A zero or missing timestamp renders as `Never`.
pub fn format_relative_time(timestamp: i64, now: i64) -> String {
    if timestamp <= 0 {
        return "Never".to_string();
    }
    let seconds = (now - timestamp) / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if seconds < 60 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} minute{} ago", plural(minutes))
    } else if hours < 24 {
        format!("{hours} hour{} ago", plural(hours))
    } else {
        format!("{days} day{} ago", plural(days))
    }
}

/// `2026-01-15` -> `Jan 15, 2026`. Unparseable input is passed through.
pub fn format_date(date: &str) -> String {
    if date.is_empty() {
        return "Unknown".to_string();
    }
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(parsed) => parsed.format("%b %-d, %Y").to_string(),
        Err(_) => date.to_string(),
    }
}

/// Direction of a change value, for styling.
pub fn change_direction(value: f64) -> &'static str {
    if value > 0.0 {
        "positive"
    } else if value < 0.0 {
        "negative"
    } else {
        "neutral"
    }
}

/// Cap text at `max_length` characters, ellipsising the overflow. A cap
/// too small to fit the ellipsis yields a plain prefix instead.
pub fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    if max_length < 3 {
        return text.chars().take(max_length).collect();
    }
    let truncated: String = text.chars().take(max_length - 3).collect();
    format!("{truncated}...")
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn group_thousands(value: f64) -> String {
    let raw = format!("{value:.2}");
    let (whole, frac) = raw.split_once('.').unwrap_or((raw.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{grouped}.{frac}")
}

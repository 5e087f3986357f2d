//! Formatting helpers for report lines.

use std::time::Duration;

/// Formats a duration rounded to whole seconds, omitting zero leading units:
/// `"7s"`, `"3m 0s"`, `"1h 1m 5s"`.
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let rounded = d.as_secs() + u64::from(d.subsec_millis() >= 500);
    let (hours, minutes, seconds) = (rounded / 3600, (rounded % 3600) / 60, rounded % 60);

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h "));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m "));
    }
    out.push_str(&format!("{seconds}s"));
    out
}

/// Formats a byte count with binary units (B, KB, MB, GB).
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

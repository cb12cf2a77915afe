/// Formatting helpers shared by the CLI, dashboard and API

use chrono::{DateTime, Local, Utc};

/// Local "HH:MM" for an optional instant, "—" when missing
pub fn format_clock(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "—".to_string())
}

/// Local "YYYY-mm-dd HH:MM:SS" for an instant
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Minutes with one decimal, "—" for nothing to show
pub fn format_minutes(value: f64) -> String {
    if value <= 0.0 {
        "—".to_string()
    } else {
        format!("{:.1} min", value)
    }
}

/// Truncate string with ellipsis, on a character boundary
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Mask sensitive data (show only first and last N characters)
pub fn mask_sensitive(value: &str, visible_chars: usize) -> String {
    let count = value.chars().count();
    if count <= visible_chars * 2 {
        "*".repeat(count)
    } else {
        let start: String = value.chars().take(visible_chars).collect();
        let end: String = value.chars().skip(count - visible_chars).collect();
        format!("{}...{}", start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock_missing() {
        assert_eq!(format_clock(None), "—");
        assert_eq!(format_clock(Some(Utc::now())).len(), 5);
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(0.0), "—");
        assert_eq!(format_minutes(12.25), "12.2 min");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("Shillong Polyclinic & Trauma", 12), "Shillong ...");
        assert_eq!(truncate_string("ñññññ", 4), "ñ...");
    }

    #[test]
    fn test_mask_sensitive() {
        let token = "5e7f294e4c92a9aa661fae8d347d832d";
        let masked = mask_sensitive(token, 4);
        assert_eq!(masked, "5e7f...832d");
        assert_eq!(mask_sensitive("abc", 4), "***");
    }

    #[test]
    fn test_mask_sensitive_multibyte() {
        assert_eq!(mask_sensitive("ñandú-clave-secreta-ü", 2), "ña...-ü");
        assert_eq!(mask_sensitive("ñü", 2), "**");
    }
}

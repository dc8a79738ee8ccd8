use chrono::NaiveDate;

/// Parse a date string in one of the accepted short formats.
pub fn parse_date(date_str: &str) -> Option<NaiveDate> {
    const FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_str, fmt).ok())
}

/// Format a byte count as a human-readable size, e.g. "1.50 MB".
pub fn format_size(size_bytes: u64) -> String {
    let mut size = size_bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} PB")
}

/// Parse a size string like "5MB" or "1.5GB" into bytes.
///
/// A bare number is taken as bytes. Longer unit suffixes are checked first
/// so "KB" is never mistaken for a trailing "B".
pub fn parse_size(size_str: &str) -> Option<u64> {
    let s = size_str.trim().to_uppercase();

    const UNITS: [(&str, u64); 5] = [
        ("TB", 1 << 40),
        ("GB", 1 << 30),
        ("MB", 1 << 20),
        ("KB", 1 << 10),
        ("B", 1),
    ];

    for (unit, multiplier) in UNITS {
        if let Some(value) = s.strip_suffix(unit) {
            let value: f64 = value.trim().parse().ok()?;
            if value < 0.0 {
                return None;
            }
            return Some((value * multiplier as f64) as u64);
        }
    }

    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
        assert_eq!(parse_date("2023-06-15"), Some(expected));
        assert_eq!(parse_date("2023/06/15"), Some(expected));
        assert_eq!(parse_date("15-06-2023"), Some(expected));
        assert_eq!(parse_date("15/06/2023"), Some(expected));
    }

    #[test]
    fn rejects_garbage_dates() {
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("2023-13-45"), None);
    }

    #[test]
    fn formats_sizes_across_units() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(512), "512.00 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(1 << 30), "1.00 GB");
    }

    #[test]
    fn parses_sizes_with_units() {
        assert_eq!(parse_size("5MB"), Some(5 * 1024 * 1024));
        assert_eq!(parse_size("1.5GB"), Some((1.5 * (1u64 << 30) as f64) as u64));
        assert_eq!(parse_size("100"), Some(100));
        assert_eq!(parse_size("2kb"), Some(2048));
        assert_eq!(parse_size("10 KB"), Some(10 * 1024));
    }

    #[test]
    fn rejects_invalid_sizes() {
        assert_eq!(parse_size("lots"), None);
        assert_eq!(parse_size("MB"), None);
        assert_eq!(parse_size(""), None);
    }
}

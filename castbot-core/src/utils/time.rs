use chrono::{DateTime, Utc};

/// Human readable elapsed time since `started`, e.g. `2h 05m 09s`.
/// Negative spans (clock skew) collapse to `0s`.
pub fn format_elapsed(started: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let total = now.signed_duration_since(started).num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Elapsed time from `started` until now.
pub fn uptime(started: DateTime<Utc>) -> String {
    format_elapsed(started, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_elapsed_units() {
        let start = Utc::now();
        assert_eq!(format_elapsed(start, start + Duration::seconds(9)), "9s");
        assert_eq!(format_elapsed(start, start + Duration::seconds(125)), "2m 05s");
        assert_eq!(format_elapsed(start, start + Duration::seconds(7509)), "2h 05m 09s");
        assert_eq!(format_elapsed(start, start - Duration::seconds(30)), "0s");
    }
}

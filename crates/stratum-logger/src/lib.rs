pub mod severity;
pub mod time;

pub use severity::LogSeverity;

use once_cell::sync::OnceCell;

static MIN_SEVERITY: OnceCell<LogSeverity> = OnceCell::new();

/// Sets the process-wide minimum severity. May be called once; later calls
/// are ignored so library code cannot override the host's choice.
pub fn set_min_severity(severity: LogSeverity) {
    let _ = MIN_SEVERITY.set(severity);
}

fn min_severity() -> LogSeverity {
    *MIN_SEVERITY.get().unwrap_or(&LogSeverity::Info)
}

pub fn log(msg: String, log_severity: LogSeverity) {
    if log_severity < min_severity() {
        return;
    }
    println!("[{}] {} {}", log_severity, time::now(), msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_min_severity_is_info() {
        assert_eq!(min_severity(), LogSeverity::Info);
    }

    #[test]
    fn test_timestamp_has_date_and_time() {
        let stamp = time::now();
        // YYYY-MM-DD HH:MM:SS prefix at minimum
        assert!(stamp.len() >= 19, "unexpected timestamp: {stamp}");
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[13..14], ":");
    }
}

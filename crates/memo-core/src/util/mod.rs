pub mod http;

use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(path)?;
    Ok(path.to_path_buf())
}

/// Current time, strictly after `previous`.
///
/// Two mutations landing on the same clock tick still get ordered
/// `updated_at` values.
pub fn timestamp_after(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}

/// Truncate a string to max length, adding suffix if truncated.
pub fn truncate_string(s: &str, max_len: usize, suffix: &str) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len.saturating_sub(suffix.len());
    // Ensure we don't split a multi-byte UTF-8 character
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &s[..end], suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10, "..."), "hello");
        assert_eq!(truncate_string("hello world", 8, "..."), "hello...");
        assert_eq!(truncate_string("ab", 2, "..."), "ab");
        // multi-byte input never splits a character
        assert_eq!(truncate_string("메모메모", 7, "…"), "메…");
    }

    #[test]
    fn test_timestamp_after_past() {
        let past = Utc::now() - Duration::seconds(10);
        assert!(timestamp_after(past) > past);
    }

    #[test]
    fn test_timestamp_after_future() {
        let future = Utc::now() + Duration::seconds(60);
        assert_eq!(timestamp_after(future), future + Duration::milliseconds(1));
    }

    #[test]
    fn test_ensure_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let subdir = tmp.path().join("a").join("b");
        assert!(!subdir.exists());
        ensure_dir(&subdir).unwrap();
        assert!(subdir.exists());
    }
}

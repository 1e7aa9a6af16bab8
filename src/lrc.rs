//! LRC timestamp helpers.
//!
//! Synchronized lyric lines carry a `[mm:ss.mmm]` prefix:
//! [00:12.340]Hello world
//! [00:15.000]Another line

/// Format a millisecond offset as an LRC line prefix.
pub fn timestamp(ms: i64) -> String {
    let ms = ms.max(0);
    let total_secs = ms / 1000;
    format!("[{:02}:{:02}.{:03}]", total_secs / 60, total_secs % 60, ms % 1000)
}

/// Join `(start_ms, text)` pairs into an LRC body, one line per entry,
/// no trailing newline. Entries whose text trims to empty are dropped;
/// the rest keep their input order.
pub fn join_timed_lines<'a>(lines: impl IntoIterator<Item = (i64, &'a str)>) -> String {
    lines
        .into_iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(ms, text)| format!("{}{}", timestamp(ms), text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp() {
        assert_eq!(timestamp(0), "[00:00.000]");
        assert_eq!(timestamp(65432), "[01:05.432]");
        assert_eq!(timestamp(1000), "[00:01.000]");
        assert_eq!(timestamp(600_000), "[10:00.000]");
    }

    #[test]
    fn test_join_drops_blank_lines() {
        let body = join_timed_lines([(0, "la"), (500, "  "), (1000, "la la")]);
        assert_eq!(body, "[00:00.000]la\n[00:01.000]la la");
    }

    #[test]
    fn test_join_preserves_input_order() {
        // Provider order is authoritative even when timestamps regress.
        let body = join_timed_lines([(2000, "b"), (1000, "a")]);
        assert_eq!(body, "[00:02.000]b\n[00:01.000]a");
    }
}

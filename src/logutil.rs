//! Logging helpers for autopilot-supplied text.
//! `STATUSTEXT` payloads arrive NUL padded and occasionally carry control bytes;
//! these keep them on one log line.

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
///   Trailing NUL padding is dropped and over-long text is cut with an ellipsis.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 200; // STATUSTEXT chunks are 50 bytes; leave room for joined chunks
    let s = s.trim_end_matches('\0');
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::escape_log;

    #[test]
    fn strips_padding_and_escapes_controls() {
        assert_eq!(escape_log("PreArm: GPS\n\0\0\0"), "PreArm: GPS\\n");
        assert_eq!(escape_log("a\x07b"), "a\\x07b");
    }

    #[test]
    fn truncates_long_text() {
        let long = "x".repeat(500);
        let esc = escape_log(&long);
        assert!(esc.ends_with('…'));
        assert_eq!(esc.chars().count(), 201);
    }
}

//! Helpers for logging wire traffic. Board payloads embed newlines, so every line
//! read from or written to the device goes through [`escape_log`] before it is logged.

/// Longest wire preview logged, in characters.
pub const WIRE_PREVIEW_CHARS: usize = 200;

/// Escape control characters so `s` renders on a single log line, truncating to
/// `max_chars` characters with a trailing ellipsis.
///
/// `\n`, `\r`, `\t` and backslash use their usual escapes; any other control
/// character becomes `\xNN`.
pub fn escape_log(s: &str, max_chars: usize) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(s.len().min(max_chars) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= max_chars {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// [`escape_log`] with the default wire preview length.
pub fn wire(s: &str) -> String {
    escape_log(s, WIRE_PREVIEW_CHARS)
}

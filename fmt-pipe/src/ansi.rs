/// Removes ANSI escape and control sequences, decoding the rest lossily.
pub fn strip_ansi(raw: &[u8]) -> String {
    String::from_utf8_lossy(&strip_ansi_escapes::strip(raw)).into_owned()
}

/// Diagnostic text fit for an error message: no escapes, no surrounding
/// whitespace.
pub fn sanitize_diagnostic(raw: &[u8]) -> String {
    strip_ansi(raw).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_colors() {
        let raw = b"\x1b[0m\x1b[1m\x1b[31merror\x1b[0m: invalid value '\x1b[33munknown\x1b[0m' for '\x1b[1m--ext <ext>\x1b[0m'\n";
        assert_eq!(
            sanitize_diagnostic(raw),
            "error: invalid value 'unknown' for '--ext <ext>'"
        );
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(strip_ansi(b"Check file:///a.ts\n"), "Check file:///a.ts\n");
    }
}

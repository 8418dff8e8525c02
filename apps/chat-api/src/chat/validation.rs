//! Nickname and message shape checks. Pure functions, no state.

use crate::error::ChatError;

/// Validate and normalize a nickname. Returns the trimmed form.
pub fn validate_nickname(raw: &str, max_len: usize) -> Result<String, ChatError> {
    let nickname = raw.trim();
    let len = nickname.chars().count();

    if len == 0 {
        return Err(ChatError::invalid_nickname("Nickname is required"));
    }
    if len > max_len {
        return Err(ChatError::invalid_nickname(format!(
            "Nickname must be {max_len} characters or fewer"
        )));
    }
    if let Some(c) = nickname.chars().find(|c| !is_nickname_char(*c)) {
        return Err(ChatError::invalid_nickname(format!(
            "Nickname contains an unsupported character: {c:?}"
        )));
    }
    if nickname.contains("  ") {
        return Err(ChatError::invalid_nickname(
            "Nickname must not contain consecutive spaces",
        ));
    }

    Ok(nickname.to_string())
}

/// Validate a message body. Returns the trimmed, unescaped form.
pub fn validate_message(raw: &str, max_len: usize) -> Result<String, ChatError> {
    let body = raw.trim();
    let len = body.chars().count();

    if len == 0 {
        return Err(ChatError::invalid_message("Message must not be empty"));
    }
    if len > max_len {
        return Err(ChatError::invalid_message(format!(
            "Message must be {max_len} characters or fewer"
        )));
    }
    if body.chars().any(is_forbidden_control) {
        return Err(ChatError::invalid_message(
            "Message contains control characters",
        ));
    }

    Ok(body.to_string())
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape_html`]. Only the five entities it emits are decoded.
pub fn unescape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        let entity = [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&#39;", '\''),
        ]
        .into_iter()
        .find(|(entity, _)| rest.starts_with(entity));
        match entity {
            Some((entity, c)) => {
                out.push(c);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_nickname_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, ' ' | '-' | '_')
        || matches!(c,
            '\u{3040}'..='\u{309F}'   // Hiragana
            | '\u{30A0}'..='\u{30FF}' // Katakana
            | '\u{3400}'..='\u{4DBF}' // CJK Extension A
            | '\u{4E00}'..='\u{9FFF}' // CJK Unified Ideographs
            | '\u{AC00}'..='\u{D7AF}' // Hangul syllables
        )
}

// Tab, LF and CR are allowed.
fn is_forbidden_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn nickname_is_trimmed() {
        assert_eq!(validate_nickname("  Alice  ", 20).unwrap(), "Alice");
    }

    #[test]
    fn nickname_accepts_allowed_sets() {
        for name in ["bob_42", "la-la", "Jo Ann", "さくら", "カタカナ", "李小龙", "김민수"] {
            assert!(validate_nickname(name, 20).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn nickname_rejects_bad_shapes() {
        for name in ["", "   ", "a  b", "bob!", "<script>", "tab\there", "émile"] {
            let err = validate_nickname(name, 20).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidNickname, "{name:?}");
        }
    }

    #[test]
    fn nickname_length_counts_characters() {
        assert!(validate_nickname(&"a".repeat(20), 20).is_ok());
        assert!(validate_nickname(&"a".repeat(21), 20).is_err());
        // Twenty multibyte characters still fit.
        assert!(validate_nickname(&"字".repeat(20), 20).is_ok());
    }

    #[test]
    fn message_bounds() {
        assert!(validate_message(&"x".repeat(500), 500).is_ok());
        assert_eq!(
            validate_message(&"x".repeat(501), 500).unwrap_err().kind,
            ErrorKind::InvalidMessage
        );
        assert!(validate_message("  \n\t ", 500).is_err());
    }

    #[test]
    fn message_control_characters() {
        assert!(validate_message("line one\nline\ttwo\r\nthree", 500).is_ok());
        for bad in ["bell\u{07}", "vt\u{0B}x", "ff\u{0C}x", "esc\u{1B}[0m", "del\u{7F}"] {
            assert!(validate_message(bad, 500).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn escapes_all_five() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn unescape_reverses_escape() {
        let raw = r#"<b>"Tom" & 'Jerry'</b> &lt; literal"#;
        assert_eq!(unescape_html(&escape_html(raw)), raw);
        assert_eq!(unescape_html("a & b &foo;"), "a & b &foo;");
    }
}

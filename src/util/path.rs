use std::borrow::Cow;

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Whether `c` must be percent-encoded to appear inside a single RFC 3986
/// path segment:
///
/// ```text
/// segment    = *pchar
/// pchar      = unreserved / pct-encoded / sub-delims / ":" / "@"
/// unreserved = ALPHA / DIGIT / "-" / "." / "_" / "~"
/// sub-delims = "!" / "$" / "&" / "'" / "(" / ")" / "*" / "+" / "," / ";" / "="
/// ```
fn should_escape_for_path_segment(c: u8) -> bool {
    !(is_unreserved(c)
        || matches!(
            c,
            b'!'
                | b'$'
                | b'&'
                | b'\''
                | b'('
                | b')'
                | b'*'
                | b'+'
                | b','
                | b';'
                | b'='
                | b':'
                | b'@'
        ))
}

fn is_unreserved(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'-' | b'.' | b'_' | b'~')
}

fn escape(s: &str, should_escape: fn(u8) -> bool) -> Cow<'_, str> {
    let escape_count = s.bytes().filter(|&c| should_escape(c)).count();
    if escape_count == 0 {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 2 * escape_count);
    for c in s.bytes() {
        if should_escape(c) {
            out.push('%');
            out.push(HEX[(c >> 4) as usize] as char);
            out.push(HEX[(c & 15) as usize] as char);
        } else {
            out.push(c as char);
        }
    }

    Cow::Owned(out)
}

/// Percent-encode `s` so it can be embedded as exactly one URL path segment.
///
/// Bucket and object names are each encoded separately and then joined with
/// `/`; encoding a whole path at once would leave embedded slashes alone.
/// Returns the input unchanged (borrowed) when nothing needs escaping.
pub fn encode_segment(s: &str) -> Cow<'_, str> {
    escape(s, should_escape_for_path_segment)
}

/// Expand a variable for a `{var}` slot of a resource URL template.
///
/// Simple string expansion keeps only unreserved characters, so `/`, `:` and
/// `@` are all escaped here, unlike [`encode_segment`].
pub fn expand_template_var(s: &str) -> Cow<'_, str> {
    escape(s, |c| !is_unreserved(c))
}

/// Undo percent-encoding in a single path segment. Returns `None` when an
/// escape is truncated or not hexadecimal.
pub fn decode_segment(s: &str) -> Option<Vec<u8>> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hi = hex_value(*bytes.get(i + 1)?)?;
            let lo = hex_value(*bytes.get(i + 2)?)?;
            out.push(hi << 4 | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    Some(out)
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

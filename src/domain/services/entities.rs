#[cfg(test)]
#[path = "entities_test.rs"]
mod tests;

/// Named and fixed numeric references recognized verbatim. Any other `&#<n>;` or
/// `&#x<hex>;` reference is decoded numerically.
pub const ENTITIES: [(&str, &str); 9] = [
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&#x27;", "'"),
    ("&apos;", "'"),
    ("&nbsp;", " "),
    ("&#x2F;", "/"),
];

// Longest reference is `&#x10FFFF;`.
const MAX_REFERENCE_LEN: usize = 10;

fn decode_numeric(digits: &str) -> Option<char> {
    let code = if let Some(hex) = digits
        .strip_prefix('x')
        .or_else(|| return digits.strip_prefix('X'))
    {
        if hex.is_empty() || !hex.chars().all(|e| return e.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(hex, 16).ok()?
    } else {
        if digits.is_empty() || !digits.chars().all(|e| return e.is_ascii_digit()) {
            return None;
        }
        digits.parse::<u32>().ok()?
    };

    if code == 0 {
        return None;
    }

    return char::from_u32(code);
}

/// Decodes the reference at the start of `text`, returning the literal and how many bytes
/// of `text` it replaces.
fn decode_reference(text: &str) -> Option<(String, usize)> {
    let (end, _) = text
        .char_indices()
        .take(MAX_REFERENCE_LEN)
        .find(|(_, e)| return *e == ';')?;
    let reference = &text[..=end];

    if let Some((_, literal)) = ENTITIES.iter().find(|(name, _)| return *name == reference) {
        return Some((literal.to_string(), end + 1));
    }

    let digits = text[1..end].strip_prefix('#')?;
    let decoded = decode_numeric(digits)?;
    return Some((decoded.to_string(), end + 1));
}

/// Replaces character references with their literal characters in a single left to right
/// pass. Text produced by a reference is never decoded again, and malformed references are
/// kept as they are.
pub fn decode(raw: &str) -> String {
    let mut res = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find('&') {
        res.push_str(&rest[..start]);
        let candidate = &rest[start..];
        if let Some((literal, consumed)) = decode_reference(candidate) {
            res.push_str(&literal);
            rest = &candidate[consumed..];
        } else {
            res.push('&');
            rest = &candidate[1..];
        }
    }

    res.push_str(rest);
    return res;
}

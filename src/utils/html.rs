//! HTML text helpers: escaping, unescaping and heading slugs.

use deunicode::deunicode;

/// Escape HTML special characters.
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// Decode the entities Markdown renderers emit inside code blocks.
///
/// Named entities for `& < > " '` plus decimal and hex numeric references.
/// Anything unrecognized is kept verbatim.
pub fn unescape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));

        match decoded {
            Some((c, end)) => {
                result.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                result.push('&');
                rest = &rest[1..];
            }
        }
    }

    result.push_str(rest);
    result
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let number = entity.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Convert heading text to a fragment id.
///
/// Transliterates to ASCII, lowercases, keeps word characters, collapses
/// whitespace and hyphen runs into a single `-`, and drops all other
/// punctuation.
pub fn slugify(text: &str) -> String {
    let ascii = deunicode(text);
    let mut result = String::with_capacity(ascii.len());
    let mut pending_dash = false;

    for c in ascii.trim().chars() {
        if c.is_alphanumeric() || c == '_' {
            if pending_dash && !result.is_empty() {
                result.push('-');
            }
            pending_dash = false;
            result.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b && c > \"d\""), "a &lt; b &amp;&amp; c &gt; &quot;d&quot;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_unescape_html_named() {
        assert_eq!(unescape_html("if a &lt; b &amp;&amp; c &gt; 0"), "if a < b && c > 0");
        assert_eq!(unescape_html("&quot;x&quot;"), "\"x\"");
    }

    #[test]
    fn test_unescape_html_numeric() {
        assert_eq!(unescape_html("&#39;q&#x27;"), "'q'");
    }

    #[test]
    fn test_unescape_html_keeps_unknown() {
        assert_eq!(unescape_html("a & b"), "a & b");
        assert_eq!(unescape_html("&nbsp;"), "&nbsp;");
        assert_eq!(unescape_html("&"), "&");
    }

    #[test]
    fn test_unescape_reverses_escape() {
        let code = "fn main() { println!(\"<{}>\", 'a' as u8 & 1); }";
        assert_eq!(unescape_html(&escape_html(code)), code);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("What's New?"), "whats-new");
        assert_eq!(slugify("  Spaces  "), "spaces");
        assert_eq!(slugify("a - b"), "a-b");
        assert_eq!(slugify("snake_case"), "snake_case");
        assert_eq!(slugify("?!"), "");
    }

    #[test]
    fn test_slugify_folds_to_ascii() {
        assert_eq!(slugify("Déjà vu"), "deja-vu");
        assert_eq!(slugify("Über Straße"), "uber-strasse");
    }
}

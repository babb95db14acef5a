//! Text helpers shared by the backend clients.

/// Split text into chunks of at most `max_bytes` UTF-8 bytes.
///
/// Sentences are kept together where possible. A sentence that is too long
/// on its own is split between words, and a single oversized word is split
/// on character boundaries.
pub fn split_into_chunks(text: &str, max_bytes: usize) -> Vec<String> {
    split_into_chunks_by(text, max_bytes, str::len)
}

/// Like [`split_into_chunks`], but measures each chunk with `size`.
///
/// `size` must be additive over concatenation and count a space as one.
pub fn split_into_chunks_by(text: &str, max: usize, size: fn(&str) -> usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if size(text) <= max || max == 0 {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in sentences(text) {
        if joined_len(&current, sentence, size) <= max {
            push_joined(&mut current, sentence);
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if size(sentence) <= max {
            current.push_str(sentence);
            continue;
        }

        for word in sentence.split_whitespace() {
            if joined_len(&current, word, size) <= max {
                push_joined(&mut current, word);
                continue;
            }
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            if size(word) <= max {
                current.push_str(word);
            } else {
                let mut pieces = split_word(word, max, size);
                current = pieces.pop().unwrap_or_default();
                chunks.extend(pieces);
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Sentences end at `.`, `!` or `?` followed by whitespace.
fn sentences(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let mut end = rest.len();
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if matches!(c, '.' | '!' | '?')
                && chars.peek().is_some_and(|(_, next)| next.is_whitespace())
            {
                end = i + c.len_utf8();
                break;
            }
        }
        let (sentence, tail) = rest.split_at(end);
        rest = tail.trim_start();
        Some(sentence.trim())
    })
    .filter(|s| !s.is_empty())
}

fn joined_len(current: &str, next: &str, size: fn(&str) -> usize) -> usize {
    if current.is_empty() {
        size(next)
    } else {
        size(current) + 1 + size(next)
    }
}

fn push_joined(current: &mut String, next: &str) {
    if !current.is_empty() {
        current.push(' ');
    }
    current.push_str(next);
}

fn split_word(word: &str, max: usize, size: fn(&str) -> usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut buf = [0u8; 4];
    for c in word.chars() {
        if !piece.is_empty() && size(&piece) + size(c.encode_utf8(&mut buf)) > max {
            pieces.push(std::mem::take(&mut piece));
        }
        piece.push(c);
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Byte length of `text` once passed through [`escape_xml`].
pub fn escaped_len(text: &str) -> usize {
    text.chars()
        .map(|c| match c {
            '&' => 5,
            '<' | '>' => 4,
            '"' | '\'' => 6,
            _ => c.len_utf8(),
        })
        .sum()
}

/// Escape text for inclusion in an XML document.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(split_into_chunks("  Hello world.  ", 100), vec!["Hello world."]);
        assert!(split_into_chunks("   ", 100).is_empty());
    }

    #[test]
    fn test_split_on_sentences() {
        let text = "Hello world. This is a test. Another sentence here.";
        let chunks = split_into_chunks(text, 30);
        assert_eq!(
            chunks,
            vec!["Hello world. This is a test.", "Another sentence here."]
        );
    }

    #[test]
    fn test_long_sentence_split_on_words() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = split_into_chunks(text, 15);
        for chunk in &chunks {
            assert!(chunk.len() <= 15, "{chunk}");
        }
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn test_oversized_word_split_on_char_boundaries() {
        let text = "ééééééééééé short";
        let chunks = split_into_chunks(text, 5);
        for chunk in &chunks {
            assert!(chunk.len() <= 5, "{chunk}");
        }
        assert_eq!(chunks.concat().replace(' ', ""), text.replace(' ', ""));
    }

    #[test]
    fn test_decimal_points_do_not_split() {
        let text = "Growth was 3.5 percent last year! Really? Yes.";
        let chunks = split_into_chunks(text, 36);
        assert_eq!(chunks[0], "Growth was 3.5 percent last year!");
    }

    #[test]
    fn test_split_by_escaped_len() {
        let text = "Q&A ".repeat(200);
        let chunks = split_into_chunks_by(&text, 100, escaped_len);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(escape_xml(chunk).len() <= 100, "{chunk}");
        }
        assert_eq!(chunks.join(" "), text.trim());

        // Raw length fits, escaped length does not.
        let chunks = split_into_chunks_by("<a> <b>", 9, escaped_len);
        assert_eq!(chunks, vec!["<a>", "<b>"]);
    }

    #[test]
    fn test_escaped_len_matches_escape_xml() {
        let text = r#"Tom & Jerry <say> "hi" 'there' é"#;
        assert_eq!(escaped_len(text), escape_xml(text).len());
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(
            escape_xml(r#"Tom & Jerry <say> "hi" 'there'"#),
            "Tom &amp; Jerry &lt;say&gt; &quot;hi&quot; &apos;there&apos;"
        );
    }
}

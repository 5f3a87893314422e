/// Maximum characters per chunk. Chunks break on sentence boundaries, so a
/// single sentence longer than this becomes its own oversized chunk rather
/// than being split mid-sentence.
pub const MAX_CHUNK_CHARS: usize = 500;

/// Split text into chunks of at most `max_chars`, packing whole sentences.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        if !current.is_empty() && current.len() + 1 + sentence.len() > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if current.is_empty() {
            current = sentence;
        } else {
            current.push(' ');
            current.push_str(&sentence);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split on sentence terminators (`.`, `!`, `?`) followed by whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev_was_terminator = false;

    for (i, ch) in text.char_indices() {
        if prev_was_terminator && ch.is_whitespace() {
            let sentence = text[start..i].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = i;
        }
        prev_was_terminator = matches!(ch, '.' | '!' | '?');
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

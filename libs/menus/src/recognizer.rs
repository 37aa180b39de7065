use unicode_segmentation::UnicodeSegmentation;

/// Lowercased words of `text`; punctuation and whitespace are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(str::to_lowercase).collect()
}

/// Token overlap between a choice phrase and an utterance, in `0.0..=1.0`.
///
/// Each utterance token can match one choice token. The count of matches is
/// divided by the longer of the two token lists, so extra words on either
/// side lower the score.
pub fn score(choice: &[String], utterance: &[String]) -> f64 {
    let longest = choice.len().max(utterance.len());
    if choice.is_empty() || utterance.is_empty() {
        return 0.0;
    }
    let mut unused: Vec<&String> = utterance.iter().collect();
    let mut matched = 0usize;
    for token in choice {
        if let Some(pos) = unused.iter().position(|candidate| *candidate == token) {
            unused.swap_remove(pos);
            matched += 1;
        }
    }
    matched as f64 / longest as f64
}

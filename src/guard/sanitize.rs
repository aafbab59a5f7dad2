//! Text normalization and the character-level heuristics of the validator.

use unicode_normalization::UnicodeNormalization;

/// Normalize raw chat input before it reaches any heuristic or the model.
///
/// Steps, in order: drop control characters except `\n` and `\t`, NFC-normalize, collapse runs
/// of non-newline whitespace to one space, drop spaces around line breaks, collapse three or more
/// consecutive newlines to two, then trim. Applying it twice yields the same string.
pub fn sanitize(input: &str) -> String {
    let stripped: String = input.chars().filter(|c| !is_stripped_control(*c)).collect();
    let normalized: String = stripped.nfc().collect();
    let collapsed = collapse_blank_lines(&collapse_inline_whitespace(&normalized));
    collapsed.trim().to_string()
}

fn is_stripped_control(c: char) -> bool {
    c.is_control() && c != '\n' && c != '\t'
}

fn collapse_inline_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for c in text.chars() {
        if c != '\n' && c.is_whitespace() {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

/// Whitespace-only lines count as blank, so `"a\n \n \nb"` collapses like `"a\n\n\nb"`.
fn collapse_blank_lines(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').map(|line| line.trim_matches(' ')).collect();
    let joined = lines.join("\n");

    let mut out = String::with_capacity(joined.len());
    let mut newlines = 0usize;
    for c in joined.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out
}

/// Length of the longest run of one repeated character.
pub fn longest_repeat_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<char> = None;
    for c in text.chars() {
        if previous == Some(c) {
            current += 1;
        } else {
            current = 1;
            previous = Some(c);
        }
        longest = longest.max(current);
    }
    longest
}

/// Share of symbol characters among letters, digits and symbols.
///
/// Latin and Cyrillic letters plus ASCII digits count as alphanumeric; whitespace is ignored;
/// everything else is a symbol. Returns `0.0` for text with neither.
pub fn special_char_ratio(text: &str) -> f64 {
    let mut alphanumeric = 0usize;
    let mut special = 0usize;
    for c in text.chars() {
        if c.is_whitespace() {
            continue;
        }
        if is_alphanumeric(c) {
            alphanumeric += 1;
        } else {
            special += 1;
        }
    }
    let total = alphanumeric + special;
    if total == 0 {
        0.0
    } else {
        special as f64 / total as f64
    }
}

fn is_alphanumeric(c: char) -> bool {
    c.is_ascii_alphanumeric() || is_latin_letter(c) || is_cyrillic_letter(c)
}

fn is_latin_letter(c: char) -> bool {
    matches!(c, '\u{00C0}'..='\u{024F}') && c != '\u{00D7}' && c != '\u{00F7}'
}

fn is_cyrillic_letter(c: char) -> bool {
    matches!(c, '\u{0400}'..='\u{04FF}') && c.is_alphabetic()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_control_characters_but_keeps_newlines() {
        assert_eq!(sanitize("a\u{0000}b\u{0007}c\nd"), "abc\nd");
        assert_eq!(sanitize("line\r\nnext"), "line\nnext");
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(sanitize("  hello \t\t  world  "), "hello world");
        assert_eq!(sanitize("a\u{00A0}\u{00A0}b"), "a b");
    }

    #[test]
    fn collapses_blank_line_runs_to_two() {
        assert_eq!(sanitize("first\n\n\n\n\nsecond"), "first\n\nsecond");
        assert_eq!(sanitize("first\n\nsecond"), "first\n\nsecond");
        assert_eq!(sanitize("a\n \n \n \n \nb"), "a\n\nb");
        assert_eq!(sanitize("a\n\t\n  \n\nb"), "a\n\nb");
        assert_eq!(sanitize("one  \n  two"), "one\ntwo");
    }

    #[test]
    fn applies_canonical_composition() {
        let decomposed = "Cafe\u{0301}";
        assert_eq!(sanitize(decomposed), "Caf\u{00E9}");
        let cyrillic = "\u{0418}\u{0306}";
        assert_eq!(sanitize(cyrillic), "\u{0419}");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let samples = [
            "  Здравейте,\t\tискам\n\n\n\nоферта  ",
            "mixed \u{0007} control\r\n\r\n\r\nand e\u{0301}",
            "a \n \n \n b",
            "a\n \n \n \n \nb",
        ];
        for sample in samples {
            let once = sanitize(sample);
            assert_eq!(sanitize(&once), once, "sample {sample:?}");
        }
    }

    #[test]
    fn measures_repeat_runs() {
        assert_eq!(longest_repeat_run(""), 0);
        assert_eq!(longest_repeat_run("abc"), 1);
        assert_eq!(longest_repeat_run("heyyyyyy"), 6);
        assert_eq!(longest_repeat_run("ааааа"), 5);
    }

    #[test]
    fn counts_cyrillic_as_alphanumeric() {
        assert_eq!(special_char_ratio("Каква е цената"), 0.0);
        let ratio = special_char_ratio("цена?!");
        assert!((ratio - 2.0 / 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ratio_of_symbol_only_text_is_one() {
        assert_eq!(special_char_ratio("@@ ##"), 1.0);
        assert_eq!(special_char_ratio("   "), 0.0);
    }
}

//! Arabic vocalization (tashkeel) handling.
//!
//! The central operation is [`is_vocalized_like`], which decides whether two
//! spellings of a word can denote the same vocalized form when either side
//! may omit short-vowel marks. The remaining helpers normalize labels before
//! they are stored or looked up.

/// Fathatan, dammatan, kasratan, fatha, damma, kasra, sukun.
pub const HARAKAT: [char; 7] = [
    '\u{064B}', '\u{064C}', '\u{064D}', '\u{064E}', '\u{064F}', '\u{0650}', '\u{0652}',
];

/// Gemination mark.
pub const SHADDA: char = '\u{0651}';

/// Elongation filler, purely typographic.
pub const TATWEEL: char = '\u{0640}';

/// Lam-alef presentation ligatures and their decomposed spellings.
const LIGATURES: [(char, &str); 8] = [
    ('\u{FEF5}', "\u{0644}\u{0622}"),
    ('\u{FEF6}', "\u{0644}\u{0622}"),
    ('\u{FEF7}', "\u{0644}\u{0623}"),
    ('\u{FEF8}', "\u{0644}\u{0623}"),
    ('\u{FEF9}', "\u{0644}\u{0625}"),
    ('\u{FEFA}', "\u{0644}\u{0625}"),
    ('\u{FEFB}', "\u{0644}\u{0627}"),
    ('\u{FEFC}', "\u{0644}\u{0627}"),
];

pub fn is_haraka(c: char) -> bool {
    HARAKAT.contains(&c)
}

pub fn is_shadda(c: char) -> bool {
    c == SHADDA
}

/// Harakat and shadda together.
pub fn is_tashkeel(c: char) -> bool {
    is_haraka(c) || is_shadda(c)
}

/// Returns `true` if the text carries any vocalization mark.
pub fn is_vocalized(text: &str) -> bool {
    text.chars().any(is_tashkeel)
}

/// Removes all harakat and shaddas.
pub fn strip_tashkeel(text: &str) -> String {
    text.chars().filter(|c| !is_tashkeel(*c)).collect()
}

pub fn strip_tatweel(text: &str) -> String {
    text.chars().filter(|c| *c != TATWEEL).collect()
}

/// Replaces lam-alef presentation ligatures by their two-letter spelling.
pub fn normalize_ligature(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match LIGATURES.iter().find(|(lig, _)| *lig == c) {
            Some((_, spelled)) => out.push_str(spelled),
            None => out.push(c),
        }
    }
    out
}

/// Returns `true` for non-empty text made only of Arabic letters, marks and
/// whitespace.
pub fn is_arabic_string(text: &str) -> bool {
    let mut letters = 0;
    for c in text.chars() {
        if c.is_whitespace() {
            continue;
        }
        if !is_arabic_char(c) {
            return false;
        }
        letters += 1;
    }
    letters > 0
}

fn is_arabic_char(c: char) -> bool {
    matches!(c,
        '\u{0600}'..='\u{06FF}'
        | '\u{0750}'..='\u{077F}'
        | '\u{08A0}'..='\u{08FF}'
        | '\u{FB50}'..='\u{FDFF}'
        | '\u{FE70}'..='\u{FEFF}')
}

/// Determines whether two strings are compatible when vowel marks are treated
/// as optional.
///
/// Both strings are walked backwards in lockstep. Equal characters advance
/// both sides; a vowel mark facing a different character is skipped on its
/// own side; two different non-marks (or two different marks) make the
/// strings incompatible. With `ignore_shaddas` the shadda counts as a vowel
/// mark and may therefore be missing on either side.
///
/// This assumes base letters are never omitted, only marks.
pub fn is_vocalized_like(a: &str, b: &str, ignore_shaddas: bool) -> bool {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let is_mark = |c: char| is_haraka(c) || (ignore_shaddas && is_shadda(c));

    let (mut i, mut j) = (a.len(), b.len());
    loop {
        match (i.checked_sub(1), j.checked_sub(1)) {
            (None, None) => return true,
            (Some(ai), None) => {
                if !is_mark(a[ai]) {
                    return false;
                }
                i = ai;
            }
            (None, Some(bj)) => {
                if !is_mark(b[bj]) {
                    return false;
                }
                j = bj;
            }
            (Some(ai), Some(bj)) => {
                let (ca, cb) = (a[ai], b[bj]);
                if ca == cb {
                    i = ai;
                    j = bj;
                    continue;
                }
                match (is_mark(ca), is_mark(cb)) {
                    (true, false) => i = ai,
                    (false, true) => j = bj,
                    _ => return false,
                }
            }
        }
    }
}

#![deny(missing_docs)]

//! # Identifier Canonicalization
//!
//! Turns raw names (column names, annotation arguments, schema keys) into
//! conventional exported Go identifiers. Words are re-cased one at a time
//! against a fixed initialism table, so `user_id` becomes `UserID` rather
//! than `UserId`.

/// Initialisms kept fully upper-case in canonical identifiers. Sorted for
/// binary search.
const COMMON_INITIALISMS: &[&str] = &[
    "API", "ASCII", "CPU", "CSS", "DNS", "EOF", "GUID", "HTML", "HTTP", "HTTPS", "ID", "IP",
    "JSON", "LHS", "QPS", "RAM", "RHS", "RPC", "SLA", "SMTP", "SSH", "TLS", "TTL", "UI", "UID",
    "URI", "URL", "UTF8", "UUID", "VM", "XML",
];

const DIGIT_WORDS: &[&str] = &[
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
];

/// Full canonicalization pipeline: digit-prefix substitution followed by
/// identifier formatting. `"2fa_code"` becomes `TwoFaCode`, `"user_id"`
/// becomes `UserID`.
pub fn canonical_field_name(raw: &str) -> String {
    fmt_field_name(&stringify_leading_digit(raw))
}

/// Replaces a leading decimal digit with its English word plus a
/// separator, leaving everything else untouched. `"2fa_code"` becomes
/// `"two_fa_code"`.
pub fn stringify_leading_digit(raw: &str) -> String {
    match raw.chars().next().and_then(|c| c.to_digit(10)) {
        Some(d) => format!("{}_{}", DIGIT_WORDS[d as usize], &raw[1..]),
        None => raw.to_string(),
    }
}

/// Formats a raw name as an exported identifier. All-upper input is
/// lower-cased first so `USER_ID` and `user_id` canonicalize alike; any
/// character that is neither letter nor digit ends up as `_`, and a
/// leading non-letter becomes `_`.
pub fn fmt_field_name(raw: &str) -> String {
    let lowered;
    let s = if raw.to_uppercase() == raw {
        lowered = raw.to_lowercase();
        lowered.as_str()
    } else {
        raw
    };

    lint_field_name(s)
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let ok = if i == 0 {
                c.is_alphabetic()
            } else {
                c.is_alphanumeric()
            };
            if ok {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn lint_field_name(name: &str) -> String {
    if name == "_" {
        return name.to_string();
    }
    let name = name.trim_start_matches('_');
    if name.chars().all(|c| c.is_lowercase()) {
        return canonical_word(name);
    }

    let runes: Vec<char> = name.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    // When a separator run sits between two digits, one underscore is
    // kept and the next word is carried verbatim.
    let mut verbatim = false;

    while i < runes.len() {
        let start = i;
        while i < runes.len() {
            let cur = runes[i];
            i += 1;
            match runes.get(i) {
                None | Some('_') => break,
                Some(next) if cur.is_lowercase() && !next.is_lowercase() => break,
                _ => {}
            }
        }
        let word: String = runes[start..i].iter().collect();
        if verbatim {
            out.push_str(&word);
        } else {
            out.push_str(&canonical_word(&word));
        }

        verbatim = false;
        if runes.get(i) == Some(&'_') {
            let last = runes[i - 1];
            while runes.get(i) == Some(&'_') {
                i += 1;
            }
            if last.is_ascii_digit() && runes.get(i).is_some_and(|c| c.is_ascii_digit()) {
                out.push('_');
                verbatim = true;
            }
        }
    }
    out
}

/// Applies the per-word rule: a known initialism is upper-cased whole, an
/// all-lowercase word gets its first character capitalized, anything
/// already mixed-case passes through.
fn canonical_word(word: &str) -> String {
    let upper = word.to_uppercase();
    if COMMON_INITIALISMS.binary_search(&upper.as_str()).is_ok() {
        return upper;
    }
    if word.to_lowercase() != word {
        return word.to_string();
    }
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

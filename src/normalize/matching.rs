use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use strsim::normalized_levenshtein;

static RE_PARENTHESIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").expect("invalid regex: parenthesized"));

/// Academic and honorific prefixes that never distinguish two people.
const TITLE_TOKENS: &[&str] = &["dr", "prof", "med", "phil", "rer", "nat", "h.c", "hc", "dipl"];

/// Lowercase ASCII-ish form of a guest name used for all comparisons.
///
/// "Söder, Markus" and " Markus  Söder " both become "markus soder".
pub fn canonical_name(raw: &str) -> String {
    let without_notes = RE_PARENTHESIZED.replace_all(raw, " ");
    let reordered = reorder_last_first(without_notes.trim());

    let folded = fold_diacritics(&reordered.to_lowercase());
    let cleaned: String = folded
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .map(|token| token.trim_matches('.'))
        .filter(|token| !token.is_empty() && !TITLE_TOKENS.contains(token))
        .map(|token| token.replace('.', ""))
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .collect::<Vec<_>>()
        .join(" ")
}

/// "Last, First" becomes "First Last". Anything with more than one comma is left alone.
fn reorder_last_first(name: &str) -> String {
    let mut parts = name.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(last), Some(first), None) if !first.trim().is_empty() => {
            format!("{} {}", first.trim(), last.trim())
        }
        _ => name.to_string(),
    }
}

pub fn fold_diacritics(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            'ä' | 'á' | 'à' | 'â' | 'ã' | 'å' | 'ą' => out.push('a'),
            'Ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Å' | 'Ą' => out.push('A'),
            'ö' | 'ó' | 'ò' | 'ô' | 'õ' | 'ø' | 'ő' => out.push('o'),
            'Ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ø' | 'Ő' => out.push('O'),
            'ü' | 'ú' | 'ù' | 'û' | 'ű' => out.push('u'),
            'Ü' | 'Ú' | 'Ù' | 'Û' | 'Ű' => out.push('U'),
            'é' | 'è' | 'ê' | 'ë' | 'ę' | 'ě' => out.push('e'),
            'É' | 'È' | 'Ê' | 'Ë' | 'Ę' | 'Ě' => out.push('E'),
            'í' | 'ì' | 'î' | 'ï' => out.push('i'),
            'Í' | 'Ì' | 'Î' | 'Ï' => out.push('I'),
            'ç' | 'č' | 'ć' => out.push('c'),
            'Ç' | 'Č' | 'Ć' => out.push('C'),
            'š' | 'ś' | 'ş' => out.push('s'),
            'Š' | 'Ś' | 'Ş' => out.push('S'),
            'ž' | 'ź' | 'ż' => out.push('z'),
            'Ž' | 'Ź' | 'Ż' => out.push('Z'),
            'ñ' | 'ń' => out.push('n'),
            'Ñ' | 'Ń' => out.push('N'),
            'ł' => out.push('l'),
            'Ł' => out.push('L'),
            'ř' => out.push('r'),
            'Ř' => out.push('R'),
            'ß' => out.push_str("ss"),
            // typographic dashes and apostrophes
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2019}' | '\u{02bc}' => out.push('\''),
            '\u{00a0}' | '\u{202f}' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

/// URL-safe slug of a title, used to disambiguate episodes sharing an air date.
pub fn slugify(title: &str) -> String {
    let folded = fold_diacritics(&title.to_lowercase());
    let mut slug = String::with_capacity(folded.len());
    let mut pending_dash = false;
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn token_overlap(a: &str, b: &str) -> f64 {
    let a: BTreeSet<&str> = a.split_whitespace().collect();
    let b: BTreeSet<&str> = b.split_whitespace().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Similarity in [0, 1] between two canonical names.
///
/// Best of normalized Levenshtein similarity, the same over sorted tokens,
/// and token-set overlap.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    normalized_levenshtein(a, b)
        .max(normalized_levenshtein(&sorted_tokens(a), &sorted_tokens(b)))
        .max(token_overlap(a, b))
}

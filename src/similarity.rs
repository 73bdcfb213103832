//! Title similarity scoring and canonicalization.
//!
//! Everything here is pure: no I/O and no shared mutable state, so the
//! functions are safe to call from rayon workers.
//!
//! - [`compare_two_strings`] - Dice coefficient over character bigrams
//! - [`similarity`] - Accept/reject score for a matched provider record
//! - [`find_best_match`], [`find_best_match_array`], [`find_best_match_2d`] - Best-match search
//! - [`clean`] and [`slugify`] - Comparison and URL-safe canonical forms
//!
//! # Examples
//!
//! ```rust
//! use tsunagi::similarity::{compare_two_strings, find_best_match_2d, slugify};
//!
//! assert_eq!(compare_two_strings("night", "nacht"), 0.25);
//! assert_eq!(slugify(["Attack on Titan!"]), "attack-on-titan");
//!
//! let groups = vec![
//!     vec!["Naruto Shippuden".to_string()],
//!     vec!["One Piece".to_string()],
//! ];
//! let result = find_best_match_2d(&["Naruto".to_string()], &groups);
//! assert_eq!(result.best_match_index, 0);
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default score above which two titles are considered the same work.
pub const SAME_THRESHOLD: f64 = 0.6;

static WIDE_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9!@#$%^&*()\-= ]").expect("valid regex"));
static NARROW_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9\- ]").expect("valid regex"));
static REPEATED_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("valid regex"));
static NON_SLUG_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9 ]+").expect("valid regex"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// One scored target string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub target: String,
    pub rating: f64,
}

/// Outcome of a best-match search.
///
/// For [`find_best_match_2d`], `best_match_index` is the index of the
/// winning *group* and `ratings` holds that group's per-member scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub ratings: Vec<Rating>,
    pub best_match: Rating,
    pub best_match_index: usize,
}

/// Outcome of [`similarity`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub same: bool,
    pub value: f64,
}

/// Scores two strings in `[0, 1]` using the Dice coefficient over
/// consecutive character bigrams, ignoring spaces.
///
/// Identical inputs score `1.0`, even when both are empty. Otherwise an
/// input shorter than two characters scores `0.0`.
///
/// ```rust
/// use tsunagi::similarity::compare_two_strings;
///
/// assert_eq!(compare_two_strings("context", "contact"), 0.5);
/// assert_eq!(compare_two_strings("a", "abc"), 0.0);
/// assert_eq!(compare_two_strings("", ""), 1.0);
/// ```
pub fn compare_two_strings(first: &str, second: &str) -> f64 {
    let first: Vec<char> = first.chars().filter(|c| *c != ' ').collect();
    let second: Vec<char> = second.chars().filter(|c| *c != ' ').collect();

    if first == second {
        return 1.0;
    }
    if first.len() < 2 || second.len() < 2 {
        return 0.0;
    }

    let mut bigrams: HashMap<(char, char), usize> = HashMap::with_capacity(first.len());
    for pair in first.windows(2) {
        *bigrams.entry((pair[0], pair[1])).or_default() += 1;
    }

    let mut intersection = 0usize;
    for pair in second.windows(2) {
        if let Some(count) = bigrams.get_mut(&(pair[0], pair[1])) {
            if *count > 0 {
                *count -= 1;
                intersection += 1;
            }
        }
    }

    (2 * intersection) as f64 / (first.len() + second.len() - 2) as f64
}

/// Normalizes a title for comparison. Never used for display.
///
/// Lowercases, turns punctuation into spaces, drops anything outside
/// `[a-z0-9 -]`, collapses repeated spaces and applies a couple of
/// romanization normalizations.
///
/// ```rust
/// use tsunagi::similarity::clean;
///
/// assert_eq!(clean("Yuusha no Kuse ni"), "yusha no kuse ni");
/// assert_eq!(clean("Re:Zero"), "re zero");
/// ```
pub fn clean(title: &str) -> String {
    let lowered = title.to_lowercase();
    let spaced = WIDE_PUNCTUATION.replace_all(&lowered, " ");
    let pruned = NARROW_PUNCTUATION.replace_all(&spaced, "");
    let collapsed = REPEATED_SPACES.replace_all(&pruned, " ");

    collapsed.replace("yuu", "yu").replace(" ou", " oh")
}

/// Scores a matched provider record against the authoritative titles.
///
/// The value is the maximum of the cleaned `reference` against `candidate`,
/// and the raw `reference` against every non-empty entry of `alt_titles`,
/// all compared lowercase. `same` is set when the value exceeds
/// [`SAME_THRESHOLD`].
pub fn similarity(candidate: &str, reference: &str, alt_titles: &[String]) -> SimilarityResult {
    similarity_with_threshold(candidate, reference, alt_titles, SAME_THRESHOLD)
}

/// [`similarity`] with a caller-supplied "same" threshold.
pub fn similarity_with_threshold(
    candidate: &str,
    reference: &str,
    alt_titles: &[String],
    same_threshold: f64,
) -> SimilarityResult {
    let reference = reference.to_lowercase();
    let mut value = compare_two_strings(&clean(&reference), &candidate.to_lowercase());

    for alt in alt_titles.iter().filter(|alt| !alt.is_empty()) {
        let score = compare_two_strings(&reference, &alt.to_lowercase());
        if score > value {
            value = score;
        }
    }

    SimilarityResult {
        same: value > same_threshold,
        value,
    }
}

/// Scores `main` against every target and keeps the earliest maximum.
///
/// An empty target list yields a zero rating at index 0.
pub fn find_best_match(main: &str, targets: &[String]) -> MatchResult {
    let ratings: Vec<Rating> = targets
        .iter()
        .map(|target| Rating {
            target: target.clone(),
            rating: compare_two_strings(main, target),
        })
        .collect();

    let best_match_index = earliest_max(&ratings);
    let best_match = ratings.get(best_match_index).cloned().unwrap_or_default();

    MatchResult {
        ratings,
        best_match,
        best_match_index,
    }
}

/// Runs [`find_best_match`] for every main string and returns the result of
/// the main string with the highest best rating.
pub fn find_best_match_array(mains: &[String], targets: &[String]) -> MatchResult {
    let mut overall: Option<MatchResult> = None;

    for main in mains {
        let result = find_best_match(main, targets);
        let better = match &overall {
            Some(current) => result.best_match.rating > current.best_match.rating,
            None => true,
        };
        if better {
            overall = Some(result);
        }
    }

    overall.unwrap_or_default()
}

/// Finds the target group that best matches any of the main strings.
///
/// Both sides are trimmed, lowercased and [`clean`]ed before scoring. Each
/// group scores as its best member; the earliest strictly-better
/// (main, group) pair wins. Empty groups are skipped.
pub fn find_best_match_2d(mains: &[String], groups: &[Vec<String>]) -> MatchResult {
    let mut overall = MatchResult::default();

    let mains: Vec<String> = mains.iter().map(|m| normalize(m)).collect();
    let groups: Vec<Vec<String>> = groups
        .iter()
        .map(|group| group.iter().map(|t| normalize(t)).collect())
        .collect();

    for main in &mains {
        for (group_index, group) in groups.iter().enumerate() {
            if group.is_empty() {
                continue;
            }

            let ratings: Vec<Rating> = group
                .iter()
                .map(|target| Rating {
                    target: target.clone(),
                    rating: compare_two_strings(main, target),
                })
                .collect();

            let best = &ratings[earliest_max(&ratings)];
            if best.rating > overall.best_match.rating {
                overall = MatchResult {
                    best_match: best.clone(),
                    ratings,
                    best_match_index: group_index,
                };
            }
        }
    }

    overall
}

fn normalize(title: &str) -> String {
    clean(&title.trim().to_lowercase())
}

fn earliest_max(ratings: &[Rating]) -> usize {
    let mut best = 0;
    for (i, rating) in ratings.iter().enumerate() {
        if rating.rating > ratings[best].rating {
            best = i;
        }
    }
    best
}

/// Builds a URL-safe slug from one or more parts.
///
/// Parts are joined with spaces and lowercased, then letters are folded to
/// ASCII through a transliteration table, combining marks are dropped and
/// every remaining run outside `[a-z0-9]` becomes a single dash.
///
/// ```rust
/// use tsunagi::slugify;
///
/// assert_eq!(slugify(["Shingeki no Kyojin", "2013"]), "shingeki-no-kyojin-2013");
/// assert_eq!(slugify(["Ærøskøbing — Straße"]), "aeroeskoebing-strasse");
/// ```
pub fn slugify<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = parts
        .into_iter()
        .map(|part| part.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_lowercase();

    let mut folded = String::with_capacity(joined.len());
    for c in joined.chars() {
        if is_combining_mark(c) {
            continue;
        }
        match transliterate(c) {
            Some(replacement) => folded.push_str(replacement),
            None => folded.push(c),
        }
    }

    let dashed = NON_SLUG_RUN.replace_all(&folded, "-");
    let dashed = WHITESPACE_RUN.replace_all(&dashed, "-");
    dashed.trim_matches('-').to_string()
}

fn is_combining_mark(c: char) -> bool {
    matches!(
        c,
        '\u{0300}'..='\u{036F}'
            | '\u{1AB0}'..='\u{1AFF}'
            | '\u{1DC0}'..='\u{1DFF}'
            | '\u{20D0}'..='\u{20FF}'
            | '\u{FE20}'..='\u{FE2F}'
    )
}

fn transliterate(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' | 'ǻ' | 'ά' | 'α' | 'а' => "a",
        'б' | 'ḃ' => "b",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'ð' | 'ď' | 'đ' | 'δ' | 'д' | 'ђ' | 'ḋ' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' | 'έ' | 'ε' | 'е' | 'ё' | 'э' => "e",
        'ƒ' | 'φ' | 'ф' | 'ḟ' => "f",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' | 'γ' | 'г' | 'ѓ' | 'ґ' => "g",
        'ĥ' | 'ħ' => "h",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' | 'ΐ' | 'ή' | 'ί' | 'η' | 'ι'
        | 'ϊ' | 'и' | 'й' | 'ы' | 'і' | 'ї' => "i",
        'ĵ' | 'ј' => "j",
        'ķ' | 'ĸ' | 'κ' | 'к' | 'ќ' => "k",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' | 'λ' | 'л' => "l",
        'μ' | 'м' | 'ṁ' => "m",
        'ñ' | 'ń' | 'ņ' | 'ň' | 'ŉ' | 'ŋ' | 'ν' | 'н' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ō' | 'ŏ' | 'ő' | 'ο' | 'ό' | 'ω' | 'ώ' | 'о' => "o",
        'π' | 'п' | 'ṗ' => "p",
        'ŕ' | 'ŗ' | 'ř' | 'ρ' | 'р' => "r",
        'ś' | 'ŝ' | 'ş' | 'š' | 'ſ' | 'ș' | 'σ' | 'ς' | 'с' | 'ṡ' => "s",
        'ţ' | 'ť' | 'ŧ' | 'ț' | 'τ' | 'т' | 'ṫ' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' | 'у' | 'ў' => "u",
        'β' | 'в' => "v",
        'ŵ' | 'ẁ' | 'ẃ' | 'ẅ' => "w",
        'ξ' => "x",
        'ý' | 'ÿ' | 'ŷ' | 'ΰ' | 'υ' | 'ϋ' | 'ύ' | 'ỳ' => "y",
        'ź' | 'ż' | 'ž' | 'ζ' | 'з' => "z",
        'æ' | 'ǽ' => "ae",
        'χ' | 'ч' => "ch",
        'џ' | 'ѕ' => "dz",
        'ﬁ' => "fi",
        'ﬂ' => "fl",
        'я' => "ia",
        'ъ' | 'є' => "ie",
        'ĳ' => "ij",
        'ю' => "iu",
        'х' => "kh",
        'љ' => "lj",
        'њ' => "nj",
        'ø' | 'œ' | 'ǿ' => "oe",
        'ψ' => "ps",
        'ш' => "sh",
        'щ' => "shch",
        'ß' => "ss",
        'þ' | 'θ' => "th",
        'ц' => "ts",
        'ж' => "zh",
        '\u{0009}'..='\u{000D}'
        | '\u{001C}'..='\u{001F}'
        | ' '
        | '\u{0085}'
        | '\u{00A0}'
        | '\u{1680}'
        | '\u{2000}'..='\u{200A}'
        | '\u{2028}'
        | '\u{2029}'
        | '\u{202F}'
        | '\u{205F}'
        | '\u{3000}'
        | '\u{058A}'
        | '\u{05BE}'
        | '\u{1400}'
        | '\u{1806}'
        | '\u{2010}'..='\u{2015}'
        | '\u{2E17}'
        | '\u{2E1A}'
        | '\u{2E3A}'
        | '\u{2E3B}'
        | '\u{2E40}'
        | '\u{301C}'
        | '\u{3030}'
        | '\u{30A0}'
        | '\u{FE31}'
        | '\u{FE32}'
        | '\u{FE58}'
        | '\u{FE63}'
        | '\u{FF0D}' => "-",
        _ => return None,
    };
    Some(folded)
}

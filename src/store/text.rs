//! Text normalization applied at save time and the filesystem-safe slugs records are
//! stored under.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::Publication;

/// Longest title part of a slug, in characters
pub const MAX_TITLE_CHARS: usize = 60;

/// Longest first-author part of a slug, in characters
pub const MAX_AUTHOR_CHARS: usize = 40;

static WHITESPACE: OnceLock<Regex> = OnceLock::new();
static MARKUP: OnceLock<Regex> = OnceLock::new();
static LEADING_ABSTRACT: OnceLock<Regex> = OnceLock::new();
static UNDERSCORES: OnceLock<Regex> = OnceLock::new();
static DASHES: OnceLock<Regex> = OnceLock::new();

fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("built-in pattern is valid"))
}

/// Replacements applied in order when turning text into a slug part
const SLUG_REPLACEMENTS: &[(&str, &str)] = &[
    ("-", ""),
    (": ", "-"),
    (".", "_"),
    (" ", "_"),
    ("_-", "_"),
    ("-_", "_"),
    (",", "_"),
    ("?", ""),
    ("!", ""),
    ("$", ""),
    ("\\", ""),
    ("/", ""),
    ("'", ""),
    ("\"", ""),
];

/// Collapse whitespace, strip markup tags and a leading "Abstract" label
pub fn clean_text(text: &str) -> String {
    let collapsed = pattern(&WHITESPACE, r"\s+").replace_all(text, " ");
    let stripped = pattern(&MARKUP, r"<.*?>").replace_all(&collapsed, "");
    let unlabeled =
        pattern(&LEADING_ABSTRACT, r"(?i)^\s*abstract\b\s*[:.]?\s*").replace(&stripped, "");
    unlabeled.trim().to_string()
}

/// Filesystem-safe form of `text`
pub fn slug_part(text: &str) -> String {
    let mut part = clean_text(text);
    for (from, to) in SLUG_REPLACEMENTS {
        part = part.replace(from, to);
    }
    let part = pattern(&UNDERSCORES, "_+").replace_all(&part, "_");
    let part = pattern(&DASHES, "-+").replace_all(&part, "-");
    part.trim_matches('_').to_string()
}

/// Cut `part` to at most `max` characters, preferring an `_` boundary
pub fn shorten(part: &str, max: usize) -> String {
    if part.chars().count() <= max {
        return part.to_string();
    }

    let head: String = part.chars().take(max).collect();
    let next_is_boundary = part.chars().nth(max) == Some('_');
    let cut = if next_is_boundary {
        head.as_str()
    } else {
        match head.rfind('_') {
            Some(i) if i > 0 => &head[..i],
            _ => head.as_str(),
        }
    };
    cut.trim_end_matches(['_', '-']).to_string()
}

/// `{year}-{title}-{first author}` slug a record is stored under
pub fn slug(publication: &Publication) -> String {
    let title = shorten(&slug_part(&publication.title), MAX_TITLE_CHARS);
    let author = shorten(
        &slug_part(publication.first_author().unwrap_or_default()),
        MAX_AUTHOR_CHARS,
    );
    format!("{}-{}-{}", publication.year, title, author)
}

/// Record file stem, optionally prefixed with the zero-padded internal index
pub fn file_stem(publication: &Publication, include_index: bool) -> String {
    if include_index {
        format!("{:03}__{}", publication.internal_index, slug(publication))
    } else {
        slug(publication)
    }
}

//! Cleaning of loaded collections: duplicate removal and language filtering.

use crate::models::Publication;

/// Text -> English / not-English verdict
pub trait LanguageDetector: Send + Sync {
    fn is_english(&self, text: &str) -> bool;
}

impl<F> LanguageDetector for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_english(&self, text: &str) -> bool {
        self(text)
    }
}

/// Stop-word lists the heuristic detector votes with; English comes first
const STOPWORDS: &[(&str, &[&str])] = &[
    (
        "en",
        &[
            "the", "of", "and", "to", "in", "is", "for", "with", "on", "that", "this", "we",
            "are", "by", "an", "as", "from", "be", "which", "our", "these", "it", "at", "or",
            "can", "has", "have", "was", "were", "not", "their", "its",
        ],
    ),
    (
        "fr",
        &[
            "le", "la", "les", "des", "et", "est", "une", "du", "dans", "pour", "qui", "sur",
            "nous", "sont", "avec", "ce", "cette", "aux", "mais", "ou",
        ],
    ),
    (
        "es",
        &[
            "el", "los", "las", "del", "y", "es", "una", "para", "con", "su", "al", "como",
            "este", "esta", "pero", "sobre",
        ],
    ),
    (
        "de",
        &[
            "der", "die", "das", "und", "ist", "ein", "eine", "mit", "von", "zu", "den", "dem",
            "für", "auf", "sich", "nicht", "wir", "werden", "wird",
        ],
    ),
    (
        "pt",
        &[
            "os", "da", "do", "em", "um", "uma", "não", "são", "com", "pelo", "pela", "foi",
        ],
    ),
];

/// Stop-word voting heuristic.
///
/// Counts stop-word hits per language and calls the text English unless another
/// language scores strictly higher. Text without any stop-words is kept as English.
#[derive(Debug, Default, Clone, Copy)]
pub struct StopwordDetector;

impl StopwordDetector {
    /// Language code with the most stop-word hits, `None` when nothing matched
    pub fn dominant_language(&self, text: &str) -> Option<&'static str> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphabetic())
            .filter(|w| !w.is_empty())
            .collect();

        STOPWORDS
            .iter()
            .map(|(lang, list)| {
                let hits = words.iter().filter(|w| list.contains(*w)).count();
                (*lang, hits)
            })
            .filter(|(_, hits)| *hits > 0)
            // max_by_key keeps the last maximum; reverse so ties favor the earlier entry
            .rev()
            .max_by_key(|(_, hits)| *hits)
            .map(|(lang, _)| lang)
    }
}

impl LanguageDetector for StopwordDetector {
    fn is_english(&self, text: &str) -> bool {
        matches!(self.dominant_language(text), None | Some("en"))
    }
}

/// Removes duplicate and non-English records from a collection
pub struct Cleaner {
    detector: Box<dyn LanguageDetector>,
}

impl std::fmt::Debug for Cleaner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cleaner").finish_non_exhaustive()
    }
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new(StopwordDetector)
    }
}

impl Cleaner {
    /// Create a cleaner using `detector` for language classification
    pub fn new(detector: impl LanguageDetector + 'static) -> Self {
        Self {
            detector: Box::new(detector),
        }
    }

    /// Drop records equal to an earlier survivor, preserving the order of survivors.
    ///
    /// Equality is [`Publication`]'s structural equality (year, title, author set); the
    /// abstract is not compared.
    pub fn remove_duplicates(&self, publications: Vec<Publication>) -> Vec<Publication> {
        let before = publications.len();
        let mut survivors: Vec<Publication> = Vec::with_capacity(before);

        for publication in publications {
            match survivors.iter().find(|kept| **kept == publication) {
                Some(kept) => {
                    tracing::debug!(kept = %kept.id(), dropped = %publication.id(), "Duplicate record")
                }
                None => survivors.push(publication),
            }
        }

        tracing::info!(
            "Removed {} duplicates ({} -> {})",
            before - survivors.len(),
            before,
            survivors.len()
        );
        survivors
    }

    /// Drop records whose abstract is classified as not English
    pub fn remove_non_english(&self, publications: Vec<Publication>) -> Vec<Publication> {
        let before = publications.len();
        let kept: Vec<Publication> = publications
            .into_iter()
            .filter(|p| {
                let english = self.detector.is_english(&p.r#abstract);
                if !english {
                    tracing::debug!(id = %p.id(), "Dropping non-English record");
                }
                english
            })
            .collect();

        tracing::info!(
            "Removed {} non-English records ({} -> {})",
            before - kept.len(),
            before,
            kept.len()
        );
        kept
    }

    /// Remove duplicates, then non-English records
    pub fn clean(&self, publications: Vec<Publication>) -> Vec<Publication> {
        let unique = self.remove_duplicates(publications);
        self.remove_non_english(unique)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::publication::sample;

    fn with_abstract(mut p: Publication, text: &str) -> Publication {
        p.r#abstract = text.to_string();
        p
    }

    #[test]
    fn test_remove_duplicates_by_value() {
        let a = sample("Same Title", 2020, &["x", "y"], 0);
        let b = with_abstract(sample("Same Title", 2020, &["y", "x"], 7), "different abstract");
        let c = sample("Other Title", 2020, &["x"], 1);

        let cleaned = Cleaner::default().remove_duplicates(vec![a, c, b]);
        let titles: Vec<_> = cleaned.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["Same Title", "Other Title"]);
        assert_eq!(cleaned[0].internal_index, 0);
    }

    #[test]
    fn test_remove_duplicates_preserves_order() {
        let items: Vec<_> = (0..5)
            .map(|i| sample(&format!("T{}", i % 3), 2020, &["a"], i))
            .collect();
        let cleaned = Cleaner::default().remove_duplicates(items);
        let indices: Vec<_> = cleaned.iter().map(|p| p.internal_index).collect();
        assert_eq!(indices, [0, 1, 2]);
    }

    #[test]
    fn test_remove_non_english_with_stub_classifier() {
        let cleaner = Cleaner::new(|text: &str| text == "hello world");
        let english = with_abstract(sample("A", 2020, &["a"], 0), "hello world");
        let french = with_abstract(sample("B", 2020, &["b"], 1), "bonjour le monde");

        let kept = cleaner.remove_non_english(vec![english, french]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].r#abstract, "hello world");
    }

    #[test]
    fn test_stopword_detector() {
        let detector = StopwordDetector;
        assert!(detector.is_english("hello world"));
        assert!(!detector.is_english("bonjour le monde"));
        assert!(detector.is_english(
            "We propose a method for the analysis of graphs that is robust to noise."
        ));
        assert!(!detector.is_english(
            "Wir untersuchen die Wirkung der Methode und zeigen, dass sie nicht robust ist."
        ));
        assert_eq!(
            detector.dominant_language("Este estudio analiza los efectos del cambio"),
            Some("es")
        );
    }

    #[test]
    fn test_clean_runs_both_passes() {
        let a = with_abstract(sample("A", 2020, &["a"], 0), "the results of the study");
        let dup = with_abstract(sample("A", 2020, &["a"], 1), "the results of the study");
        let fr = with_abstract(sample("B", 2020, &["b"], 2), "les résultats de la étude");
        let kept = Cleaner::default().clean(vec![a, dup, fr]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].internal_index, 0);
    }
}

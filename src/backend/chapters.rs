use std::collections::HashSet;

use super::mangadex::Chapter;

/// Collapses a chapter feed to one entry per chapter number, keeping the first
/// upload seen in feed order. Numbers compare as exact strings, so "1" and
/// "1.0" stay separate. Chapters without a number share the single "unknown" key.
pub fn dedup_chapters(feed: Vec<Chapter>) -> Vec<Chapter> {
    let mut seen: HashSet<Option<String>> = HashSet::new();
    feed.into_iter()
        .filter(|chapter| seen.insert(chapter.number.clone()))
        .collect()
}

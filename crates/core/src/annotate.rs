//! First-mention annotation of known item names in narrative text.
//!
//! Highlight state lives in a [`HighlightTracker`] owned by the caller, one per
//! rendered document, so unrelated documents never suppress each other's
//! references.

use std::collections::{HashMap, HashSet};

use regex::{Matches, Regex};
use serde::Serialize;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Exotic,
    Mod,
    Aspect,
    Fragment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemReference {
    pub kind: ReferenceKind,
    pub name: String,
    pub image_url: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub armor_slot: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    Reference { item: ItemReference },
}

impl Segment {
    fn text(text: &str) -> Self {
        Segment::Text {
            text: text.to_string(),
        }
    }
}

/// Names already rendered as references within one document.
#[derive(Debug, Clone, Default)]
pub struct HighlightTracker {
    seen: HashSet<String>,
}

impl HighlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }

    pub fn is_highlighted(&self, name: &str) -> bool {
        self.seen.contains(name)
    }

    /// Returns `true` when the name had not been highlighted yet.
    pub fn mark(&mut self, name: &str) -> bool {
        if self.seen.contains(name) {
            return false;
        }
        self.seen.insert(name.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Name lookup plus a word-bounded pattern matching every known name,
/// longest names first.
#[derive(Debug, Clone)]
pub struct ItemIndex {
    items: HashMap<String, ItemReference>,
    pattern: Option<Regex>,
}

impl ItemIndex {
    /// Later references replace earlier ones with the same name.
    pub fn new<I>(references: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = ItemReference>,
    {
        let mut items = HashMap::new();
        for reference in references {
            if reference.name.trim().is_empty() {
                continue;
            }
            items.insert(reference.name.clone(), reference);
        }
        let mut names: Vec<&str> = items.keys().map(String::as_str).collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let pattern = if names.is_empty() {
            None
        } else {
            let alternation = names
                .iter()
                .map(|name| regex::escape(name))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!(r"\b(?:{alternation})\b"))?)
        };
        Ok(Self { items, pattern })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ItemReference> {
        self.items.get(name)
    }

    /// Splits one paragraph into text runs and references.
    ///
    /// `reset` clears the tracker first; pass `true` for the first paragraph
    /// of a new document.
    pub fn annotate<'a>(
        &'a self,
        text: &'a str,
        tracker: &'a mut HighlightTracker,
        reset: bool,
    ) -> Annotated<'a> {
        if reset {
            tracker.reset();
        }
        Annotated {
            text,
            index: self,
            matches: self.pattern.as_ref().map(|pattern| pattern.find_iter(text)),
            tracker,
            cursor: 0,
            queued: None,
        }
    }

    /// Annotates consecutive paragraphs of one document with a fresh tracker.
    pub fn annotate_document<'p, I>(&self, paragraphs: I) -> Vec<Vec<Segment>>
    where
        I: IntoIterator<Item = &'p str>,
    {
        let mut tracker = HighlightTracker::new();
        paragraphs
            .into_iter()
            .map(|paragraph| self.annotate(paragraph, &mut tracker, false).collect())
            .collect()
    }
}

/// Lazy left-to-right segment stream for one paragraph.
pub struct Annotated<'a> {
    text: &'a str,
    index: &'a ItemIndex,
    matches: Option<Matches<'a, 'a>>,
    tracker: &'a mut HighlightTracker,
    cursor: usize,
    queued: Option<Segment>,
}

impl Annotated<'_> {
    fn segment_for(&mut self, name: &str) -> Segment {
        let Some(item) = self.index.items.get(name) else {
            return Segment::text(name);
        };
        if self.tracker.mark(name) {
            Segment::Reference { item: item.clone() }
        } else {
            Segment::text(name)
        }
    }
}

impl Iterator for Annotated<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if let Some(segment) = self.queued.take() {
            return Some(segment);
        }
        let found = self.matches.as_mut().and_then(Iterator::next);
        match found {
            Some(found) => {
                let text = self.text;
                let preceding = &text[self.cursor..found.start()];
                self.cursor = found.end();
                let segment = self.segment_for(found.as_str());
                if preceding.is_empty() {
                    Some(segment)
                } else {
                    self.queued = Some(segment);
                    Some(Segment::text(preceding))
                }
            }
            None if self.cursor < self.text.len() => {
                let rest = &self.text[self.cursor..];
                self.cursor = self.text.len();
                Some(Segment::text(rest))
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(kind: ReferenceKind, name: &str) -> ItemReference {
        ItemReference {
            kind,
            name: name.to_string(),
            image_url: "/placeholder.svg".to_string(),
            description: String::new(),
            armor_slot: None,
        }
    }

    fn texts(segments: &[Segment]) -> Vec<String> {
        segments
            .iter()
            .map(|segment| match segment {
                Segment::Text { text } => format!("text:{text}"),
                Segment::Reference { item } => format!("ref:{}", item.name),
            })
            .collect()
    }

    #[test]
    fn only_first_mention_becomes_reference() {
        let index = ItemIndex::new([reference(ReferenceKind::Exotic, "Celestial Nighthawk")]).unwrap();
        let mut tracker = HighlightTracker::new();
        let segments: Vec<_> = index
            .annotate(
                "Celestial Nighthawk grants bonus damage. Celestial Nighthawk is strong.",
                &mut tracker,
                true,
            )
            .collect();
        assert_eq!(
            texts(&segments),
            vec![
                "ref:Celestial Nighthawk",
                "text: grants bonus damage. ",
                "text:Celestial Nighthawk",
                "text: is strong.",
            ]
        );
    }

    #[test]
    fn longer_name_matches_as_one_unit() {
        let index = ItemIndex::new([
            reference(ReferenceKind::Aspect, "Solar"),
            reference(ReferenceKind::Fragment, "Solar Flare"),
        ])
        .unwrap();
        let mut tracker = HighlightTracker::new();
        let segments: Vec<_> = index
            .annotate("Solar Flare pairs with Solar grenades.", &mut tracker, true)
            .collect();
        assert_eq!(
            texts(&segments),
            vec![
                "ref:Solar Flare",
                "text: pairs with ",
                "ref:Solar",
                "text: grenades.",
            ]
        );
    }

    #[test]
    fn matches_only_at_word_boundaries() {
        let index = ItemIndex::new([reference(ReferenceKind::Mod, "Bomber")]).unwrap();
        let mut tracker = HighlightTracker::new();
        let segments: Vec<_> = index
            .annotate("Bombers love Bomber.", &mut tracker, true)
            .collect();
        assert_eq!(
            texts(&segments),
            vec!["text:Bombers love ", "ref:Bomber", "text:."]
        );
    }

    #[test]
    fn tracking_spans_paragraphs_until_reset() {
        let index = ItemIndex::new([reference(ReferenceKind::Exotic, "Still Hunt")]).unwrap();
        let mut tracker = HighlightTracker::new();
        let first: Vec<_> = index.annotate("Still Hunt.", &mut tracker, true).collect();
        let second: Vec<_> = index.annotate("Still Hunt again.", &mut tracker, false).collect();
        let next_document: Vec<_> = index.annotate("Still Hunt.", &mut tracker, true).collect();
        assert_eq!(texts(&first)[0], "ref:Still Hunt");
        assert_eq!(texts(&second)[0], "text:Still Hunt");
        assert_eq!(texts(&next_document)[0], "ref:Still Hunt");
    }

    #[test]
    fn separate_documents_do_not_share_state() {
        let index = ItemIndex::new([reference(ReferenceKind::Aspect, "Gunpowder Gamble")]).unwrap();
        let first = index.annotate_document(["Gunpowder Gamble.", "Gunpowder Gamble!"]);
        let second = index.annotate_document(["Gunpowder Gamble."]);
        assert_eq!(texts(&first[0])[0], "ref:Gunpowder Gamble");
        assert_eq!(texts(&first[1])[0], "text:Gunpowder Gamble");
        assert_eq!(texts(&second[0])[0], "ref:Gunpowder Gamble");
    }

    #[test]
    fn names_with_regex_metacharacters_are_escaped() {
        let index = ItemIndex::new([reference(ReferenceKind::Exotic, "Mr. Snuggles")]).unwrap();
        let mut tracker = HighlightTracker::new();
        let segments: Vec<_> = index
            .annotate("MrX Snuggles is not Mr. Snuggles", &mut tracker, true)
            .collect();
        assert_eq!(
            texts(&segments),
            vec!["text:MrX Snuggles is not ", "ref:Mr. Snuggles"]
        );
    }

    #[test]
    fn empty_index_yields_whole_text() {
        let index = ItemIndex::new(Vec::new()).unwrap();
        let mut tracker = HighlightTracker::new();
        let segments: Vec<_> = index.annotate("plain text", &mut tracker, true).collect();
        assert_eq!(texts(&segments), vec!["text:plain text"]);
        let empty: Vec<_> = index.annotate("", &mut tracker, false).collect();
        assert!(empty.is_empty());
    }
}

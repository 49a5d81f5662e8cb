use std::collections::HashSet;

use smallvec::SmallVec;

use crate::{WordId, MAX_SLOT_LENGTH};

/// A single vocabulary entry.
#[derive(Debug, Clone)]
pub struct Word {
    pub text: String,
    pub chars: SmallVec<[char; MAX_SLOT_LENGTH]>,
}

/// The vocabulary available to every slot. Words are interned once and
/// addressed by [`WordId`]; insertion order is preserved so that solver runs
/// are deterministic for a given word list.
#[derive(Debug, Clone, Default)]
pub struct WordList {
    words: Vec<Word>,
}

impl WordList {
    /// Intern the given words. Empty strings are skipped and duplicates are
    /// dropped, keeping the first occurrence; a duplicate under a second id
    /// would defeat the ban on using one word in two slots.
    pub fn new<I>(words: I) -> WordList
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut seen: HashSet<String> = HashSet::new();
        let mut interned = Vec::new();

        for word in words {
            let text = word.as_ref().to_string();
            if text.is_empty() || !seen.insert(text.clone()) {
                continue;
            }
            let chars = text.chars().collect();
            interned.push(Word { text, chars });
        }

        WordList { words: interned }
    }

    /// Parse a word list from text with one word per line. Lines are trimmed
    /// and lowercased; blank lines are skipped.
    pub fn parse(text: &str) -> WordList {
        WordList::new(text.lines().map(|line| line.trim().to_lowercase()))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn get(&self, id: WordId) -> &Word {
        &self.words[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (WordId, &Word)> {
        self.words.iter().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::WordList;

    #[test]
    fn parse_trims_lowercases_and_skips_blanks() {
        let words = WordList::parse("  CAT\n\ndog \nten\n");

        let texts: Vec<&str> = words.iter().map(|(_, w)| w.text.as_str()).collect();
        assert_eq!(texts, ["cat", "dog", "ten"]);
    }

    #[test]
    fn duplicates_keep_their_first_id() {
        let words = WordList::new(["cat", "dog", "cat"]);

        assert_eq!(words.len(), 2);
        assert_eq!(words.get(0).text, "cat");
        assert_eq!(words.get(1).text, "dog");
    }

    #[test]
    fn words_expose_their_characters_by_offset() {
        let words = WordList::new(["code"]);

        assert_eq!(words.get(0).chars[0], 'c');
        assert_eq!(words.get(0).chars[3], 'e');
    }
}

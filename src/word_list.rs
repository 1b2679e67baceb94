//! This module loads the vocabulary that every slot's domain starts from. Words can come from
//! several sources (in memory, a file on disk, or embedded contents); each one is normalized into
//! the form used by the solver and broken into glyph ids so that letters can be compared and
//! counted cheaply.

use smallvec::{smallvec, SmallVec};
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fmt::Debug;
use std::fs;
use std::path::Path;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use crate::types::{GlyphId, WordId};
use crate::{MAX_GLYPH_COUNT, MAX_SLOT_LENGTH};

/// Stop collecting errors for a single source once it has produced this many.
const MAX_ERRORS_PER_SOURCE: usize = 100;

/// A struct representing a word in the word list.
#[derive(Debug, Clone)]
pub struct Word {
    /// The word as it would appear in a grid -- only lowercase letters or other valid glyphs.
    pub normalized_string: String,

    /// The word as it appears in the user's word list, with arbitrary formatting and punctuation.
    pub canonical_string: String,

    /// The glyph ids making up `normalized_string`.
    pub glyphs: SmallVec<[GlyphId; MAX_SLOT_LENGTH]>,
}

impl Word {
    /// The number of glyphs in the word, which is what gets compared against slot lengths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

/// Given a canonical word string from a dictionary file, turn it into the normalized form we'll
/// use in the actual fill engine.
#[must_use]
pub fn normalize_word(canonical: &str) -> String {
    canonical
        .to_lowercase()
        .nfc() // Normalize Unicode combining forms
        .filter(|c| !c.is_whitespace())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WordListError {
    #[error("can't read file: \u{201c}{0}\u{201d}")]
    InvalidPath(String),

    #[error("word list contains invalid word: \u{201c}{0}\u{201d}")]
    InvalidWord(String),
}

/// Configuration describing a source of wordlist entries.
pub enum WordListSourceConfig {
    Memory { id: String, words: Vec<String> },
    File { id: String, path: OsString },
    FileContents { id: String, contents: &'static str },
}

impl WordListSourceConfig {
    /// The unique, persistent id of this word list.
    #[must_use]
    pub fn id(&self) -> String {
        match self {
            WordListSourceConfig::Memory { id, .. }
            | WordListSourceConfig::FileContents { id, .. }
            | WordListSourceConfig::File { id, .. } => id.clone(),
        }
    }
}

#[derive(Debug)]
pub struct WordListSourceState {
    pub id: String,
    pub errors: Vec<WordListError>,
}

/// `WordListSourceState`s keyed by the `id` of the relevant source.
pub type WordListSourceStates = HashMap<String, WordListSourceState>;

/// A single word list entry.
struct RawWordListEntry {
    pub normalized: String,
    pub canonical: String,
}

impl RawWordListEntry {
    fn from_canonical(canonical: &str, errors: &mut Vec<WordListError>) -> Option<Self> {
        let normalized = normalize_word(canonical);
        if normalized.is_empty() {
            if errors.len() < MAX_ERRORS_PER_SOURCE {
                errors.push(WordListError::InvalidWord(canonical.into()));
            }
            return None;
        }

        Some(RawWordListEntry {
            normalized,
            canonical: canonical.to_string(),
        })
    }
}

/// Parse a dictionary file: one entry per line, with anything after a `;` (such as a score) being
/// ignored. Blank lines are skipped.
fn parse_word_list_file_contents(
    file_contents: &str,
    errors: &mut Vec<WordListError>,
) -> Vec<RawWordListEntry> {
    file_contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let canonical = line.split(';').next().unwrap_or_default().trim();
            RawWordListEntry::from_canonical(canonical, errors)
        })
        .collect()
}

fn load_words_from_source(
    source: &WordListSourceConfig,
) -> (Vec<RawWordListEntry>, WordListSourceState) {
    let id = source.id();
    let mut errors = vec![];

    let entries = match source {
        WordListSourceConfig::Memory { words, .. } => words
            .iter()
            .filter_map(|canonical| RawWordListEntry::from_canonical(canonical, &mut errors))
            .collect(),

        WordListSourceConfig::File { path, .. } => {
            if let Ok(contents) = fs::read_to_string(path) {
                parse_word_list_file_contents(&contents, &mut errors)
            } else {
                errors.push(WordListError::InvalidPath(path.to_string_lossy().into()));
                vec![]
            }
        }

        WordListSourceConfig::FileContents { contents, .. } => {
            parse_word_list_file_contents(contents, &mut errors)
        }
    };

    (entries, WordListSourceState { id, errors })
}

/// Load every source in order, keeping only the first occurrence of each normalized word.
fn load_words_from_sources(
    sources: &[WordListSourceConfig],
) -> (Vec<RawWordListEntry>, WordListSourceStates) {
    let mut seen_words: HashSet<String> = HashSet::new();
    let mut result = vec![];
    let mut states = HashMap::new();

    for source in sources {
        let (words, source_state) = load_words_from_source(source);
        for word in words {
            if seen_words.insert(word.normalized.clone()) {
                result.push(word);
            }
        }
        states.insert(source_state.id.clone(), source_state);
    }

    (result, states)
}

/// A struct representing the loaded vocabulary. Word ids are indices into `words` and stay stable
/// for the lifetime of the list; the order of `words` is the order in which entries were first
/// seen, which is also the order in which a slot's candidates are enumerated.
pub struct WordList {
    /// A list of all characters that occur in any (normalized) word. `GlyphId`s used everywhere
    /// else are indices into this list.
    pub glyphs: SmallVec<[char; MAX_GLYPH_COUNT]>,

    /// The inverse of `glyphs`: a map from a character to the `GlyphId` representing it.
    pub glyph_id_by_char: HashMap<char, GlyphId>,

    /// All loaded words, regardless of length.
    pub words: Vec<Word>,

    /// A map from a normalized string to the id of the Word representing it.
    pub word_id_by_string: HashMap<String, WordId>,

    /// The maximum word length provided when configuring the WordList, if any.
    pub max_length: Option<usize>,

    /// The state of each word list source after loading, keyed by source id.
    pub source_states: WordListSourceStates,
}

impl Debug for WordList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordList")
            .field("glyphs", &self.glyphs.len())
            .field("words", &self.words.len())
            .field("max_length", &self.max_length)
            .finish()
    }
}

impl WordList {
    /// Construct a new `WordList` using the given sources (omitting any entries that are longer than
    /// `max_length`).
    #[must_use]
    pub fn new(source_configs: Vec<WordListSourceConfig>, max_length: Option<usize>) -> WordList {
        let mut instance = WordList {
            glyphs: smallvec![],
            glyph_id_by_char: HashMap::new(),
            words: vec![],
            word_id_by_string: HashMap::new(),
            max_length,
            source_states: HashMap::new(),
        };

        let (raw_entries, source_states) = load_words_from_sources(&source_configs);
        instance.source_states = source_states;

        for raw_entry in raw_entries {
            if let Some(max_length) = max_length {
                if raw_entry.normalized.chars().count() > max_length {
                    continue;
                }
            }
            instance.add_word(&raw_entry);
        }

        log::debug!(
            "loaded {} words using {} glyphs from {} source(s)",
            instance.words.len(),
            instance.glyphs.len(),
            source_configs.len(),
        );

        instance
    }

    /// Build a `WordList` from an in-memory list of words.
    #[must_use]
    pub fn from_words<I, S>(words: I) -> WordList
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        WordList::new(
            vec![WordListSourceConfig::Memory {
                id: "0".into(),
                words: words.into_iter().map(|word| word.as_ref().to_string()).collect(),
            }],
            None,
        )
    }

    /// Load a single dictionary file. An unreadable file is an error; invalid lines are skipped
    /// and reported through `get_source_errors`.
    pub fn from_dict_file<P: AsRef<Path>>(
        path: P,
        max_length: Option<usize>,
    ) -> Result<WordList, WordListError> {
        let path = path.as_ref();
        let word_list = WordList::new(
            vec![WordListSourceConfig::File {
                id: "0".into(),
                path: path.as_os_str().to_owned(),
            }],
            max_length,
        );

        if let Some(error) = word_list
            .source_states
            .values()
            .flat_map(|state| &state.errors)
            .find(|error| matches!(error, WordListError::InvalidPath(_)))
        {
            return Err(error.clone());
        }

        Ok(word_list)
    }

    /// Errors encountered while loading, keyed by source id.
    #[must_use]
    pub fn get_source_errors(&self) -> HashMap<String, Vec<WordListError>> {
        self.source_states
            .iter()
            .map(|(id, state)| (id.clone(), state.errors.clone()))
            .collect()
    }

    /// Add the given word to the list. The word must not be part of the list yet.
    fn add_word(&mut self, raw_entry: &RawWordListEntry) -> WordId {
        let glyphs: SmallVec<[GlyphId; MAX_SLOT_LENGTH]> = raw_entry
            .normalized
            .chars()
            .map(|c| self.glyph_id_for_char(c))
            .collect();

        let word_id = self.words.len();
        self.words.push(Word {
            normalized_string: raw_entry.normalized.clone(),
            canonical_string: raw_entry.canonical.clone(),
            glyphs,
        });
        self.word_id_by_string
            .insert(raw_entry.normalized.clone(), word_id);

        word_id
    }

    /// What's the unique glyph id for the given char? We do this lazily, instead of just mapping
    /// every letter up front, because word list entries may also contain numbers, non-English
    /// letters, or punctuation.
    pub fn glyph_id_for_char(&mut self, ch: char) -> GlyphId {
        self.glyph_id_by_char.get(&ch).copied().unwrap_or_else(|| {
            self.glyphs.push(ch);
            let id = self.glyphs.len() - 1;
            self.glyph_id_by_char.insert(ch, id);
            id
        })
    }

    /// Look up the id of a word by its normalized or canonical spelling.
    #[must_use]
    pub fn word_id(&self, word: &str) -> Option<WordId> {
        self.word_id_by_string.get(&normalize_word(word)).copied()
    }

    #[must_use]
    pub fn get_word(&self, word_id: WordId) -> &Word {
        &self.words[word_id]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

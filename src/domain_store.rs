//! This module owns the mutable part of a fill: the set of candidate words still available for
//! each slot. Every slot starts with the whole word list, node consistency cuts that down to words
//! of the right length, and arc consistency and search remove more from there.
//!
//! Removals are recorded on an undo log (the "trail") so that the search can take a checkpoint
//! before a tentative choice and roll back to exactly the previous state if the choice fails,
//! without copying any domains.

use smallvec::SmallVec;
use std::fmt;
use std::fmt::{Debug, Formatter};

use crate::grid_config::{GridConfig, SlotId};
use crate::types::{GlyphId, WordId};
use crate::util::{build_glyph_counts_by_cell, GlyphCountsByCell};
use crate::{CHECK_INVARIANTS, MAX_SLOT_COUNT};

/// A struct tracking the live domain of a single slot.
#[derive(Clone)]
pub struct SlotDomain {
    /// Properties duplicated from `SlotConfig` for convenience.
    id: SlotId,
    length: usize,

    /// Record of which words have been removed from this slot, indexed by `WordId`.
    eliminations: Vec<bool>,

    /// A sorted superset of the words still available, so that iterating over the domain doesn't
    /// have to visit the whole word list. Node consistency compacts it down to the words of the
    /// right length.
    candidates: Vec<WordId>,

    /// To enable us to quickly validate crossing slots, we maintain a count of the number of
    /// instances of each glyph in each cell in our remaining options.
    glyph_counts_by_cell: GlyphCountsByCell,

    /// How many words are still available for this slot?
    remaining_option_count: usize,
}

impl Debug for SlotDomain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotDomain")
            .field("id", &self.id)
            .field("length", &self.length)
            .field("remaining_option_count", &self.remaining_option_count)
            .finish()
    }
}

impl SlotDomain {
    /// Build a domain containing every word in the word list.
    fn new(config: &GridConfig, slot_id: SlotId) -> SlotDomain {
        let length = config.slot_configs[slot_id].length;
        let all_word_ids: Vec<WordId> = (0..config.word_list.len()).collect();

        SlotDomain {
            id: slot_id,
            length,
            eliminations: vec![false; all_word_ids.len()],
            glyph_counts_by_cell: build_glyph_counts_by_cell(
                config.word_list,
                length,
                &all_word_ids,
            ),
            remaining_option_count: all_word_ids.len(),
            candidates: all_word_ids,
        }
    }

    /// Record that a word is unavailable for this slot.
    fn add_elimination(&mut self, config: &GridConfig, word_id: WordId) {
        if CHECK_INVARIANTS && self.eliminations[word_id] {
            panic!("Eliminating word {word_id} from slot {} twice?", self.id);
        }

        self.eliminations[word_id] = true;
        self.remaining_option_count -= 1;

        let word = config.word_list.get_word(word_id);
        for (cell_idx, &glyph) in word.glyphs.iter().take(self.length).enumerate() {
            self.glyph_counts_by_cell[cell_idx][glyph] -= 1;
        }
    }

    /// Record that a word is now available again for this slot.
    fn remove_elimination(&mut self, config: &GridConfig, word_id: WordId) {
        if CHECK_INVARIANTS && !self.eliminations[word_id] {
            panic!("Restoring word {word_id} to slot {} twice?", self.id);
        }

        self.eliminations[word_id] = false;
        self.remaining_option_count += 1;

        if let Err(idx) = self.candidates.binary_search(&word_id) {
            self.candidates.insert(idx, word_id);
        }

        let word = config.word_list.get_word(word_id);
        for (cell_idx, &glyph) in word.glyphs.iter().take(self.length).enumerate() {
            self.glyph_counts_by_cell[cell_idx][glyph] += 1;
        }
    }

    #[must_use]
    pub fn contains(&self, word_id: WordId) -> bool {
        !self.eliminations[word_id]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.remaining_option_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining_option_count == 0
    }

    /// The words still in this domain, in word list order.
    pub fn options(&self) -> impl Iterator<Item = WordId> + '_ {
        self.candidates
            .iter()
            .copied()
            .filter(|&word_id| !self.eliminations[word_id])
    }

    /// Drop removed words from the candidate list.
    fn compact(&mut self) {
        let eliminations = &self.eliminations;
        self.candidates.retain(|&word_id| !eliminations[word_id]);
    }

    /// The word remaining in this domain, if there's exactly one.
    #[must_use]
    pub fn single_option(&self) -> Option<WordId> {
        if self.remaining_option_count == 1 {
            self.options().next()
        } else {
            None
        }
    }

    /// How many remaining words have the given glyph in the given cell?
    #[must_use]
    pub fn glyph_count(&self, cell_idx: usize, glyph: GlyphId) -> u32 {
        self.glyph_counts_by_cell[cell_idx][glyph]
    }

    #[must_use]
    pub fn glyph_counts_by_cell(&self) -> &GlyphCountsByCell {
        &self.glyph_counts_by_cell
    }
}

/// A single removal recorded on the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elimination {
    pub slot_id: SlotId,
    pub word_id: WordId,
}

/// A position on the trail that the store can be rolled back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Checkpoint(usize);

/// The candidate words for every slot in a grid, plus the undo log of removals.
#[derive(Clone)]
pub struct DomainStore {
    slots: SmallVec<[SlotDomain; MAX_SLOT_COUNT]>,
    trail: Vec<Elimination>,
}

impl Debug for DomainStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainStore")
            .field("slots", &self.slots)
            .field("trail", &format!("({} eliminations)", self.trail.len()))
            .finish()
    }
}

impl DomainStore {
    /// Build a store in which every slot's domain is the full word list.
    #[must_use]
    pub fn new(config: &GridConfig) -> DomainStore {
        let mut store = DomainStore {
            slots: SmallVec::new(),
            trail: vec![],
        };
        store.initialize(config);
        store
    }

    /// Reset every slot's domain to the full word list and forget the trail.
    pub fn initialize(&mut self, config: &GridConfig) {
        self.slots = (0..config.slot_count())
            .map(|slot_id| SlotDomain::new(config, slot_id))
            .collect();
        self.trail.clear();
    }

    /// Remove every word that can't satisfy a slot's unary constraints: its length must equal the
    /// slot's length, and it must agree with any letters already filled into the slot's cells.
    /// Returns the number of words removed; running it again removes nothing.
    pub fn enforce_node_consistency(&mut self, config: &GridConfig) -> usize {
        let mut removed = 0;

        for slot_config in config.slot_configs {
            let slot_fill = slot_config.fill(config.fill, config.width);

            let rejected: Vec<WordId> = self.slots[slot_config.id]
                .options()
                .filter(|&word_id| {
                    let word = config.word_list.get_word(word_id);
                    word.len() != slot_config.length
                        || word.glyphs.iter().zip(&slot_fill).any(|(&glyph, cell)| {
                            cell.is_some_and(|ch| config.word_list.glyphs[glyph] != ch)
                        })
                })
                .collect();

            for word_id in rejected {
                if self.remove(config, slot_config.id, word_id) {
                    removed += 1;
                }
            }

            self.slots[slot_config.id].compact();
        }

        log::debug!("node consistency removed {removed} candidates");

        removed
    }

    /// Remove a word from a slot's domain, recording the removal on the trail. Returns false if the
    /// word had already been removed.
    pub fn remove(&mut self, config: &GridConfig, slot_id: SlotId, word_id: WordId) -> bool {
        if !self.slots[slot_id].contains(word_id) {
            return false;
        }

        self.slots[slot_id].add_elimination(config, word_id);
        self.trail.push(Elimination { slot_id, word_id });
        true
    }

    /// Put a removed word back into a slot's domain. This is the inverse of `remove`; it doesn't
    /// touch the trail, so it's mostly useful through `rollback`. Returns false if the word was
    /// already available.
    pub fn restore(&mut self, config: &GridConfig, slot_id: SlotId, word_id: WordId) -> bool {
        if self.slots[slot_id].contains(word_id) {
            return false;
        }

        self.slots[slot_id].remove_elimination(config, word_id);
        true
    }

    /// The current position on the trail.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.trail.len())
    }

    /// Undo every removal made since the given checkpoint, most recent first.
    pub fn rollback(&mut self, config: &GridConfig, checkpoint: Checkpoint) {
        while self.trail.len() > checkpoint.0 {
            let Some(Elimination { slot_id, word_id }) = self.trail.pop() else {
                break;
            };
            self.restore(config, slot_id, word_id);
        }
    }

    /// The removals made since the given checkpoint, oldest first.
    #[must_use]
    pub fn eliminations_since(&self, checkpoint: Checkpoint) -> &[Elimination] {
        &self.trail[checkpoint.0.min(self.trail.len())..]
    }

    #[must_use]
    pub fn slot(&self, slot_id: SlotId) -> &SlotDomain {
        &self.slots[slot_id]
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn contains(&self, slot_id: SlotId, word_id: WordId) -> bool {
        self.slots[slot_id].contains(word_id)
    }

    #[must_use]
    pub fn option_count(&self, slot_id: SlotId) -> usize {
        self.slots[slot_id].len()
    }

    /// The words still in a slot's domain, in word list order.
    pub fn options(&self, slot_id: SlotId) -> impl Iterator<Item = WordId> + '_ {
        self.slots[slot_id].options()
    }

    /// Is any slot's domain empty?
    #[must_use]
    pub fn has_wipeout(&self) -> bool {
        self.slots.iter().any(SlotDomain::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use crate::domain_store::DomainStore;
    use crate::grid_config::tests::generate_config;

    const TEMPLATE: &str = "
        ___
        #_#
        #_#
    ";

    #[test]
    fn test_initialize_uses_full_word_list() {
        let grid_config = generate_config(TEMPLATE, &["cab", "at", "bat", "house"]);
        let config = grid_config.to_config_ref();

        let domains = DomainStore::new(&config);

        for slot_id in 0..config.slot_count() {
            assert_eq!(domains.option_count(slot_id), 4);
            assert_eq!(domains.options(slot_id).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn test_node_consistency_keeps_matching_lengths() {
        let grid_config = generate_config(TEMPLATE, &["cab", "at", "bat", "house"]);
        let config = grid_config.to_config_ref();
        let mut domains = DomainStore::new(&config);

        assert_eq!(domains.enforce_node_consistency(&config), 4);

        for slot_config in config.slot_configs {
            for word_id in domains.options(slot_config.id) {
                assert_eq!(config.word_list.get_word(word_id).len(), slot_config.length);
            }
        }
        assert_eq!(domains.options(0).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_node_consistency_is_idempotent() {
        let grid_config = generate_config(TEMPLATE, &["cab", "at", "bat", "house"]);
        let config = grid_config.to_config_ref();
        let mut domains = DomainStore::new(&config);

        domains.enforce_node_consistency(&config);
        let once: Vec<Vec<usize>> = (0..config.slot_count())
            .map(|slot_id| domains.options(slot_id).collect())
            .collect();

        assert_eq!(domains.enforce_node_consistency(&config), 0);
        let twice: Vec<Vec<usize>> = (0..config.slot_count())
            .map(|slot_id| domains.options(slot_id).collect())
            .collect();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_node_consistency_respects_prefilled_letters() {
        let grid_config = generate_config(
            "
            _A_
            #_#
            #_#
            ",
            &["cab", "car", "bat", "ant"],
        );
        let config = grid_config.to_config_ref();
        let mut domains = DomainStore::new(&config);

        domains.enforce_node_consistency(&config);

        assert_eq!(domains.options(0).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(domains.options(1).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_node_consistency_shrinks_candidate_list() {
        let grid_config = generate_config(TEMPLATE, &["cab", "at", "bat", "house", "car"]);
        let config = grid_config.to_config_ref();
        let mut domains = DomainStore::new(&config);

        assert_eq!(domains.slots[0].candidates.len(), 5);

        let checkpoint = domains.checkpoint();
        domains.enforce_node_consistency(&config);

        assert_eq!(domains.slots[0].candidates, vec![0, 2, 4]);
        assert_eq!(domains.slots[1].candidates, vec![0, 2, 4]);

        // Words removed later stay listed, but aren't offered.
        domains.remove(&config, 0, 2);
        assert_eq!(domains.slots[0].candidates, vec![0, 2, 4]);
        assert_eq!(domains.options(0).collect::<Vec<_>>(), vec![0, 4]);

        // Undoing node consistency puts every word back, in order.
        domains.rollback(&config, checkpoint);
        assert_eq!(domains.slots[0].candidates, vec![0, 1, 2, 3, 4]);
        assert_eq!(domains.options(0).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_rollback_restores_exact_state() {
        let grid_config = generate_config(TEMPLATE, &["cab", "car", "bat", "rat"]);
        let config = grid_config.to_config_ref();
        let mut domains = DomainStore::new(&config);
        domains.enforce_node_consistency(&config);

        let before = domains.slot(0).glyph_counts_by_cell().clone();
        let checkpoint = domains.checkpoint();

        assert!(domains.remove(&config, 0, 1));
        assert!(domains.remove(&config, 0, 3));
        assert!(!domains.remove(&config, 0, 3));
        assert_eq!(domains.option_count(0), 2);
        assert_eq!(domains.eliminations_since(checkpoint).len(), 2);

        domains.rollback(&config, checkpoint);

        assert_eq!(domains.option_count(0), 4);
        assert_eq!(domains.slot(0).glyph_counts_by_cell(), &before);
        assert!(domains.eliminations_since(checkpoint).is_empty());
    }

    #[test]
    fn test_remove_and_restore_update_glyph_counts() {
        let grid_config = generate_config(TEMPLATE, &["cab", "car", "bat"]);
        let config = grid_config.to_config_ref();
        let mut domains = DomainStore::new(&config);
        let c = config.word_list.glyph_id_by_char[&'c'];

        assert_eq!(domains.slot(0).glyph_count(0, c), 2);
        domains.remove(&config, 0, 0);
        assert_eq!(domains.slot(0).glyph_count(0, c), 1);
        assert_eq!(domains.slot(0).single_option(), None);
        domains.remove(&config, 0, 1);
        assert_eq!(domains.slot(0).single_option(), Some(2));

        assert!(domains.restore(&config, 0, 0));
        assert!(!domains.restore(&config, 0, 0));
        assert_eq!(domains.slot(0).glyph_count(0, c), 1);
        assert!(!domains.has_wipeout());
    }
}

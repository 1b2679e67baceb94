//! Partial assignments of words to slots, and the checks that decide whether an assignment
//! satisfies the grid's constraints.

use std::collections::HashSet;

use crate::grid_config::{Choice, GridConfig, SlotId};
use crate::types::WordId;

/// A partial mapping from slot to chosen word. Slots are only ever unassigned explicitly, when the
/// search backs out of a choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    words: Vec<Option<WordId>>,
    assigned_count: usize,
}

impl Assignment {
    /// An empty assignment for a grid with the given number of slots.
    #[must_use]
    pub fn new(slot_count: usize) -> Assignment {
        Assignment {
            words: vec![None; slot_count],
            assigned_count: 0,
        }
    }

    /// Build an assignment from a list of choices.
    #[must_use]
    pub fn from_choices(slot_count: usize, choices: &[Choice]) -> Assignment {
        let mut assignment = Assignment::new(slot_count);
        for choice in choices {
            assignment.assign(choice.slot_id, choice.word_id);
        }
        assignment
    }

    #[must_use]
    pub fn get(&self, slot_id: SlotId) -> Option<WordId> {
        self.words[slot_id]
    }

    #[must_use]
    pub fn is_assigned(&self, slot_id: SlotId) -> bool {
        self.words[slot_id].is_some()
    }

    /// Assign a word to a slot, returning the word it replaces (if any).
    pub fn assign(&mut self, slot_id: SlotId, word_id: WordId) -> Option<WordId> {
        let previous = self.words[slot_id].replace(word_id);
        if previous.is_none() {
            self.assigned_count += 1;
        }
        previous
    }

    /// Clear a slot's word, returning it.
    pub fn unassign(&mut self, slot_id: SlotId) -> Option<WordId> {
        let previous = self.words[slot_id].take();
        if previous.is_some() {
            self.assigned_count -= 1;
        }
        previous
    }

    /// The number of assigned slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assigned_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assigned_count == 0
    }

    /// Does every slot have a word?
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.assigned_count == self.words.len()
    }

    /// Is this word assigned to any slot?
    #[must_use]
    pub fn contains_word(&self, word_id: WordId) -> bool {
        self.words.contains(&Some(word_id))
    }

    /// The assigned `(slot, word)` pairs, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, WordId)> + '_ {
        self.words
            .iter()
            .enumerate()
            .filter_map(|(slot_id, word_id)| word_id.map(|word_id| (slot_id, word_id)))
    }

    /// The assigned slots as a list of choices, in slot order.
    #[must_use]
    pub fn to_choices(&self) -> Vec<Choice> {
        self.iter()
            .map(|(slot_id, word_id)| Choice { slot_id, word_id })
            .collect()
    }
}

/// Does the word fit the slot on its own: the right length, and agreeing with any letters
/// pre-filled into the slot's cells?
fn satisfies_unary_constraints(config: &GridConfig, slot_id: SlotId, word_id: WordId) -> bool {
    let slot_config = &config.slot_configs[slot_id];
    let word = config.word_list.get_word(word_id);

    word.len() == slot_config.length
        && slot_config
            .fill(config.fill, config.width)
            .iter()
            .zip(&word.glyphs)
            .all(|(cell, &glyph)| cell.map_or(true, |ch| config.word_list.glyphs[glyph] == ch))
}

/// Do the words for two slots agree on the letter in their shared cell? Slots that don't
/// intersect always agree.
fn crossing_agrees(
    config: &GridConfig,
    slot_id: SlotId,
    word_id: WordId,
    other_slot_id: SlotId,
    other_word_id: WordId,
) -> bool {
    let Some((i, j)) = config.overlap(slot_id, other_slot_id) else {
        return true;
    };

    let word = config.word_list.get_word(word_id);
    let other_word = config.word_list.get_word(other_word_id);

    match (word.glyphs.get(i), other_word.glyphs.get(j)) {
        (Some(glyph), Some(other_glyph)) => glyph == other_glyph,
        _ => false,
    }
}

/// Is the assignment consistent? That is:
///
/// - no word is assigned to more than one slot;
/// - every assigned word has its slot's length (and matches any pre-filled letters);
/// - every pair of assigned, overlapping slots agrees on the shared letter.
#[must_use]
pub fn is_consistent(config: &GridConfig, assignment: &Assignment) -> bool {
    let mut seen_words: HashSet<WordId> = HashSet::with_capacity(assignment.len());

    for (slot_id, word_id) in assignment.iter() {
        if !seen_words.insert(word_id) || !satisfies_unary_constraints(config, slot_id, word_id) {
            return false;
        }

        let crossings_agree = config.neighbors(slot_id).all(|other_slot_id| {
            assignment.get(other_slot_id).map_or(true, |other_word_id| {
                crossing_agrees(config, slot_id, word_id, other_slot_id, other_word_id)
            })
        });
        if !crossings_agree {
            return false;
        }
    }

    true
}

/// Would assigning `word_id` to the (unassigned) slot keep a consistent assignment consistent?
/// This only checks the constraints involving the new slot, so it's equivalent to
/// `is_consistent` on the extended assignment as long as the existing one is consistent.
#[must_use]
pub fn is_consistent_with(
    config: &GridConfig,
    assignment: &Assignment,
    slot_id: SlotId,
    word_id: WordId,
) -> bool {
    !assignment.contains_word(word_id)
        && satisfies_unary_constraints(config, slot_id, word_id)
        && config.neighbors(slot_id).all(|other_slot_id| {
            assignment.get(other_slot_id).map_or(true, |other_word_id| {
                crossing_agrees(config, slot_id, word_id, other_slot_id, other_word_id)
            })
        })
}

#[cfg(test)]
mod tests {
    use crate::assignment::{is_consistent, is_consistent_with, Assignment};
    use crate::grid_config::tests::generate_config;
    use crate::grid_config::Choice;

    const CORNER_TEMPLATE: &str = "
        ___
        _##
        _##
    ";

    #[test]
    fn test_assign_and_unassign() {
        let mut assignment = Assignment::new(3);
        assert!(assignment.is_empty());

        assert_eq!(assignment.assign(1, 7), None);
        assert_eq!(assignment.assign(1, 8), Some(7));
        assert_eq!(assignment.len(), 1);
        assert!(assignment.contains_word(8));
        assert!(!assignment.contains_word(7));

        assignment.assign(0, 2);
        assignment.assign(2, 3);
        assert!(assignment.is_complete());
        assert_eq!(
            assignment.to_choices(),
            vec![
                Choice {
                    slot_id: 0,
                    word_id: 2
                },
                Choice {
                    slot_id: 1,
                    word_id: 8
                },
                Choice {
                    slot_id: 2,
                    word_id: 3
                },
            ]
        );

        assert_eq!(assignment.unassign(1), Some(8));
        assert_eq!(assignment.unassign(1), None);
        assert!(!assignment.is_complete());
        assert_eq!(assignment.len(), 2);
    }

    #[test]
    fn test_consistent_assignment() {
        let grid_config = generate_config(CORNER_TEMPLATE, &["abc", "axe", "ab"]);
        let config = grid_config.to_config_ref();

        let assignment = Assignment::from_choices(
            2,
            &[
                Choice {
                    slot_id: 0,
                    word_id: 0,
                },
                Choice {
                    slot_id: 1,
                    word_id: 1,
                },
            ],
        );

        assert!(is_consistent(&config, &assignment));
        assert!(is_consistent(&config, &Assignment::new(2)));
    }

    #[test]
    fn test_reused_word_is_inconsistent() {
        let grid_config = generate_config(CORNER_TEMPLATE, &["abc", "axe"]);
        let config = grid_config.to_config_ref();

        let mut assignment = Assignment::new(2);
        assignment.assign(0, 0);

        // "abc" agrees with itself in the shared cell, but it can only be used once.
        assert!(!is_consistent_with(&config, &assignment, 1, 0));
        assignment.assign(1, 0);
        assert!(!is_consistent(&config, &assignment));
    }

    #[test]
    fn test_wrong_length_is_inconsistent() {
        let grid_config = generate_config(CORNER_TEMPLATE, &["abc", "ab"]);
        let config = grid_config.to_config_ref();

        let mut assignment = Assignment::new(2);
        assignment.assign(1, 1);

        assert!(!is_consistent(&config, &assignment));
        assert!(!is_consistent_with(&config, &Assignment::new(2), 0, 1));
    }

    #[test]
    fn test_mismatched_crossing_is_inconsistent() {
        let grid_config = generate_config(CORNER_TEMPLATE, &["abc", "xyz"]);
        let config = grid_config.to_config_ref();

        let mut assignment = Assignment::new(2);
        assignment.assign(0, 0);

        assert!(!is_consistent_with(&config, &assignment, 1, 1));
        assignment.assign(1, 1);
        assert!(!is_consistent(&config, &assignment));
    }

    #[test]
    fn test_prefilled_letters_are_enforced() {
        let grid_config = generate_config(
            "
            __B
            _##
            _##
            ",
            &["abc", "axe", "xab"],
        );
        let config = grid_config.to_config_ref();

        assert!(!is_consistent_with(&config, &Assignment::new(2), 0, 0));
        assert!(is_consistent_with(&config, &Assignment::new(2), 0, 2));
    }
}

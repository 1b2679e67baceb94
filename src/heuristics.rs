//! Ordering policies used by the backtracking search: which slot to fill next, and which of its
//! candidate words to try first. The search takes these as trait objects (or generics), so the
//! default policies below can be swapped out without touching the search itself.

use std::cmp::Reverse;

use crate::assignment::Assignment;
use crate::domain_store::DomainStore;
use crate::grid_config::{GridConfig, SlotId};
use crate::types::WordId;

/// Chooses the next slot to fill.
pub trait VariableOrdering {
    /// Pick one of the slots not yet in `assignment`, or `None` if every slot is assigned.
    fn select_unassigned_variable(
        &self,
        config: &GridConfig,
        domains: &DomainStore,
        assignment: &Assignment,
    ) -> Option<SlotId>;
}

/// Orders the candidate words for a slot.
pub trait ValueOrdering {
    /// Return every word in the slot's current domain, each exactly once, in the order they
    /// should be tried.
    fn order_domain_values(
        &self,
        config: &GridConfig,
        domains: &DomainStore,
        assignment: &Assignment,
        slot_id: SlotId,
    ) -> Vec<WordId>;
}

/// Pick the unassigned slot with the fewest remaining candidates. Ties go to the slot crossing
/// the most other slots, and then to the lowest slot id.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimumRemainingValues;

impl VariableOrdering for MinimumRemainingValues {
    fn select_unassigned_variable(
        &self,
        config: &GridConfig,
        domains: &DomainStore,
        assignment: &Assignment,
    ) -> Option<SlotId> {
        (0..config.slot_count())
            .filter(|&slot_id| !assignment.is_assigned(slot_id))
            .min_by_key(|&slot_id| {
                (
                    domains.option_count(slot_id),
                    Reverse(config.degree(slot_id)),
                    slot_id,
                )
            })
    }
}

/// Pick the unassigned slot with the lowest id.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstUnassigned;

impl VariableOrdering for FirstUnassigned {
    fn select_unassigned_variable(
        &self,
        config: &GridConfig,
        _domains: &DomainStore,
        assignment: &Assignment,
    ) -> Option<SlotId> {
        (0..config.slot_count()).find(|&slot_id| !assignment.is_assigned(slot_id))
    }
}

/// How many candidates would choosing `word_id` for `slot_id` rule out of the slot's unassigned
/// neighbors? A neighbor's candidate is ruled out if it has a different letter in the shared cell,
/// or if it's the same word (since words can't be reused).
#[must_use]
pub fn count_ruled_out(
    config: &GridConfig,
    domains: &DomainStore,
    assignment: &Assignment,
    slot_id: SlotId,
    word_id: WordId,
) -> usize {
    let word = config.word_list.get_word(word_id);

    config
        .neighbors(slot_id)
        .filter(|&other_slot_id| !assignment.is_assigned(other_slot_id))
        .map(|other_slot_id| {
            let Some((cell_idx, other_cell_idx)) = config.overlap(slot_id, other_slot_id) else {
                return 0;
            };
            let Some(&glyph) = word.glyphs.get(cell_idx) else {
                return 0;
            };

            let other_domain = domains.slot(other_slot_id);
            let mismatched =
                other_domain.len() - other_domain.glyph_count(other_cell_idx, glyph) as usize;

            // The neighbor's copy of this word agrees with itself, so it isn't counted above.
            let duplicate = other_domain.contains(word_id)
                && word.glyphs.get(other_cell_idx) == Some(&glyph);

            mismatched + usize::from(duplicate)
        })
        .sum()
}

/// Try the words that leave the most options open for neighboring slots first. Ties keep their
/// order in the word list.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastConstrainingValue;

impl ValueOrdering for LeastConstrainingValue {
    fn order_domain_values(
        &self,
        config: &GridConfig,
        domains: &DomainStore,
        assignment: &Assignment,
        slot_id: SlotId,
    ) -> Vec<WordId> {
        let mut scored: Vec<(usize, WordId)> = domains
            .options(slot_id)
            .map(|word_id| {
                (
                    count_ruled_out(config, domains, assignment, slot_id, word_id),
                    word_id,
                )
            })
            .collect();

        // Stable, so equal scores stay in domain order.
        scored.sort_by_key(|&(ruled_out, _)| ruled_out);

        scored.into_iter().map(|(_, word_id)| word_id).collect()
    }
}

/// Try the words in word list order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainOrder;

impl ValueOrdering for DomainOrder {
    fn order_domain_values(
        &self,
        _config: &GridConfig,
        domains: &DomainStore,
        _assignment: &Assignment,
        slot_id: SlotId,
    ) -> Vec<WordId> {
        domains.options(slot_id).collect()
    }
}

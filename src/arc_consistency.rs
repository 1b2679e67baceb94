//! This module contains a crossword-specific implementation of the AC-3 algorithm for establishing
//! and maintaining arc consistency. For our purposes, a grid is arc-consistent when, for every
//! pair of crossing slots X and Y, each word still available for X has at least one word available
//! for Y that puts the same letter in their shared cell. For example, if 1D doesn't have any
//! options starting with the letter A, we want to remove any options for 1A that start with A.
//!
//! We work through a FIFO queue of directed arcs `(X, Y)`, revising X against Y. Whenever a
//! revision removes something from X, every other slot crossing X has to be checked against it
//! again, so those arcs go back on the queue. We keep going until the queue is empty or some slot
//! runs out of options.
//!
//! Support checks use the per-cell glyph counts maintained by `DomainStore`, so revising X against
//! Y costs one lookup per word in X rather than a scan of Y's domain.

use std::collections::{HashSet, VecDeque};

use crate::domain_store::DomainStore;
use crate::grid_config::{GridConfig, SlotId};
use crate::types::WordId;

/// A directed constraint between two crossing slots: `(x, y)` means "every word left for `x` needs
/// a compatible word left for `y`".
pub type SlotArc = (SlotId, SlotId);

/// Result from a successful call to `establish_arc_consistency`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcConsistencySuccess {
    /// How many words were removed from domains.
    pub eliminations: usize,

    /// How many arcs were revised.
    pub revisions: usize,
}

/// Result from a failed call to `establish_arc_consistency`: some slot was left with no options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcConsistencyFailure {
    pub wiped_out_slot_id: SlotId,
}

/// Result from a call to `establish_arc_consistency`.
pub type ArcConsistencyResult = Result<ArcConsistencySuccess, ArcConsistencyFailure>;

/// Make `x` arc-consistent with `y`: remove every word from `x`'s domain that has no word in
/// `y`'s domain with the same letter at their shared cell. Returns true if anything was removed.
/// Slots that don't cross are already consistent with each other, so this is a no-op for them.
pub fn revise(config: &GridConfig, domains: &mut DomainStore, x: SlotId, y: SlotId) -> bool {
    let Some((x_cell, y_cell)) = config.overlap(x, y) else {
        return false;
    };

    let y_domain = domains.slot(y);
    let unsupported: Vec<WordId> = domains
        .options(x)
        .filter(|&word_id| {
            config
                .word_list
                .get_word(word_id)
                .glyphs
                .get(x_cell)
                .map_or(true, |&glyph| y_domain.glyph_count(y_cell, glyph) == 0)
        })
        .collect();

    for &word_id in &unsupported {
        domains.remove(config, x, word_id);
    }

    !unsupported.is_empty()
}

/// Every ordered pair of distinct slots, in slot order. Pairs that don't cross are included; they
/// just revise to nothing.
#[must_use]
pub fn all_arcs(config: &GridConfig) -> Vec<SlotArc> {
    let slot_count = config.slot_count();
    (0..slot_count)
        .flat_map(|x| (0..slot_count).filter(move |&y| y != x).map(move |y| (x, y)))
        .collect()
}

/// Run AC-3 over the given domains, starting from the given arcs (or from every arc, if `arcs` is
/// `None`). Eliminations go through `domains`, so callers can undo them by rolling back to a
/// checkpoint taken before the call. On failure the domains are left partially pruned.
pub fn establish_arc_consistency(
    config: &GridConfig,
    domains: &mut DomainStore,
    arcs: Option<Vec<SlotArc>>,
) -> ArcConsistencyResult {
    let mut queue: VecDeque<SlotArc> = arcs.unwrap_or_else(|| all_arcs(config)).into();
    let mut queued: HashSet<SlotArc> = queue.iter().copied().collect();

    let checkpoint = domains.checkpoint();
    let mut revisions = 0;

    while let Some(arc) = queue.pop_front() {
        queued.remove(&arc);
        let (x, y) = arc;
        revisions += 1;

        if !revise(config, domains, x, y) {
            continue;
        }

        if domains.slot(x).is_empty() {
            log::trace!(
                "arc consistency wiped out slot {} after {revisions} revisions",
                config.slot_configs[x].slot_key(),
            );
            return Err(ArcConsistencyFailure {
                wiped_out_slot_id: x,
            });
        }

        for z in config.neighbors(x) {
            if z != y && queued.insert((z, x)) {
                queue.push_back((z, x));
            }
        }
    }

    Ok(ArcConsistencySuccess {
        eliminations: domains.eliminations_since(checkpoint).len(),
        revisions,
    })
}

/// Is every word in every slot's domain supported by each of its crossing slots?
#[must_use]
pub fn is_arc_consistent(config: &GridConfig, domains: &DomainStore) -> bool {
    all_arcs(config).into_iter().all(|(x, y)| {
        let Some((x_cell, y_cell)) = config.overlap(x, y) else {
            return true;
        };
        let y_domain = domains.slot(y);
        domains.options(x).all(|word_id| {
            config
                .word_list
                .get_word(word_id)
                .glyphs
                .get(x_cell)
                .is_some_and(|&glyph| y_domain.glyph_count(y_cell, glyph) > 0)
        })
    })
}

/// Build domains for the given grid config, make them node-consistent, and then establish arc
/// consistency over all arcs.
pub fn establish_arc_consistency_for_static_grid(
    config: &GridConfig,
) -> Result<DomainStore, ArcConsistencyFailure> {
    let mut domains = DomainStore::new(config);
    domains.enforce_node_consistency(config);
    establish_arc_consistency(config, &mut domains, None)?;
    Ok(domains)
}

//! This module implements grid-filling using a chronological backtracking search. Before searching
//! we make every slot's domain node-consistent (right length, agreeing with pre-filled letters)
//! and arc-consistent using AC-3. Then we repeatedly pick a slot (by default using the "minimum
//! remaining values" heuristic, breaking ties by degree), try its candidates in order (by default
//! "least constraining value" first), and recurse.
//!
//! By default we also maintain arc consistency during the search: each tentative choice shrinks
//! the slot's domain to that one word, removes the word from every other unassigned slot (since
//! entries can't repeat), and runs AC-3 on the arcs affected by those removals. If that wipes out a
//! domain the choice is abandoned right away. All of these removals go on the domain store's
//! trail, so backing out of a choice is a rollback to the checkpoint taken before it.

use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::arc_consistency::{establish_arc_consistency, is_arc_consistent, SlotArc};
use crate::assignment::{is_consistent, is_consistent_with, Assignment};
use crate::domain_store::DomainStore;
use crate::grid_config::{Choice, GridConfig, SlotId};
use crate::heuristics::{
    LeastConstrainingValue, MinimumRemainingValues, ValueOrdering, VariableOrdering,
};
use crate::types::WordId;
use crate::CHECK_INVARIANTS;

/// How many states should we visit between checks of whether we've passed our deadline or been
/// asked to abort?
pub const INTERRUPT_FREQUENCY: usize = 10;

/// A struct tracking stats about the filling process.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    /// Number of partial assignments visited.
    pub states: usize,

    /// Number of tentative choices that had to be undone.
    pub backtracks: usize,

    /// Number of candidates removed by node consistency and arc consistency, including ones that
    /// were later restored by backtracking.
    pub eliminations: usize,

    pub total_time: Duration,
    pub initial_arc_consistency_time: Duration,
    pub choice_arc_consistency_time: Duration,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} states, {} backtracks, {} eliminations in {:?} ({:?} initial propagation, {:?} \
             propagating choices)",
            self.states,
            self.backtracks,
            self.eliminations,
            self.total_time,
            self.initial_arc_consistency_time,
            self.choice_arc_consistency_time,
        )
    }
}

/// Settings for a single fill attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillOptions {
    /// Propagate each tentative choice with AC-3 instead of only checking it against the
    /// assignment so far.
    pub maintain_arc_consistency: bool,

    /// Give up (with `FillFailure::ExceededBacktrackLimit`) after this many backtracks.
    pub max_backtracks: Option<usize>,

    /// Give up (with `FillFailure::Timeout`) once this much time has passed.
    pub timeout: Option<Duration>,
}

impl Default for FillOptions {
    fn default() -> Self {
        FillOptions {
            maintain_arc_consistency: true,
            max_backtracks: None,
            timeout: None,
        }
    }
}

/// A struct representing the results of a successful fill operation.
#[derive(Debug, Clone)]
pub struct FillSuccess {
    pub statistics: Statistics,

    /// One choice per slot, in slot order.
    pub choices: Vec<Choice>,
}

/// Why a fill operation didn't produce a fill. Only `Unsatisfiable` means that no fill exists;
/// the other variants mean the search was cut short by one of the caller's limits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FillFailure {
    #[error("no fill exists for this grid and word list")]
    Unsatisfiable,

    #[error("timed out before finding a fill")]
    Timeout,

    #[error("aborted before finding a fill")]
    Abort,

    #[error("gave up after {0} backtracks")]
    ExceededBacktrackLimit(usize),
}

impl FillFailure {
    /// Does this failure prove that the grid can't be filled?
    #[must_use]
    pub fn is_definitive(&self) -> bool {
        matches!(self, FillFailure::Unsatisfiable)
    }
}

enum SearchOutcome {
    /// Every slot has a word.
    Complete,

    /// No extension of the current assignment works.
    Exhausted,
}

/// The mutable state of a single search.
struct Search<'a, V: ?Sized, O: ?Sized> {
    config: &'a GridConfig<'a>,
    options: &'a FillOptions,
    variable_ordering: &'a V,
    value_ordering: &'a O,
    deadline: Option<Instant>,
    domains: DomainStore,
    assignment: Assignment,
    statistics: Statistics,
}

impl<'a, V, O> Search<'a, V, O>
where
    V: VariableOrdering + ?Sized,
    O: ValueOrdering + ?Sized,
{
    fn check_interrupts(&self) -> Result<(), FillFailure> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(FillFailure::Timeout);
            }
        }
        if let Some(abort) = self.config.abort {
            if abort.load(std::sync::atomic::Ordering::Relaxed) {
                return Err(FillFailure::Abort);
            }
        }
        Ok(())
    }

    /// Propagate the implications of assigning `word_id` to `slot_id`. Returns false if some
    /// slot's domain was wiped out, in which case the caller needs to roll back.
    fn propagate_choice(&mut self, slot_id: SlotId, word_id: WordId) -> bool {
        let start = Instant::now();
        let config = self.config;

        let others: Vec<WordId> = self
            .domains
            .options(slot_id)
            .filter(|&other_word_id| other_word_id != word_id)
            .collect();
        for other_word_id in others {
            self.domains.remove(config, slot_id, other_word_id);
        }

        let mut arcs: Vec<SlotArc> = config
            .neighbors(slot_id)
            .map(|neighbor| (neighbor, slot_id))
            .collect();

        // Entries can't repeat, so nothing else can take this word.
        for other_slot_id in 0..config.slot_count() {
            if other_slot_id == slot_id
                || self.assignment.is_assigned(other_slot_id)
                || !self.domains.remove(config, other_slot_id, word_id)
            {
                continue;
            }
            if self.domains.slot(other_slot_id).is_empty() {
                self.statistics.choice_arc_consistency_time += start.elapsed();
                return false;
            }
            arcs.extend(
                config
                    .neighbors(other_slot_id)
                    .map(|neighbor| (neighbor, other_slot_id)),
            );
        }

        let result = establish_arc_consistency(config, &mut self.domains, Some(arcs));
        self.statistics.choice_arc_consistency_time += start.elapsed();

        match result {
            Ok(success) => {
                self.statistics.eliminations += success.eliminations;
                if CHECK_INVARIANTS && !is_arc_consistent(config, &self.domains) {
                    panic!("Domains aren't arc-consistent after propagating a choice?");
                }
                true
            }
            Err(failure) => {
                log::trace!(
                    "choice wiped out slot {}",
                    config.slot_configs[failure.wiped_out_slot_id].slot_key()
                );
                false
            }
        }
    }

    fn backtrack(&mut self) -> Result<SearchOutcome, FillFailure> {
        if self.assignment.is_complete() {
            return Ok(SearchOutcome::Complete);
        }

        self.statistics.states += 1;
        if self.statistics.states % INTERRUPT_FREQUENCY == 0 {
            self.check_interrupts()?;
        }

        let config = self.config;
        let slot_id = self
            .variable_ordering
            .select_unassigned_variable(config, &self.domains, &self.assignment)
            .expect("No slot selected for an incomplete assignment?");

        let values = self.value_ordering.order_domain_values(
            config,
            &self.domains,
            &self.assignment,
            slot_id,
        );

        for word_id in values {
            if !is_consistent_with(config, &self.assignment, slot_id, word_id) {
                continue;
            }

            log::trace!(
                "trying {:?} for {}",
                config.word_list.get_word(word_id).normalized_string,
                config.slot_configs[slot_id].slot_key(),
            );

            self.assignment.assign(slot_id, word_id);
            if CHECK_INVARIANTS && !is_consistent(config, &self.assignment) {
                panic!("Inconsistent assignment accepted for slot {slot_id}?");
            }

            let checkpoint = self.domains.checkpoint();
            let viable =
                !self.options.maintain_arc_consistency || self.propagate_choice(slot_id, word_id);

            if viable {
                if let SearchOutcome::Complete = self.backtrack()? {
                    return Ok(SearchOutcome::Complete);
                }
            }

            self.domains.rollback(config, checkpoint);
            self.assignment.unassign(slot_id);
            self.statistics.backtracks += 1;

            log::trace!(
                "backtracking from {} (backtrack {})",
                config.slot_configs[slot_id].slot_key(),
                self.statistics.backtracks,
            );

            if let Some(max_backtracks) = self.options.max_backtracks {
                if self.statistics.backtracks > max_backtracks {
                    return Err(FillFailure::ExceededBacktrackLimit(
                        self.statistics.backtracks,
                    ));
                }
            }
        }

        Ok(SearchOutcome::Exhausted)
    }
}

/// Search for a valid fill for the given grid, if one can be found within the given amount of time,
/// using the default options and heuristics.
pub fn find_fill(
    config: &GridConfig,
    timeout: Option<Duration>,
) -> Result<FillSuccess, FillFailure> {
    find_fill_with_options(
        config,
        &FillOptions {
            timeout,
            ..FillOptions::default()
        },
    )
}

/// Search for a valid fill for the given grid using the default heuristics.
pub fn find_fill_with_options(
    config: &GridConfig,
    options: &FillOptions,
) -> Result<FillSuccess, FillFailure> {
    find_fill_with_heuristics(
        config,
        options,
        &MinimumRemainingValues,
        &LeastConstrainingValue,
    )
}

/// Search for a valid fill for the given grid, choosing slots and ordering their candidates with
/// the given heuristics. The result is deterministic for a given input as long as the heuristics
/// are.
pub fn find_fill_with_heuristics<V, O>(
    config: &GridConfig,
    options: &FillOptions,
    variable_ordering: &V,
    value_ordering: &O,
) -> Result<FillSuccess, FillFailure>
where
    V: VariableOrdering + ?Sized,
    O: ValueOrdering + ?Sized,
{
    let start = Instant::now();
    let mut statistics = Statistics::default();

    let mut domains = DomainStore::new(config);
    statistics.eliminations += domains.enforce_node_consistency(config);
    if domains.has_wipeout() {
        log::debug!("some slot has no candidates of the right length");
        return Err(FillFailure::Unsatisfiable);
    }

    // If we can't even establish initial arc consistency, we're obviously not going to be able to
    // find a fill.
    let initial_result = establish_arc_consistency(config, &mut domains, None);
    statistics.initial_arc_consistency_time = start.elapsed();
    match initial_result {
        Ok(success) => {
            log::debug!(
                "initial arc consistency removed {} candidates in {} revisions",
                success.eliminations,
                success.revisions,
            );
            statistics.eliminations += success.eliminations;
        }
        Err(failure) => {
            log::debug!(
                "initial arc consistency wiped out slot {}",
                config.slot_configs[failure.wiped_out_slot_id].slot_key()
            );
            return Err(FillFailure::Unsatisfiable);
        }
    }

    let mut search = Search {
        config,
        options,
        variable_ordering,
        value_ordering,
        // A timeout too large to represent as an `Instant` is no deadline at all.
        deadline: options.timeout.and_then(|timeout| start.checked_add(timeout)),
        domains,
        assignment: Assignment::new(config.slot_count()),
        statistics,
    };

    search.check_interrupts()?;
    let outcome = search.backtrack();
    search.statistics.total_time = start.elapsed();

    match outcome {
        Ok(SearchOutcome::Complete) => {
            log::debug!("found a fill: {}", search.statistics);
            Ok(FillSuccess {
                statistics: search.statistics,
                choices: search.assignment.to_choices(),
            })
        }
        Ok(SearchOutcome::Exhausted) => {
            log::debug!("no fill exists: {}", search.statistics);
            Err(FillFailure::Unsatisfiable)
        }
        Err(failure) => {
            log::debug!("search stopped ({failure}): {}", search.statistics);
            Err(failure)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::assignment::{is_consistent, Assignment};
    use crate::backtracking_search::{
        find_fill, find_fill_with_heuristics, find_fill_with_options, FillFailure, FillOptions,
        FillSuccess,
    };
    use crate::grid_config::tests::generate_config;
    use crate::grid_config::{
        generate_grid_config_from_template_string, render_grid, Choice, GridConfig,
    };
    use crate::heuristics::{
        DomainOrder, FirstUnassigned, LeastConstrainingValue, MinimumRemainingValues,
    };
    use crate::types::WordId;
    use crate::word_list::tests::resource_path;
    use crate::word_list::WordList;

    const SQUARE_TEMPLATE: &str = "
        ___
        _#_
        ___
    ";

    const SQUARE_WORDS: [&str; 8] = ["cab", "car", "bat", "rat", "cat", "bar", "dog", "house"];

    const CORNER_TEMPLATE: &str = "
        ___
        _##
        _##
    ";

    fn without_arc_consistency() -> FillOptions {
        FillOptions {
            maintain_arc_consistency: false,
            ..FillOptions::default()
        }
    }

    /// Check that a fill assigns every slot exactly once and satisfies every constraint.
    fn assert_valid_fill(config: &GridConfig, result: &FillSuccess) {
        assert_eq!(result.choices.len(), config.slot_count());
        for (slot_id, choice) in result.choices.iter().enumerate() {
            assert_eq!(choice.slot_id, slot_id);
        }
        let assignment = Assignment::from_choices(config.slot_count(), &result.choices);
        assert!(assignment.is_complete());
        assert!(is_consistent(config, &assignment));
    }

    /// Is there any complete, consistent assignment? Tries every combination of words.
    fn has_any_fill(config: &GridConfig) -> bool {
        fn extend(config: &GridConfig, assignment: &mut Assignment, slot_id: usize) -> bool {
            if slot_id == config.slot_count() {
                return is_consistent(config, assignment);
            }
            for word_id in 0..config.word_list.len() {
                assignment.assign(slot_id, word_id);
                if is_consistent(config, assignment) && extend(config, assignment, slot_id + 1) {
                    return true;
                }
                assignment.unassign(slot_id);
            }
            false
        }

        extend(config, &mut Assignment::new(config.slot_count()), 0)
    }

    #[test]
    fn test_find_fill_for_3x3_square() {
        let grid_config = generate_config(SQUARE_TEMPLATE, &SQUARE_WORDS);
        let config = grid_config.to_config_ref();

        let result = find_fill(&config, None).expect("Failed to find a fill");

        println!("{:?}", result.statistics);
        println!("{}", render_grid(&config, &result.choices));

        assert_valid_fill(&config, &result);

        // Top across "cab", bottom across "rat", left down "car", right down "bat".
        let words: Vec<WordId> = result.choices.iter().map(|choice| choice.word_id).collect();
        assert_eq!(words, vec![0, 3, 1, 2]);
        assert_eq!(render_grid(&config, &result.choices), "cab\na#a\nrat");
    }

    #[test]
    fn test_find_fill_for_3x3_square_without_maintaining_arc_consistency() {
        let grid_config = generate_config(SQUARE_TEMPLATE, &SQUARE_WORDS);
        let config = grid_config.to_config_ref();

        let result = find_fill_with_options(&config, &without_arc_consistency())
            .expect("Failed to find a fill");

        assert_valid_fill(&config, &result);
        assert_eq!(
            result.choices,
            vec![
                Choice {
                    slot_id: 0,
                    word_id: 0
                },
                Choice {
                    slot_id: 1,
                    word_id: 3
                },
                Choice {
                    slot_id: 2,
                    word_id: 1
                },
                Choice {
                    slot_id: 3,
                    word_id: 2
                },
            ]
        );
    }

    #[test]
    fn test_find_fill_from_resource_files() {
        let word_list = WordList::from_dict_file(resource_path("words0.txt"), None).unwrap();
        let template = std::fs::read_to_string(resource_path("structure0.txt")).unwrap();
        let grid_config = generate_grid_config_from_template_string(word_list, &template)
            .expect("invalid template");
        let config = grid_config.to_config_ref();

        let result = find_fill(&config, None).expect("Failed to find a fill");

        assert_eq!(render_grid(&config, &result.choices), "cab\na#a\nrat");
    }

    #[test]
    fn test_find_fill_is_deterministic() {
        let grid_config = generate_config(SQUARE_TEMPLATE, &SQUARE_WORDS);
        let config = grid_config.to_config_ref();

        let first = find_fill(&config, None).expect("Failed to find a fill");
        let second = find_fill(&config, None).expect("Failed to find a fill");

        assert_eq!(first.choices, second.choices);
    }

    #[test]
    fn test_letter_swap_at_crossing_is_inconsistent() {
        let grid_config = generate_config(SQUARE_TEMPLATE, &SQUARE_WORDS);
        let config = grid_config.to_config_ref();
        let result = find_fill(&config, None).expect("Failed to find a fill");

        // Replacing the left down entry "car" with "bar" breaks its crossing with "cab".
        let mut assignment = Assignment::from_choices(config.slot_count(), &result.choices);
        assignment.assign(2, 5);
        assert!(!is_consistent(&config, &assignment));
    }

    #[test]
    fn test_find_fill_with_prefilled_letter() {
        let grid_config = generate_config(
            "
            _B_
            ___
            ___
            ",
            &["abc", "def", "ghi", "adg", "beh", "cfi", "abd", "xyz", "ghz", "adc"],
        );
        let config = grid_config.to_config_ref();

        for options in [FillOptions::default(), without_arc_consistency()] {
            let result = find_fill_with_options(&config, &options).expect("Failed to find a fill");

            assert_valid_fill(&config, &result);
            assert_eq!(render_grid(&config, &result.choices), "abc\ndef\nghi");
        }
    }

    #[test]
    fn test_fill_fails_gracefully() {
        let grid_config = generate_config(
            "
            ___
            #_#
            #_#
            ",
            &["abc", "xyz"],
        );
        let config = grid_config.to_config_ref();

        for options in [FillOptions::default(), without_arc_consistency()] {
            let failure = find_fill_with_options(&config, &options).unwrap_err();
            assert_eq!(failure, FillFailure::Unsatisfiable);
            assert!(failure.is_definitive());
        }
    }

    #[test]
    fn test_words_cant_be_reused() {
        // Each word agrees with itself in the shared corner, but no two different words do.
        let grid_config = generate_config(CORNER_TEMPLATE, &["abc", "xyz"]);
        let config = grid_config.to_config_ref();

        for options in [FillOptions::default(), without_arc_consistency()] {
            assert_eq!(
                find_fill_with_options(&config, &options).unwrap_err(),
                FillFailure::Unsatisfiable
            );
        }
    }

    #[test]
    fn test_reuse_is_avoided_when_possible() {
        let grid_config = generate_config(CORNER_TEMPLATE, &["abc", "axe"]);
        let config = grid_config.to_config_ref();

        for options in [FillOptions::default(), without_arc_consistency()] {
            let result = find_fill_with_options(&config, &options).expect("Failed to find a fill");

            assert_valid_fill(&config, &result);
            assert_eq!(result.choices[0].word_id, 0);
            assert_eq!(result.choices[1].word_id, 1);
        }
    }

    #[test]
    fn test_empty_word_list() {
        let grid_config = generate_config(SQUARE_TEMPLATE, &[]);

        assert_eq!(
            find_fill(&grid_config.to_config_ref(), None).unwrap_err(),
            FillFailure::Unsatisfiable
        );
    }

    #[test]
    fn test_grid_without_slots() {
        let grid_config = generate_config("##", &["ab"]);

        let result = find_fill(&grid_config.to_config_ref(), None).expect("Failed to find a fill");
        assert!(result.choices.is_empty());
    }

    #[test]
    fn test_backtrack_limit() {
        let grid_config = generate_config(CORNER_TEMPLATE, &["abc", "xyz"]);
        let config = grid_config.to_config_ref();

        for maintain_arc_consistency in [true, false] {
            let failure = find_fill_with_options(
                &config,
                &FillOptions {
                    maintain_arc_consistency,
                    max_backtracks: Some(0),
                    timeout: None,
                },
            )
            .unwrap_err();

            assert_eq!(failure, FillFailure::ExceededBacktrackLimit(1));
            assert!(!failure.is_definitive());
        }
    }

    #[test]
    fn test_timeout() {
        let grid_config = generate_config(SQUARE_TEMPLATE, &SQUARE_WORDS);

        assert_eq!(
            find_fill(&grid_config.to_config_ref(), Some(Duration::ZERO)).unwrap_err(),
            FillFailure::Timeout
        );
    }

    #[test]
    fn test_huge_timeout_is_unbounded() {
        let grid_config = generate_config(SQUARE_TEMPLATE, &SQUARE_WORDS);
        let config = grid_config.to_config_ref();

        let result = find_fill(&config, Some(Duration::from_secs(u64::MAX)))
            .expect("Failed to find a fill");

        assert_eq!(render_grid(&config, &result.choices), "cab\na#a\nrat");
    }

    #[test]
    fn test_abort() {
        let mut grid_config = generate_config(SQUARE_TEMPLATE, &SQUARE_WORDS);
        grid_config.abort = Some(Arc::new(AtomicBool::new(true)));

        assert_eq!(
            find_fill(&grid_config.to_config_ref(), None).unwrap_err(),
            FillFailure::Abort
        );
    }

    #[test]
    fn test_find_fill_with_simple_heuristics() {
        let grid_config = generate_config(SQUARE_TEMPLATE, &SQUARE_WORDS);
        let config = grid_config.to_config_ref();

        for options in [FillOptions::default(), without_arc_consistency()] {
            let result =
                find_fill_with_heuristics(&config, &options, &FirstUnassigned, &DomainOrder)
                    .expect("Failed to find a fill");
            assert_valid_fill(&config, &result);
        }
    }

    #[test]
    fn test_find_fill_matches_exhaustive_search() {
        let vocabularies: [&[&str]; 5] = [
            &["ab", "cd", "ac", "bd"],
            &["ab", "ba"],
            &["aa", "ab", "ba", "bb"],
            &["no", "on", "of", "fo", "nn", "oo"],
            &["it", "to", "at", "ta", "ti", "ai"],
        ];

        for words in vocabularies {
            let grid_config = generate_config(
                "
                __
                __
                ",
                words,
            );
            let config = grid_config.to_config_ref();
            let expected = has_any_fill(&config);

            for options in [FillOptions::default(), without_arc_consistency()] {
                let default_result = find_fill_with_options(&config, &options);
                let simple_result = find_fill_with_heuristics(
                    &config,
                    &options,
                    &FirstUnassigned,
                    &DomainOrder,
                );
                let mixed_result = find_fill_with_heuristics(
                    &config,
                    &options,
                    &MinimumRemainingValues,
                    &LeastConstrainingValue,
                );

                for result in [default_result, simple_result, mixed_result] {
                    match result {
                        Ok(result) => {
                            assert!(expected, "found a fill for {words:?} that shouldn't exist");
                            assert_valid_fill(&config, &result);
                        }
                        Err(failure) => {
                            assert!(!expected, "missed a fill for {words:?}");
                            assert_eq!(failure, FillFailure::Unsatisfiable);
                        }
                    }
                }
            }
        }
    }
}

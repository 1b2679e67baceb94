//! This module implements the puzzle model: the slots in a grid, their lengths and directions, and
//! the overlap relation between slots that share a cell. It's independent of the specific fill
//! algorithm, and everything in it is read-only once a grid has been configured.

use std::collections::HashMap;
use std::fmt::Debug;
use std::iter;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::WordId;
use crate::word_list::WordList;

/// An identifier for the intersection between two slots; these correspond one-to-one with checked
/// squares in the grid.
pub type CrossingId = usize;

/// An identifier for a given slot, based on its index in the `GridConfig`'s `slot_configs` field.
pub type SlotId = usize;

/// Zero-indexed row and column of a cell, where row 0 is the top row.
pub type GridCoord = (usize, usize);

/// The direction that a slot is facing.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    Across,
    Down,
}

/// Problems with a grid description, detected before any solving happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid must have at least one row")]
    EmptyGrid,

    /// `row` and `col` are zero-based positions in the template text as written, counting blank
    /// lines and indentation.
    #[error("invalid character {ch:?} at row {row}, column {col}")]
    InvalidCell { row: usize, col: usize, ch: char },

    #[error("slot {0} has zero length")]
    ZeroLengthSlot(String),

    #[error("slot {0} extends outside the grid")]
    SlotOutOfBounds(String),

    #[error("slot {0} appears more than once")]
    DuplicateSlot(String),

    #[error("more than two slots share the cell at row {row}, column {col}")]
    TooManySlotsInCell { row: usize, col: usize },

    #[error("slots {0} and {1} cross more than once")]
    MultipleOverlaps(SlotId, SlotId),

    #[error("overlap between slots {0} and {1} is outside the slots' bounds")]
    OverlapOutOfRange(SlotId, SlotId),

    #[error("invalid slot key: {0:?}")]
    InvalidSlotKey(String),
}

/// A struct representing a crossing between one slot and another, referencing the other slot's id
/// and the location of the intersection within the other slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crossing {
    pub other_slot_id: SlotId,
    pub other_slot_cell: usize,
    pub crossing_id: CrossingId,
}

/// A struct representing the aspects of a slot in the grid that are static during filling.
#[derive(Debug, Clone)]
pub struct SlotConfig {
    pub id: SlotId,
    pub start_cell: GridCoord,
    pub direction: Direction,
    pub length: usize,

    /// For each cell of the slot, the slot crossing it there (if any).
    pub crossings: Vec<Option<Crossing>>,
}

impl SlotConfig {
    /// Generate the coords for each cell of this slot.
    #[must_use]
    pub fn cell_coords(&self) -> Vec<GridCoord> {
        self.slot_spec().cell_coords()
    }

    /// Generate the indices of this slot's cells in a flat array like `GridConfig.fill`.
    #[must_use]
    pub fn cell_fill_indices(&self, grid_width: usize) -> Vec<usize> {
        self.cell_coords()
            .iter()
            .map(|&(row, col)| row * grid_width + col)
            .collect()
    }

    /// Get the values of this slot's cells in a flat fill array like `GridConfig.fill`.
    #[must_use]
    pub fn fill(&self, fill: &[Option<char>], grid_width: usize) -> Vec<Option<char>> {
        self.cell_fill_indices(grid_width)
            .iter()
            .map(|&idx| fill[idx])
            .collect()
    }

    /// Generate a `SlotSpec` identifying this slot.
    #[must_use]
    pub fn slot_spec(&self) -> SlotSpec {
        SlotSpec {
            start_cell: self.start_cell,
            direction: self.direction,
            length: self.length,
        }
    }

    /// Generate a string key identifying this slot.
    #[must_use]
    pub fn slot_key(&self) -> String {
        self.slot_spec().to_key()
    }
}

/// The overlap relation between slots. Each intersecting pair is stored once, under its canonical
/// `(lower id, higher id)` key, and lookups in the other direction swap the cell indices.
#[derive(Debug, Clone, Default)]
pub struct OverlapMap {
    overlaps: HashMap<(SlotId, SlotId), (usize, usize)>,
}

impl OverlapMap {
    /// Build the overlap map from the crossings recorded in each slot config, checking that every
    /// pair of slots crosses at most once and that each crossing is within both slots' bounds.
    pub fn from_slot_configs(slot_configs: &[SlotConfig]) -> Result<OverlapMap, GridError> {
        let mut overlaps = HashMap::new();

        for slot_config in slot_configs {
            if slot_config.crossings.len() != slot_config.length {
                return Err(GridError::OverlapOutOfRange(slot_config.id, slot_config.id));
            }

            for (cell_idx, crossing) in slot_config.crossings.iter().enumerate() {
                let Some(crossing) = crossing else {
                    continue;
                };

                let (a, b) = (slot_config.id, crossing.other_slot_id);
                let other_length = slot_configs.get(b).map_or(0, |other| other.length);
                if a == b || crossing.other_slot_cell >= other_length {
                    return Err(GridError::OverlapOutOfRange(a, b));
                }

                let (key, cells) = if a < b {
                    ((a, b), (cell_idx, crossing.other_slot_cell))
                } else {
                    ((b, a), (crossing.other_slot_cell, cell_idx))
                };

                match overlaps.get(&key) {
                    // We see every crossing once from each side, and both sides have to agree.
                    Some(&existing) if existing == cells && a > b => {}
                    Some(_) => return Err(GridError::MultipleOverlaps(key.0, key.1)),
                    None => {
                        overlaps.insert(key, cells);
                    }
                }
            }
        }

        Ok(OverlapMap { overlaps })
    }

    /// The `(i, j)` pair such that character `i` of `a`'s word must equal character `j` of `b`'s
    /// word, or `None` if the slots don't intersect.
    #[must_use]
    pub fn get(&self, a: SlotId, b: SlotId) -> Option<(usize, usize)> {
        if a < b {
            self.overlaps.get(&(a, b)).copied()
        } else {
            self.overlaps.get(&(b, a)).map(|&(j, i)| (i, j))
        }
    }

    /// The number of intersecting (unordered) pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.overlaps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.overlaps.is_empty()
    }
}

/// A struct holding references to all of the information needed as input to a crossword filling
/// operation.
#[derive(Clone)]
pub struct GridConfig<'a> {
    /// The word list used to fill the grid; see `word_list.rs`. Every slot's domain starts out as
    /// the whole list.
    pub word_list: &'a WordList,

    /// A flat array of letters filled into the grid, in order of row and then column. `None` can
    /// represent a block or an unfilled cell.
    pub fill: &'a [Option<char>],

    /// A flat array, parallel to `fill`, recording which cells are blocks.
    pub blocks: &'a [bool],

    /// Config representing all of the slots in the grid and their crossings.
    pub slot_configs: &'a [SlotConfig],

    /// The overlap relation derived from `slot_configs`.
    pub overlaps: &'a OverlapMap,

    /// The width and height of the grid.
    pub width: usize,
    pub height: usize,

    /// The number of distinct crossings represented in all of the `slot_configs`.
    pub crossing_count: usize,

    /// An optional atomic flag that can be set to signal that the fill operation should be canceled.
    pub abort: Option<&'a AtomicBool>,
}

impl GridConfig<'_> {
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slot_configs.len()
    }

    /// The slots that share a cell with the given slot.
    pub fn neighbors(&self, slot_id: SlotId) -> impl Iterator<Item = SlotId> + '_ {
        self.slot_configs[slot_id]
            .crossings
            .iter()
            .flatten()
            .map(|crossing| crossing.other_slot_id)
    }

    /// The number of slots that share a cell with the given slot.
    #[must_use]
    pub fn degree(&self, slot_id: SlotId) -> usize {
        self.slot_configs[slot_id].crossings.iter().flatten().count()
    }

    /// See `OverlapMap::get`.
    #[must_use]
    pub fn overlap(&self, a: SlotId, b: SlotId) -> Option<(usize, usize)> {
        self.overlaps.get(a, b)
    }
}

/// A struct that owns a copy of each piece of information needed by `GridConfig`.
pub struct OwnedGridConfig {
    pub word_list: WordList,
    pub fill: Vec<Option<char>>,
    pub blocks: Vec<bool>,
    pub slot_configs: Vec<SlotConfig>,
    pub overlaps: OverlapMap,
    pub width: usize,
    pub height: usize,
    pub crossing_count: usize,
    pub abort: Option<Arc<AtomicBool>>,
}

impl OwnedGridConfig {
    #[must_use]
    pub fn to_config_ref(&self) -> GridConfig {
        GridConfig {
            word_list: &self.word_list,
            fill: &self.fill,
            blocks: &self.blocks,
            slot_configs: &self.slot_configs,
            overlaps: &self.overlaps,
            width: self.width,
            height: self.height,
            crossing_count: self.crossing_count,
            abort: self.abort.as_deref(),
        }
    }

    /// Find the id of the slot matching the given key, like "0,2,down,3".
    pub fn slot_id_for_key(&self, key: &str) -> Result<SlotId, GridError> {
        let spec = SlotSpec::from_key(key)?;
        self.slot_configs
            .iter()
            .find(|slot_config| spec.matches_slot(slot_config))
            .map(|slot_config| slot_config.id)
            .ok_or_else(|| GridError::InvalidSlotKey(key.to_string()))
    }
}

/// A struct identifying a specific slot in the grid.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct SlotSpec {
    pub start_cell: GridCoord,
    pub direction: Direction,
    pub length: usize,
}

impl SlotSpec {
    /// Parse a string like "1,2,down,5" (row, column, direction, length) into a `SlotSpec`.
    pub fn from_key(key: &str) -> Result<SlotSpec, GridError> {
        let key_parts: Vec<&str> = key.split(',').map(str::trim).collect();
        if key_parts.len() != 4 {
            return Err(GridError::InvalidSlotKey(key.to_string()));
        }

        let row: Result<usize, _> = key_parts[0].parse();
        let col: Result<usize, _> = key_parts[1].parse();
        let direction: Option<Direction> = match key_parts[2] {
            "across" => Some(Direction::Across),
            "down" => Some(Direction::Down),
            _ => None,
        };
        let length: Result<usize, _> = key_parts[3].parse();

        if let (Ok(row), Ok(col), Some(direction), Ok(length)) = (row, col, direction, length) {
            Ok(SlotSpec {
                start_cell: (row, col),
                direction,
                length,
            })
        } else {
            Err(GridError::InvalidSlotKey(key.to_string()))
        }
    }

    /// Represent this slot as a string like "1,2,down,5".
    #[must_use]
    pub fn to_key(&self) -> String {
        let direction = match self.direction {
            Direction::Across => "across",
            Direction::Down => "down",
        };
        format!(
            "{},{},{},{}",
            self.start_cell.0, self.start_cell.1, direction, self.length,
        )
    }

    /// Does this spec match the given slot config?
    #[must_use]
    pub fn matches_slot(&self, slot: &SlotConfig) -> bool {
        self.start_cell == slot.start_cell
            && self.direction == slot.direction
            && self.length == slot.length
    }

    /// Generate the coords for each cell of this entry.
    #[must_use]
    pub fn cell_coords(&self) -> Vec<GridCoord> {
        let (row, col) = self.start_cell;
        (0..self.length)
            .map(|cell_idx| match self.direction {
                Direction::Across => (row, col + cell_idx),
                Direction::Down => (row + cell_idx, col),
            })
            .collect()
    }
}

/// Serialize a `SlotSpec` into a string key.
#[cfg(feature = "serde")]
impl Serialize for SlotSpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_key())
    }
}

/// Deserialize a `SlotSpec` from a string key.
#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for SlotSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw_string = String::deserialize(deserializer)?;
        SlotSpec::from_key(&raw_string).map_err(serde::de::Error::custom)
    }
}

/// Given `SlotSpec` structs specifying the positions of the slots in a grid, generate
/// `SlotConfig`s containing derived information about crossings, along with the number of
/// distinct crossings.
pub fn generate_slot_configs(entries: &[SlotSpec]) -> Result<(Vec<SlotConfig>, usize), GridError> {
    // Build a map from cell location to entries involved, which we can then use to calculate
    // crossings.
    let mut entries_by_loc: HashMap<GridCoord, Vec<(SlotId, usize)>> = HashMap::new();

    for (entry_idx, entry) in entries.iter().enumerate() {
        if entry.length == 0 {
            return Err(GridError::ZeroLengthSlot(entry.to_key()));
        }
        if entries[..entry_idx].iter().any(|earlier| {
            earlier.start_cell == entry.start_cell && earlier.direction == entry.direction
        }) {
            return Err(GridError::DuplicateSlot(entry.to_key()));
        }

        for (cell_idx, loc) in entry.cell_coords().into_iter().enumerate() {
            let cell_entries = entries_by_loc.entry(loc).or_default();
            cell_entries.push((entry_idx, cell_idx));
            if cell_entries.len() > 2 {
                return Err(GridError::TooManySlotsInCell {
                    row: loc.0,
                    col: loc.1,
                });
            }
        }
    }

    // Each crossing gets an id the first time we see it; the other slot involved will find it in
    // this map when we get to it.
    let mut crossing_ids: HashMap<(SlotId, SlotId), CrossingId> = HashMap::new();
    let mut slot_configs: Vec<SlotConfig> = Vec::with_capacity(entries.len());

    for (entry_idx, entry) in entries.iter().enumerate() {
        let crossings: Vec<Option<Crossing>> = entry
            .cell_coords()
            .iter()
            .map(|loc| {
                let &(other_slot_id, other_slot_cell) = entries_by_loc[loc]
                    .iter()
                    .find(|&&(other_entry_idx, _)| other_entry_idx != entry_idx)?;

                let key = (entry_idx.min(other_slot_id), entry_idx.max(other_slot_id));
                let next_id = crossing_ids.len();
                let crossing_id = *crossing_ids.entry(key).or_insert(next_id);

                Some(Crossing {
                    other_slot_id,
                    other_slot_cell,
                    crossing_id,
                })
            })
            .collect();

        slot_configs.push(SlotConfig {
            id: entry_idx,
            start_cell: entry.start_cell,
            direction: entry.direction,
            length: entry.length,
            crossings,
        });
    }

    Ok((slot_configs, crossing_ids.len()))
}

/// Generate an `OwnedGridConfig` representing a grid with specified entries. `fill` holds the
/// pre-filled letter (if any) for each cell, in row-major order; any cell not covered by an entry
/// is treated as a block.
pub fn generate_grid_config(
    word_list: WordList,
    entries: &[SlotSpec],
    mut fill: Vec<Option<char>>,
    width: usize,
    height: usize,
) -> Result<OwnedGridConfig, GridError> {
    if height == 0 || width == 0 {
        return Err(GridError::EmptyGrid);
    }

    for entry in entries {
        let in_bounds = entry
            .cell_coords()
            .iter()
            .all(|&(row, col)| row < height && col < width);
        if !in_bounds {
            return Err(GridError::SlotOutOfBounds(entry.to_key()));
        }
    }

    let (slot_configs, crossing_count) = generate_slot_configs(entries)?;
    let overlaps = OverlapMap::from_slot_configs(&slot_configs)?;

    let mut blocks = vec![true; width * height];
    for slot_config in &slot_configs {
        for idx in slot_config.cell_fill_indices(width) {
            blocks[idx] = false;
        }
    }

    fill.resize(width * height, None);
    let fill = fill
        .into_iter()
        .map(|cell| cell.and_then(|ch| ch.to_lowercase().next()))
        .collect();

    log::debug!(
        "configured {}x{} grid with {} slots and {} crossings",
        width,
        height,
        slot_configs.len(),
        crossing_count,
    );

    Ok(OwnedGridConfig {
        word_list,
        fill,
        blocks,
        slot_configs,
        overlaps,
        width,
        height,
        crossing_count,
        abort: None,
    })
}

/// A single cell of a parsed template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TemplateCell {
    Block,
    Open(Option<char>),
}

/// Parse a template string into rows of cells. `_` and `.` are empty cells, `#` and `█` are
/// blocks, and letters represent themselves. Leading and trailing whitespace on each line is
/// ignored, as are blank lines; short rows are padded out with blocks.
fn parse_template(template: &str) -> Result<Vec<Vec<TemplateCell>>, GridError> {
    let mut rows: Vec<Vec<TemplateCell>> = template
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(row, line)| {
            let indent = line.chars().take_while(|ch| ch.is_whitespace()).count();

            line.trim()
                .chars()
                .enumerate()
                .map(|(col, ch)| match ch {
                    '_' | '.' => Ok(TemplateCell::Open(None)),
                    '#' | '\u{2588}' => Ok(TemplateCell::Block),
                    ch if ch.is_alphanumeric() => Ok(TemplateCell::Open(Some(ch))),
                    ch => Err(GridError::InvalidCell {
                        row,
                        col: indent + col,
                        ch,
                    }),
                })
                .collect::<Result<Vec<TemplateCell>, GridError>>()
        })
        .collect::<Result<_, _>>()?;

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return Err(GridError::EmptyGrid);
    }
    for row in &mut rows {
        row.resize(width, TemplateCell::Block);
    }

    Ok(rows)
}

/// Generate a list of `SlotSpec`s from parsed template rows: every maximal run of two or more open
/// cells is a slot. Across slots come first, in reading order, followed by down slots.
fn generate_slots_from_template(template: &[Vec<TemplateCell>]) -> Vec<SlotSpec> {
    fn build_runs(lines: &[Vec<TemplateCell>]) -> Vec<(usize, usize, usize)> {
        let mut result = vec![];

        for (line_idx, line) in lines.iter().enumerate() {
            let mut run_start: Option<usize> = None;

            for (idx, &cell) in line.iter().chain(iter::once(&TemplateCell::Block)).enumerate() {
                match (cell, run_start) {
                    (TemplateCell::Open(_), None) => run_start = Some(idx),
                    (TemplateCell::Block, Some(start)) => {
                        if idx - start > 1 {
                            result.push((line_idx, start, idx - start));
                        }
                        run_start = None;
                    }
                    _ => {}
                }
            }
        }

        result
    }

    let mut slot_specs: Vec<SlotSpec> = build_runs(template)
        .into_iter()
        .map(|(row, col, length)| SlotSpec {
            start_cell: (row, col),
            direction: Direction::Across,
            length,
        })
        .collect();

    let transposed: Vec<Vec<TemplateCell>> = (0..template[0].len())
        .map(|col| template.iter().map(|line| line[col]).collect())
        .collect();

    let mut down_specs: Vec<SlotSpec> = build_runs(&transposed)
        .into_iter()
        .map(|(col, row, length)| SlotSpec {
            start_cell: (row, col),
            direction: Direction::Down,
            length,
        })
        .collect();
    down_specs.sort_by_key(|spec| spec.start_cell);
    slot_specs.extend(down_specs);

    slot_specs
}

/// Generate a list of `SlotSpec`s from a template string (see `parse_template` for the format).
pub fn generate_slots_from_template_string(template: &str) -> Result<Vec<SlotSpec>, GridError> {
    Ok(generate_slots_from_template(&parse_template(template)?))
}

/// Generate an `OwnedGridConfig` from a template string with `_` or `.` representing empty cells,
/// `#` representing blocks, and letters representing themselves.
pub fn generate_grid_config_from_template_string(
    word_list: WordList,
    template: &str,
) -> Result<OwnedGridConfig, GridError> {
    let rows = parse_template(template)?;
    let slot_specs = generate_slots_from_template(&rows);

    let width = rows[0].len();
    let height = rows.len();
    let fill: Vec<Option<char>> = rows
        .iter()
        .flatten()
        .map(|cell| match cell {
            TemplateCell::Open(letter) => *letter,
            TemplateCell::Block => None,
        })
        .collect();

    let mut config = generate_grid_config(word_list, &slot_specs, fill, width, height)?;

    // Open cells that aren't part of any slot are still open, even though nothing constrains them.
    for (idx, cell) in rows.iter().flatten().enumerate() {
        if matches!(cell, TemplateCell::Open(_)) {
            config.blocks[idx] = false;
        }
    }

    Ok(config)
}

/// A struct recording a slot assignment made during a fill process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub slot_id: SlotId,
    pub word_id: WordId,
}

/// Turn the given grid config and fill choices into a rendered string, with blocks shown as `#`
/// and unfilled cells as `.`.
#[must_use]
pub fn render_grid(config: &GridConfig, choices: &[Choice]) -> String {
    let mut grid: Vec<char> = config
        .fill
        .iter()
        .zip(config.blocks)
        .map(|(&cell, &is_block)| if is_block { '#' } else { cell.unwrap_or('.') })
        .collect();

    for &Choice { slot_id, word_id } in choices {
        let slot_config = &config.slot_configs[slot_id];
        let word = config.word_list.get_word(word_id);

        for (idx, &glyph) in slot_config
            .cell_fill_indices(config.width)
            .iter()
            .zip(&word.glyphs)
        {
            grid[*idx] = config.word_list.glyphs[glyph];
        }
    }

    grid.chunks(config.width)
        .map(|line| line.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

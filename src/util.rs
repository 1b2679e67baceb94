use smallvec::SmallVec;

use crate::types::WordId;
use crate::word_list::WordList;
use crate::MAX_GLYPH_COUNT;

/// Structure tracking, for each cell of a slot, how many of the slot's candidate words have each
/// glyph in that cell. Indexed as `counts[cell_idx][glyph_id]`.
pub type GlyphCountsByCell = Vec<SmallVec<[u32; MAX_GLYPH_COUNT]>>;

/// Initialize the `glyph_counts_by_cell` structure for a slot. Words that are shorter than the
/// slot only contribute to the cells they cover, and letters beyond the slot's length are
/// ignored, so this is well-defined even before node consistency has been enforced.
#[must_use]
pub fn build_glyph_counts_by_cell(
    word_list: &WordList,
    slot_length: usize,
    options: &[WordId],
) -> GlyphCountsByCell {
    let mut result: GlyphCountsByCell = (0..slot_length)
        .map(|_| (0..word_list.glyphs.len()).map(|_| 0).collect())
        .collect();

    for &word_id in options {
        let word = &word_list.words[word_id];
        for (cell_idx, &glyph) in word.glyphs.iter().take(slot_length).enumerate() {
            result[cell_idx][glyph] += 1;
        }
    }

    result
}

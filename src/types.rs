/// An identifier for a given letter or symbol, based on its index in the `WordList`'s `glyphs`
/// field.
pub type GlyphId = usize;

/// An identifier for a given word, based on its index in the `WordList`'s `words` field. Every
/// slot's domain is drawn from the same flat list, so a `WordId` means the same word everywhere.
pub type WordId = usize;

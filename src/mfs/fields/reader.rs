use super::macros::impl_read_field;

/// Read-only view over a serialized on-flash structure.
pub struct FieldReader<'a>(&'a [u8]);

impl<'a> FieldReader<'a> {
    #[inline]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self(bytes)
    }

    /// Returns true if each of the first `words` 32-bit little-endian
    /// words equals `word`.
    ///
    /// # Panics
    /// Panics if `words * 4` exceeds the viewed length.
    #[inline]
    pub fn words_equal(&self, words: usize, word: u32) -> bool {
        self.0[..words * 4]
            .chunks_exact(4)
            .all(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]) == word)
    }

    impl_read_field!(u16, 2);
    impl_read_field!(u32, 4);
}

/// Generates a little-endian read accessor for one integer type.
macro_rules! impl_read_field {
    ($type:ty, $size:literal) => {
        paste::paste! {
            #[doc = "Reads a little-endian `" $type "` at the given offset."]
            #[doc = ""]
            #[doc = "# Panics"]
            #[doc = "Panics if `offset + " $size "` exceeds the viewed length."]
            #[inline]
            pub fn [<read_ $type _at>](&self, offset: usize) -> $type {
                assert!(
                    offset + $size <= self.0.len(),
                    "field read out of bounds: offset {} + size {} > len {}",
                    offset, $size, self.0.len()
                );
                let mut raw = [0u8; $size];
                raw.copy_from_slice(&self.0[offset..offset + $size]);
                <$type>::from_le_bytes(raw)
            }
        }
    };
}

/// Generates a little-endian write accessor for one integer type.
macro_rules! impl_write_field {
    ($type:ty, $size:literal) => {
        paste::paste! {
            #[doc = "Writes a little-endian `" $type "` at the given offset."]
            #[doc = ""]
            #[doc = "# Panics"]
            #[doc = "Panics if `offset + " $size "` exceeds the viewed length."]
            #[inline]
            pub fn [<write_ $type _at>](&mut self, offset: usize, value: $type) {
                assert!(
                    offset + $size <= self.0.len(),
                    "field write out of bounds: offset {} + size {} > len {}",
                    offset, $size, self.0.len()
                );
                self.0[offset..offset + $size].copy_from_slice(&value.to_le_bytes());
            }
        }
    };
}

pub(super) use impl_read_field;
pub(super) use impl_write_field;

use super::macros::impl_write_field;

/// Write view used to serialize on-flash structures.
#[derive(Debug)]
pub struct FieldWriter<'a>(&'a mut [u8]);

impl<'a> FieldWriter<'a> {
    #[inline]
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self(bytes)
    }

    impl_write_field!(u16, 2);
    impl_write_field!(u32, 4);
}

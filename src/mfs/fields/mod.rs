//! Little-endian field accessors for the on-flash headers.

mod macros;
mod reader;
mod writer;

pub use reader::FieldReader;
pub use writer::FieldWriter;

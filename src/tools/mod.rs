//! Building blocks shared by the codecs

pub mod bit_cursor;
pub mod ring_buffer;

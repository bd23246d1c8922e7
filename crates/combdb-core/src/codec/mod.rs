//! Order-preserving byte codecs.
//!
//! Everything in here is pure: bytes in, bytes out. The invariant shared by
//! every encoder is that unsigned lexicographic comparison of the output
//! matches the logical comparison of the input.

pub mod decimal;
pub mod parse;
pub mod value;
pub mod varint;

pub use parse::{ParseError, parse_field};
pub use value::{SortOrder, ValueEncodeError, decode_value, encode_value, encoded_width};
pub use varint::VarintError;

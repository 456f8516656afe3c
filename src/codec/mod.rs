pub mod adts;
pub mod framing;

pub use adts::{AdtsHeader, ADTS_HEADER_LEN};
pub use framing::{decode_frame, decode_length, encode_frame, BitLengthCodec, HEADER_LEN};

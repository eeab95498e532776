mod detect;
mod inflate;

pub use detect::{classify_payload, PayloadKind, MAGIC_PREFIXES, PLACEMENT_MARKERS};
pub use inflate::{
    decode_level_string, encode_level_string, DecodeConfig, DecodeError, Decompressor,
    EncodeError,
};

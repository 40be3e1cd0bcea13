//! Decoder for GIF87a/89a animations.
//!
//! Takes a complete in-memory byte buffer and produces the sequence of fully
//! composited frames, each an RGBA buffer at logical-screen size together
//! with its display delay. Frames are decoded lazily, one per iterator step.

mod parser;

pub use parser::{
    decode, probe_size, DecodeError, Decoder, DisposalMethod, Frame, LoopCount,
    SpecialPurposeExtension, Version,
};

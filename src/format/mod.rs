//! PCM format conversion.
//!
//! Lossless conversion between interleaved integer PCM byte buffers and
//! per-channel normalized `f32` sample vectors. This is the only place in
//! the crate that touches raw sample bytes.

mod codec;

pub use codec::{decode_pcm, encode_pcm};

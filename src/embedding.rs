//! Default embedding function for the Vector Store (spec §4.6: "computes
//! embedding via a pluggable embedding function"). No ML embedding model
//! ships in this stack, so the default is a deterministic hashing-trick
//! bag-of-words vector — stable across process restarts, same dimension
//! every call, good enough for the lexical-ish similarity this spec's
//! retrieval tests exercise. A deployment with a real embedding model
//! swaps this out by constructing its own `EmbedFn` in `main.rs`.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::errors::AppError;
use crate::memory::manager::EmbedFn;

/// Hash each lowercased token into one of `dim` buckets, sign the bucket
/// by a second hash bit, then L2-normalize. Deterministic, pure,
/// dependency-free beyond the `sha2` already in the stack.
pub fn hashing_embed(text: &str, dim: usize) -> Vec<f32> {
    let mut vector = vec![0f32; dim];
    for token in text.split_whitespace() {
        let normalized = token.to_lowercase();
        let digest = Sha256::digest(normalized.as_bytes());
        let bucket = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize % dim;
        let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
    vector
}

pub fn hashing_embed_fn(dim: usize) -> EmbedFn {
    Arc::new(move |text: String| {
        Box::pin(async move { Ok::<Vec<f32>, AppError>(hashing_embed(&text, dim)) })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_yields_same_embedding() {
        let a = hashing_embed("the sky is blue", 64);
        let b = hashing_embed("the sky is blue", 64);
        assert_eq!(a, b);
    }

    #[test]
    fn embedding_has_configured_dimension() {
        let v = hashing_embed("hello world", 128);
        assert_eq!(v.len(), 128);
    }

    #[test]
    fn embedding_is_unit_normalized() {
        let v = hashing_embed("some non-empty text here", 32);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }
}

//! XOR-based 2-of-2 secret sharing.
//!
//! `split` draws the first share from the injected [`Entropy`] and derives the
//! second one as `secret XOR share_a`. Either share on its own is a uniformly
//! random string and reveals nothing about the secret, as long as `share_a`
//! is never reused.

use zeroize::Zeroizing;

use super::rng::Entropy;
use crate::error::{Result, WovenError};

/// Split `secret` into two shares of the same length.
pub fn split(
    secret: &[u8],
    entropy: &Entropy,
) -> Result<(Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>)> {
    let mut share_a = Zeroizing::new(vec![0u8; secret.len()]);
    entropy.fill(&mut share_a)?;

    let share_b = xor(secret, &share_a)?;
    Ok((share_a, share_b))
}

/// Recombine two shares produced by [`split`].
pub fn reconstruct(share_a: &[u8], share_b: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    xor(share_a, share_b)
}

fn xor(left: &[u8], right: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if left.len() != right.len() {
        return Err(WovenError::LengthMismatch {
            left: left.len(),
            right: right.len(),
        });
    }

    Ok(Zeroizing::new(
        left.iter().zip(right).map(|(l, r)| l ^ r).collect(),
    ))
}

//! Blind-signature primitives (hash-to-curve, blind/unblind).
//!
//! Grounded on the Diffie-Hellman key exchange scheme Cashu uses for its
//! blind signatures: the mint never sees a proof's secret, only a blinded
//! commitment to it.

use k256::{AffinePoint, ProjectivePoint, PublicKey, Scalar};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::keys::SecretKey as WrappedSecretKey;

const DOMAIN_SEPARATOR: &[u8; 28] = b"Secp256k1_HashToCurve_Cashu_";
const MAX_ITERATIONS: u32 = 1_000_000;

/// Deterministically map an arbitrary message to a point on the curve with
/// unknown discrete log.
///
/// `h0 = SHA256(DOMAIN_SEPARATOR || m)`. For counters `c = 0, 1, …`
/// (little-endian 4-byte), attempt to decode `SHA256(h0 || c)` as the x-only
/// part of a compressed point under prefix `0x02`, then `0x03`; the first
/// valid point wins.
pub fn hash_to_curve(message: &[u8]) -> Result<PublicKey> {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_SEPARATOR);
    hasher.update(message);
    let h0 = hasher.finalize();

    for counter in 0..MAX_ITERATIONS {
        let mut hasher = Sha256::new();
        hasher.update(h0);
        hasher.update(counter.to_le_bytes());
        let digest = hasher.finalize();

        for prefix in [0x02u8, 0x03u8] {
            let mut candidate = [0u8; 33];
            candidate[0] = prefix;
            candidate[1..].copy_from_slice(&digest);
            if let Ok(point) = PublicKey::from_sec1_bytes(&candidate) {
                return Ok(point);
            }
        }
    }
    Err(Error::CurveSearchExhausted)
}

fn public_key_to_projective(key: &PublicKey) -> ProjectivePoint {
    ProjectivePoint::from(*key.as_affine())
}

fn projective_to_public_key(point: ProjectivePoint) -> Result<PublicKey> {
    let affine: AffinePoint = point.into();
    PublicKey::from_affine(affine).map_err(|_| Error::InvalidCompressedPoint)
}

/// Blind a secret's hash-to-curve point with a (caller-chosen or random)
/// scalar, returning `(B_, r)`.
pub fn blind_message(secret_hex_ascii: &[u8], blinding_factor: Option<WrappedSecretKey>) -> Result<(PublicKey, WrappedSecretKey)> {
    let y = hash_to_curve(secret_hex_ascii)?;
    let r = blinding_factor.unwrap_or_else(WrappedSecretKey::generate);
    let r_scalar = *r.inner().to_nonzero_scalar();
    let blinded = public_key_to_projective(&y) + (ProjectivePoint::GENERATOR * r_scalar);
    Ok((projective_to_public_key(blinded)?, r))
}

/// Recover the mint's signature over the unblinded point: `C = C_ - r*K`.
pub fn unblind_message(blinded_signature: &PublicKey, r: &WrappedSecretKey, mint_pubkey: &PublicKey) -> Result<PublicKey> {
    let r_scalar = *r.inner().to_nonzero_scalar();
    let c_blinded = public_key_to_projective(blinded_signature);
    let k = public_key_to_projective(mint_pubkey);
    let unblinded = c_blinded - (k * r_scalar);
    projective_to_public_key(unblinded)
}

/// Verify `C = k*Y` given the mint's private scalar `k` and the original
/// secret (used only in tests / verification helpers, never by the wallet
/// against a live mint).
pub fn sign_message(mint_privkey: &Scalar, message: &[u8]) -> Result<PublicKey> {
    let y = hash_to_curve(message)?;
    let signed = public_key_to_projective(&y) * mint_privkey;
    projective_to_public_key(signed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::elliptic_curve::sec1::ToEncodedPoint;

    #[test]
    fn hash_to_curve_is_deterministic_and_on_curve() {
        let msg = b"0000000000000000000000000000000000000000000000000000000000000000";
        let a = hash_to_curve(msg).expect("valid point");
        let b = hash_to_curve(msg).expect("valid point");
        assert_eq!(a, b);
    }

    #[test]
    fn hash_to_curve_distinct_messages_differ() {
        let a = hash_to_curve(b"secret-a").expect("valid point");
        let b = hash_to_curve(b"secret-b").expect("valid point");
        assert_ne!(a, b);
    }

    #[test]
    fn blind_unblind_round_trip() {
        let secret = b"deadbeefdeadbeefdeadbeefdeadbeef";
        let (blinded, r) = blind_message(secret, None).expect("blind");

        let mint_key = WrappedSecretKey::generate();
        let k_scalar = *mint_key.inner().to_nonzero_scalar();

        // Mint signs the blinded point: C_ = k * B_
        let c_blinded = public_key_to_projective(&blinded) * k_scalar;
        let c_blinded = projective_to_public_key(c_blinded).expect("valid point");

        let unblinded = unblind_message(&c_blinded, &r, &mint_key.public_key()).expect("unblind");

        // Expected: k * Y where Y = hash_to_curve(secret)
        let y = hash_to_curve(secret).expect("valid point");
        let expected = projective_to_public_key(public_key_to_projective(&y) * k_scalar).expect("valid point");

        assert_eq!(unblinded, expected);
    }

    #[test]
    fn y_value_for_checkstate_is_deterministic() {
        let secret_hex = "abcd1234";
        let y1 = hash_to_curve(secret_hex.as_bytes()).expect("valid point");
        let y2 = hash_to_curve(secret_hex.as_bytes()).expect("valid point");
        assert_eq!(y1.to_encoded_point(true), y2.to_encoded_point(true));
    }
}

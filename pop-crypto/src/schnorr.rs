//! Schnorr signatures over G1.
//!
//! The collective authority uses these to seal a party's final statement. A signature on
//! message `m` under key `X = x * G` is a pair `(R, s)` with `R = k * G` for a fresh nonce `k`
//! and `s = k + c * x`, where `c` hashes `X`, `R` and `m`.

use crate::{challenge::ChallengeBuilder, common::*, keys::*, SerializeElement};
use serde::*;
use std::convert::{TryFrom, TryInto};

const SCHNORR_DOMAIN: &[u8] = b"pop schnorr signature";

/// A Schnorr signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(with = "SerializeElement")]
    commitment: G1Affine,
    #[serde(with = "SerializeElement")]
    response: Scalar,
}

fn challenge(pk: &PublicKey, commitment: &G1Affine, msg: &[u8]) -> Scalar {
    ChallengeBuilder::new(SCHNORR_DOMAIN)
        .with(pk)
        .with(commitment)
        .with_framed(msg)
        .finish()
        .to_scalar()
}

impl KeyPair {
    /// Sign a message with this key pair.
    pub fn sign(&self, rng: &mut impl Rng, msg: &[u8]) -> Signature {
        let k = random_nonzero_scalar(rng);
        let commitment = (G1Projective::generator() * k).to_affine();
        let c = challenge(self.public_key(), &commitment, msg);
        Signature {
            commitment,
            response: k + c * self.secret_key().to_scalar(),
        }
    }
}

impl PublicKey {
    /// Verify a signature on a message under this public key.
    pub fn verify(&self, msg: &[u8], sig: &Signature) -> Verification {
        let c = challenge(self, &sig.commitment, msg);
        let lhs = G1Projective::generator() * sig.response;
        let rhs = G1Projective::from(sig.commitment) + self.to_projective() * c;
        Verification::from(lhs == rhs)
    }
}

impl Signature {
    /// Encode as `commitment || response` (80 bytes).
    pub fn to_bytes(&self) -> [u8; 80] {
        let mut bytes = [0; 80];
        bytes[..48].copy_from_slice(&self.commitment.to_compressed());
        bytes[48..].copy_from_slice(&self.response.to_bytes());
        bytes
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let invalid = || Error::InvalidEncoding("schnorr signature");
        if bytes.len() != 80 {
            return Err(invalid());
        }
        let commitment: [u8; 48] = bytes[..48].try_into().map_err(|_| invalid())?;
        let response: [u8; 32] = bytes[48..].try_into().map_err(|_| invalid())?;
        let commitment: Option<G1Affine> = G1Affine::from_compressed(&commitment).into();
        let response: Option<Scalar> = Scalar::from_bytes(&response).into();
        match (commitment, response) {
            (Some(commitment), Some(response)) => Ok(Signature {
                commitment,
                response,
            }),
            _ => Err(invalid()),
        }
    }
}

//! Attendee and organizer keys.
//!
//! A [`SecretKey`] is a non-zero scalar `x`; its [`PublicKey`] is `x * G` for the standard
//! generator `G` of G1. Both have a base64 text form: the compressed point for public keys and
//! the canonical little-endian scalar for secret keys. These text forms are what organizers and
//! attendees exchange out of band.

use crate::{common::*, SerializeElement};
use serde::*;
use std::{
    convert::TryFrom,
    fmt,
    hash::{Hash, Hasher},
};

/// A secret key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKey(#[serde(with = "SerializeElement")] pub(crate) Scalar);

/// A public key.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "SerializeElement")] pub(crate) G1Affine);

/// A keypair formed from a [`SecretKey`] and the matching [`PublicKey`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPair {
    sk: SecretKey,
    pk: PublicKey,
}

impl SecretKey {
    /// Generate a new `SecretKey` uniformly at random from the non-zero scalars.
    pub fn new(rng: &mut impl Rng) -> Self {
        Self(random_nonzero_scalar(rng))
    }

    /// Encode the secret key as standard base64 text.
    pub fn to_base64(&self) -> String {
        base64::encode(self.0.to_bytes())
    }

    /// Decode a secret key from standard base64 text.
    pub fn from_base64(text: &str) -> Result<Self, Error> {
        let bytes = base64::decode(text.trim()).map_err(|_| Error::InvalidEncoding("secret key"))?;
        let bytes =
            <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| Error::InvalidEncoding("secret key"))?;
        let maybe_scalar: Option<Scalar> = Scalar::from_bytes(&bytes).into();
        match maybe_scalar {
            Some(scalar) if !bool::from(ff::Field::is_zero(&scalar)) => Ok(Self(scalar)),
            _ => Err(Error::InvalidEncoding("secret key")),
        }
    }

    pub(crate) fn to_scalar(&self) -> Scalar {
        self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

impl PublicKey {
    /// Encode the public key as standard base64 text of its compressed form.
    pub fn to_base64(&self) -> String {
        base64::encode(&self.0.to_compressed()[..])
    }

    /// Decode a public key from standard base64 text. Fails on anything that is not the
    /// compressed encoding of a non-identity point of G1.
    pub fn from_base64(text: &str) -> Result<Self, Error> {
        let bytes = base64::decode(text.trim()).map_err(|_| Error::InvalidEncoding("public key"))?;
        Self::from_bytes(&bytes).ok_or(Error::InvalidEncoding("public key"))
    }

    /// Decode a public key from its 48-byte compressed form.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes = <[u8; 48]>::try_from(bytes).ok()?;
        let point: Option<G1Affine> = G1Affine::from_compressed(&bytes).into();
        point
            .filter(|p| !bool::from(p.is_identity()))
            .map(PublicKey)
    }

    /// Encode the public key in its 48-byte compressed form.
    pub fn to_bytes(&self) -> [u8; 48] {
        self.0.to_compressed()
    }

    pub(crate) fn to_projective(self) -> G1Projective {
        self.0.into()
    }
}

impl From<&SecretKey> for PublicKey {
    fn from(sk: &SecretKey) -> Self {
        PublicKey((G1Projective::generator() * sk.0).to_affine())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base64())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl KeyPair {
    /// Generate a new random `KeyPair`.
    pub fn new(rng: &mut impl Rng) -> Self {
        Self::from_secret_key(SecretKey::new(rng))
    }

    /// Complete a `KeyPair` from its secret half.
    pub fn from_secret_key(sk: SecretKey) -> Self {
        let pk = PublicKey::from(&sk);
        KeyPair { sk, pk }
    }

    /// Get the public portion of the `KeyPair`.
    pub fn public_key(&self) -> &PublicKey {
        &self.pk
    }

    /// Get the secret portion of the `KeyPair`.
    pub fn secret_key(&self) -> &SecretKey {
        &self.sk
    }
}

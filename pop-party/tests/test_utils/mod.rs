#![allow(dead_code)]

use pop_party::{
    ledger::Track, AttendeeSet, AttendeeTagSigner, FinalStatement, KeyPair, LocalAuthority,
    PartyConfig, PartyDescription, PublicKey, Rng, Roster, SecretKey, ServerIdentity, Signature,
    Tag, Verification,
};
use rand::SeedableRng;
use std::{convert::TryInto, iter, net::SocketAddr};

pub const AUTHORITY_ADDR: &str = "127.0.0.1:7770";
pub const PIN: &str = "424242";

// Seeded rng for replicable tests.
pub fn seeded_rng() -> (impl rand::CryptoRng + rand::RngCore) {
    const TEST_RNG_SEED: [u8; 32] = *b"NEVER USE THIS FOR ANYTHING REAL";
    rand::rngs::StdRng::from_seed(TEST_RNG_SEED)
}

pub fn authority(rng: &mut impl Rng) -> LocalAuthority {
    let addr: SocketAddr = AUTHORITY_ADDR.parse().unwrap();
    LocalAuthority::with_pin(rng, addr, PIN)
}

pub fn description(authority: &LocalAuthority) -> PartyDescription {
    PartyDescription {
        name: "33c3 proof-of-personhood party".into(),
        date_time: "2016-12-29 18:00 UTC".into(),
        location: "Hamburg".into(),
        roster: Roster {
            servers: vec![ServerIdentity {
                address: format!("tcp://{}", authority.address()),
                public: *authority.public_key(),
                description: "local".into(),
            }],
        },
    }
}

pub fn attendee_keys(rng: &mut impl Rng, n: usize) -> Vec<KeyPair> {
    iter::repeat_with(|| KeyPair::new(&mut *rng)).take(n).collect()
}

// An organizer config that went through the whole lifecycle with `attendees`.
pub fn sealed_party(
    rng: &mut impl Rng,
    authority: &LocalAuthority,
    attendees: &[KeyPair],
) -> (PartyConfig, FinalStatement) {
    let mut organizer = PartyConfig::new(rng);
    let _ = organizer.link(authority, AUTHORITY_ADDR, PIN, rng).unwrap();
    let _ = organizer
        .set_description(authority, description(authority))
        .unwrap();
    for kp in attendees {
        let _ = organizer.add_attendee(*kp.public_key()).unwrap();
    }
    let statement = organizer.finalize(authority).unwrap().statement().clone();
    (organizer, statement)
}

pub fn tracks(ids: &[i64]) -> Vec<Track> {
    ids.iter()
        .map(|&id| Track {
            id,
            title: format!("Talk {}", id),
            persons: "Speaker".into(),
            date: "2016-12-27".into(),
        })
        .collect()
}

/// A deterministic stand-in for the ring signer.
///
/// Tags are derived from the context and the index alone. A signature spells out everything it
/// covers, so verification is an equality check.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeSigner;

impl FakeSigner {
    fn encode(attendees: &AttendeeSet, context: &[u8], message: &[u8], index: usize) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(index as u64).to_le_bytes());
        for key in attendees.iter() {
            bytes.extend_from_slice(&key.to_bytes());
        }
        bytes.extend_from_slice(&(context.len() as u64).to_le_bytes());
        bytes.extend_from_slice(context);
        bytes.extend_from_slice(message);
        bytes
    }

    pub fn tag(context: &[u8], index: usize) -> Tag {
        Tag::new(format!("{}#{}", hex::encode(context), index).into_bytes())
    }
}

impl AttendeeTagSigner for FakeSigner {
    fn sign(
        &self,
        _rng: &mut impl Rng,
        attendees: &AttendeeSet,
        context: &[u8],
        message: &[u8],
        index: usize,
        key: &SecretKey,
    ) -> Result<(Signature, Tag), pop_crypto::Error> {
        let member = attendees.get(index).ok_or(pop_crypto::Error::InvalidIndex {
            index,
            len: attendees.len(),
        })?;
        if *member != PublicKey::from(key) {
            return Err(pop_crypto::Error::KeyMismatch(index));
        }
        Ok((
            Signature::new(Self::encode(attendees, context, message, index)),
            Self::tag(context, index),
        ))
    }

    fn verify(
        &self,
        attendees: &AttendeeSet,
        context: &[u8],
        message: &[u8],
        signature: &Signature,
    ) -> (Tag, Verification) {
        let bytes = signature.as_bytes();
        let index = match bytes.get(..8).and_then(|b| b.try_into().ok()) {
            Some(b) => u64::from_le_bytes(b) as usize,
            None => return (Tag::default(), Verification::Failed),
        };
        let expected = Self::encode(attendees, context, message, index);
        if index < attendees.len() && bytes == expected.as_slice() {
            (Self::tag(context, index), Verification::Verified)
        } else {
            (Tag::default(), Verification::Failed)
        }
    }
}

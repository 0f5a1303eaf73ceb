use pop_crypto::{AttendeeSet, KeyPair};
use rand::SeedableRng;
use std::{convert::TryFrom, iter};

// Seeded rng for replicable tests.
pub fn seeded_rng() -> (impl rand::CryptoRng + rand::RngCore) {
    const TEST_RNG_SEED: [u8; 32] = *b"NEVER USE THIS FOR ANYTHING REAL";
    rand::rngs::StdRng::from_seed(TEST_RNG_SEED)
}

// A party of `n` fresh attendees.
pub fn party(rng: &mut (impl rand::CryptoRng + rand::RngCore), n: usize) -> (Vec<KeyPair>, AttendeeSet) {
    let keys: Vec<KeyPair> = iter::repeat_with(|| KeyPair::new(&mut *rng)).take(n).collect();
    let set = AttendeeSet::try_from(keys.iter().map(|kp| *kp.public_key()).collect::<Vec<_>>())
        .expect("fresh keys are distinct");
    (keys, set)
}

/*!
The final statement of a party.

A final statement binds a [`PartyDescription`] to the ordered [`AttendeeSet`] collected at the
party. Once the collective authority signs it, the statement is sealed: the attendee set is
frozen and every attendee resolves their signing index against it.

Final statements are exchanged as TOML files.
*/

use crate::{description::PartyDescription, Error};
use pop_crypto::{schnorr, AttendeeSet, PublicKey, Verification};
use serde::*;
use sha3::{Digest, Sha3_256};

/// Description, attendees and the authority's signature over both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FinalStatement {
    /// The party description; absent until the organizer sets it.
    pub desc: Option<PartyDescription>,
    /// The attendees, in signing order.
    pub attendees: AttendeeSet,
    /// The authority's signature over [`FinalStatement::hash`]; absent until sealed.
    pub signature: Option<schnorr::Signature>,
}

impl FinalStatement {
    /// A statement for `desc` with no attendees yet.
    pub fn new(desc: PartyDescription) -> Self {
        Self {
            desc: Some(desc),
            ..Self::default()
        }
    }

    /// Whether the authority has signed this statement.
    pub fn is_sealed(&self) -> bool {
        self.signature.is_some()
    }

    /// The SHA3-256 digest the authority signs: the description hash followed by every
    /// attendee key in order.
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha3_256::new();
        match &self.desc {
            Some(desc) => hasher.update(desc.hash()),
            None => hasher.update([0u8; 32]),
        }
        hasher.update((self.attendees.len() as u64).to_le_bytes());
        for key in self.attendees.iter() {
            hasher.update(key.to_bytes());
        }

        let mut digest = [0; 32];
        digest.copy_from_slice(hasher.finalize().as_ref());
        digest
    }

    /// Check the seal against the authority's public key. Unsealed statements fail.
    pub fn verify(&self, authority: &PublicKey) -> Verification {
        match &self.signature {
            Some(signature) => authority.verify(&self.hash(), signature),
            None => Verification::Failed,
        }
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string(self).map_err(|e| Error::InvalidStatement(e.to_string()))
    }

    /// Parse from TOML.
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::Parse {
            what: "final statement",
            reason: e.to_string(),
        })
    }
}

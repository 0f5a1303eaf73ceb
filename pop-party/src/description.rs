//! Party descriptions: the event metadata and the roster of authority servers.
//!
//! Organizers write these as TOML files. A description's [`hash`](PartyDescription::hash) is
//! stable across encodings and is what the authority stores the description under.

use crate::Error;
use pop_crypto::PublicKey;
use serde::*;
use sha3::{Digest, Sha3_256};

/// One server of the collective authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerIdentity {
    /// Network address of the server.
    pub address: String,
    /// The server's public key.
    pub public: PublicKey,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

/// The servers of the collective authority hosting a party.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    /// The servers, in roster order.
    #[serde(default)]
    pub servers: Vec<ServerIdentity>,
}

impl Roster {
    /// Parse a group definition: a TOML file with one `[[servers]]` table per server.
    ///
    /// Fails with [`Error::EmptyRoster`] if no server is listed.
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        let roster: Roster = toml::from_str(text).map_err(|e| Error::Parse {
            what: "group definition",
            reason: e.to_string(),
        })?;
        if roster.servers.is_empty() {
            return Err(Error::EmptyRoster);
        }
        Ok(roster)
    }

    /// Whether the roster lists no server.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// The metadata of a party.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PartyDescription {
    /// Name of the party.
    pub name: String,
    /// When the party takes place.
    pub date_time: String,
    /// Where the party takes place.
    pub location: String,
    /// The authority servers hosting the party.
    #[serde(default)]
    pub roster: Roster,
}

impl PartyDescription {
    /// Parse a party description from TOML. The roster usually comes from a separate group
    /// definition and is attached with [`PartyDescription::with_roster`].
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::Parse {
            what: "party description",
            reason: e.to_string(),
        })
    }

    /// Replace the roster.
    pub fn with_roster(mut self, roster: Roster) -> Self {
        self.roster = roster;
        self
    }

    /// A SHA3-256 digest over every field, each length-prefixed.
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha3_256::new();
        let mut field = |bytes: &[u8]| {
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };
        field(self.name.as_bytes());
        field(self.date_time.as_bytes());
        field(self.location.as_bytes());
        for server in &self.roster.servers {
            field(server.address.as_bytes());
            field(&server.public.to_bytes());
            field(server.description.as_bytes());
        }

        let mut digest = [0; 32];
        digest.copy_from_slice(hasher.finalize().as_ref());
        digest
    }

    /// The [`hash`](PartyDescription::hash) as standard base64 text, for display.
    pub fn hash_base64(&self) -> String {
        base64::encode(self.hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pop_crypto::KeyPair;

    fn group_toml() -> String {
        let key = KeyPair::new(&mut rand::thread_rng());
        format!(
            r#"
            [[servers]]
            Address = "tcp://127.0.0.1:7770"
            Public = "{}"
            Description = "conode 1"
            "#,
            key.public_key().to_base64()
        )
    }

    const DESC: &str = r#"
        Name = "33c3 proof-of-personhood party"
        DateTime = "2016-12-29 18:00 UTC"
        Location = "Hamburg"
    "#;

    #[test]
    fn parses_description_and_group() {
        let roster = Roster::from_toml(&group_toml()).unwrap();
        assert_eq!(roster.servers.len(), 1);
        assert_eq!(roster.servers[0].description, "conode 1");

        let desc = PartyDescription::from_toml(DESC).unwrap().with_roster(roster);
        assert_eq!(desc.location, "Hamburg");
        assert_eq!(desc.roster.servers.len(), 1);
    }

    #[test]
    fn empty_group_is_rejected() {
        assert!(matches!(Roster::from_toml(""), Err(Error::EmptyRoster)));
    }

    #[test]
    fn hash_covers_every_field() {
        let desc = PartyDescription::from_toml(DESC).unwrap();
        let mut moved = desc.clone();
        moved.location = "Leipzig".into();
        assert_ne!(desc.hash(), moved.hash());

        let with_roster = desc
            .clone()
            .with_roster(Roster::from_toml(&group_toml()).unwrap());
        assert_ne!(desc.hash(), with_roster.hash());
        assert_eq!(desc.hash(), desc.clone().hash());
    }
}

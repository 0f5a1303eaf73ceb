/*!
Anonymous track voting.

The [`VoteLedger`] holds, for every track on the schedule, the list of votes cast so far. A vote
is keyed by the voter's linkage [`Tag`], so the same attendee always lands on the same record:
re-submitting the same vote is rejected and submitting the opposite vote flips it.

The ledger file is a JSON array of tracks, each carrying its votes:

```json
[ { "ID": 8, "Title": "...", "Persons": "...", "Date": "...",
    "Votes": [ { "Tag": "<base64>", "Vote": true } ] } ]
```

Track identity always comes from the schedule the ledger was created with; the file only
contributes votes.
*/

use super::{ActionLedger, TrackId};
use crate::{
    persist::{self, PersistError},
    Error,
};
use pop_crypto::Tag;
use serde::*;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::{info, warn};

/// A talk on the schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Track {
    /// Identifier, unique within the schedule.
    #[serde(rename = "ID")]
    pub id: TrackId,
    /// Title of the talk.
    pub title: String,
    /// Speakers.
    pub persons: String,
    /// When the talk takes place.
    pub date: String,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {} in {}", self.id, self.title, self.persons, self.date)
    }
}

/// One attendee's vote on a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoteRecord {
    /// Linkage tag of the voter.
    pub tag: Tag,
    /// `true` for an up-vote, `false` for a down-vote.
    pub vote: bool,
}

/// A track together with the votes cast on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackEntry {
    /// The track.
    #[serde(flatten)]
    pub track: Track,
    /// Votes in the order they were first cast.
    #[serde(rename = "Votes", default)]
    pub votes: Vec<VoteRecord>,
}

impl TrackEntry {
    fn new(track: Track) -> Self {
        Self {
            track,
            votes: Vec::new(),
        }
    }

    /// The number of up-votes and down-votes.
    pub fn tally(&self) -> (usize, usize) {
        let up = self.votes.iter().filter(|v| v.vote).count();
        (up, self.votes.len() - up)
    }
}

impl fmt::Display for TrackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (up, down) = self.tally();
        write!(f, "{}\n\t{} up, {} down", self.track, up, down)
    }
}

/// A track as presented to one voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackSummary {
    /// The track.
    #[serde(flatten)]
    pub track: Track,
    /// Whether the voter currently has an up-vote on this track.
    pub voted: bool,
    /// Number of up-votes.
    pub up: usize,
    /// Number of down-votes.
    pub down: usize,
}

/// The vote ledger of one event.
#[derive(Debug)]
pub struct VoteLedger {
    schedule: BTreeMap<TrackId, Track>,
    entries: Mutex<BTreeMap<TrackId, TrackEntry>>,
}

impl VoteLedger {
    /// Create a ledger with no votes for the tracks on `schedule`.
    pub fn new(schedule: impl IntoIterator<Item = Track>) -> Self {
        let schedule: BTreeMap<_, _> = schedule.into_iter().map(|t| (t.id, t)).collect();
        let entries = Self::empty_entries(&schedule);
        Self {
            schedule,
            entries: Mutex::new(entries),
        }
    }

    /// Create a ledger from a schedule file: a JSON array of tracks.
    pub fn from_schedule_file(path: &Path) -> Result<Self, Error> {
        let tracks: Vec<Track> = persist::load_json(path)?;
        info!(tracks = tracks.len(), "loaded schedule");
        Ok(Self::new(tracks))
    }

    fn empty_entries(schedule: &BTreeMap<TrackId, Track>) -> BTreeMap<TrackId, TrackEntry> {
        schedule
            .values()
            .map(|t| (t.id, TrackEntry::new(t.clone())))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<TrackId, TrackEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The tracks on the schedule, ordered by ID.
    pub fn schedule(&self) -> impl Iterator<Item = &Track> {
        self.schedule.values()
    }

    /**
    Record `vote` by `tag` on track `id`.

    - Fails with [`Error::UnknownTrack`] if the track is not on the schedule.
    - Appends a new record if `tag` has not voted on this track.
    - Fails with [`Error::DuplicateIdenticalVote`] if `tag` already cast the same vote.
    - Otherwise flips the existing vote.
    */
    pub fn record_vote(&self, id: TrackId, tag: &Tag, vote: bool) -> Result<(), Error> {
        let _ = Self::apply(&mut self.lock(), id, tag, vote)?;
        Ok(())
    }

    /**
    Record a vote as [`record_vote()`](Self::record_vote()) does and save the ledger to `path`
    before releasing the lock.

    If the save fails the vote is undone, so the ledger in memory matches the file and the
    caller may retry.
    */
    pub fn record_vote_persisted(
        &self,
        id: TrackId,
        tag: &Tag,
        vote: bool,
        path: &Path,
    ) -> Result<(), Error> {
        let mut entries = self.lock();
        let previous = Self::apply(&mut entries, id, tag, vote)?;
        if let Err(e) = Self::write(&entries, path) {
            if let Some(entry) = entries.get_mut(&id) {
                match previous {
                    Some(old) => {
                        if let Some(record) = entry.votes.iter_mut().find(|v| &v.tag == tag) {
                            record.vote = old;
                        }
                    }
                    None => entry.votes.retain(|v| &v.tag != tag),
                }
            }
            warn!(track = id, "undid a vote that could not be saved");
            return Err(e);
        }
        Ok(())
    }

    // Returns the vote `tag` held before, if any.
    fn apply(
        entries: &mut BTreeMap<TrackId, TrackEntry>,
        id: TrackId,
        tag: &Tag,
        vote: bool,
    ) -> Result<Option<bool>, Error> {
        let entry = entries.get_mut(&id).ok_or(Error::UnknownTrack(id))?;

        match entry.votes.iter_mut().find(|v| &v.tag == tag) {
            Some(existing) if existing.vote == vote => Err(Error::DuplicateIdenticalVote(id)),
            Some(existing) => {
                existing.vote = vote;
                info!(track = %entry.track.title, tag = %tag.to_base64(), vote, "vote changed");
                Ok(Some(!vote))
            }
            None => {
                entry.votes.push(VoteRecord {
                    tag: tag.clone(),
                    vote,
                });
                info!(track = %entry.track.title, tag = %tag.to_base64(), vote, "vote recorded");
                Ok(None)
            }
        }
    }

    fn write(entries: &BTreeMap<TrackId, TrackEntry>, path: &Path) -> Result<(), Error> {
        let ordered: Vec<&TrackEntry> = entries.values().collect();
        persist::save_json(path, &ordered)?;
        Ok(())
    }

    /// Every track with its tallies, as seen by `tag`, ordered by ID.
    ///
    /// `voted` is set only when `tag` holds an up-vote; a down-vote reads the same as no vote.
    pub fn snapshot(&self, tag: &Tag) -> Vec<TrackSummary> {
        self.lock()
            .values()
            .map(|entry| {
                let (up, down) = entry.tally();
                let voted = entry.votes.iter().any(|v| &v.tag == tag && v.vote);
                TrackSummary {
                    track: entry.track.clone(),
                    voted,
                    up,
                    down,
                }
            })
            .collect()
    }

    /// A copy of the entry for track `id`.
    pub fn entry(&self, id: TrackId) -> Option<TrackEntry> {
        self.lock().get(&id).cloned()
    }

    /**
    Replace all votes with the contents of `path`, returning the IDs of saved tracks that are
    not on the schedule.

    Votes on such tracks are dropped. The replacement happens under the ledger lock, so
    concurrent voters see either the old votes or the loaded ones.

    A file that lists a track twice, or holds two votes by one tag on a track, is corrupt: it
    fails with a [`PersistError::Decode`] and the ledger is left as it was.
    */
    pub fn load_report(&self, path: &Path) -> Result<Vec<TrackId>, Error> {
        let mut entries = self.lock();
        let saved: Vec<TrackEntry> = persist::load_json(path)?;

        let mut seen = BTreeSet::new();
        for saved_entry in &saved {
            let id = saved_entry.track.id;
            if !seen.insert(id) {
                let reason = format!("track {} is listed twice", id);
                return Err(PersistError::decode(path, reason).into());
            }
            let mut voters = BTreeSet::new();
            if let Some(repeat) = saved_entry.votes.iter().find(|v| !voters.insert(&v.tag)) {
                let reason = format!("tag {} voted twice on track {}", repeat.tag.to_base64(), id);
                return Err(PersistError::decode(path, reason).into());
            }
        }

        let mut loaded = Self::empty_entries(&self.schedule);
        let mut dropped = Vec::new();
        for saved_entry in saved {
            match loaded.get_mut(&saved_entry.track.id) {
                Some(entry) => entry.votes = saved_entry.votes,
                None => dropped.push(saved_entry.track.id),
            }
        }

        if !dropped.is_empty() {
            warn!(?dropped, "dropped votes on tracks missing from the schedule");
        }
        info!(tracks = loaded.len(), "loaded tracks");
        *entries = loaded;
        Ok(dropped)
    }
}

impl ActionLedger for VoteLedger {
    type Key = (TrackId, Tag);
    type Action = bool;

    fn record(&self, (id, tag): Self::Key, vote: bool) -> Result<(), Error> {
        self.record_vote(id, &tag, vote)
    }

    fn save(&self, path: &Path) -> Result<(), Error> {
        Self::write(&self.lock(), path)
    }

    fn load(&self, path: &Path) -> Result<(), Error> {
        let _ = self.load_report(path)?;
        Ok(())
    }
}

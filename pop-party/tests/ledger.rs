mod test_utils;

use pop_party::{
    ledger::{SessionStore, Token, TokenKind},
    ActionLedger, Error, ErrorKind, SessionRegistry, Tag, VoteLedger,
};
use std::{sync::Arc, thread};
use test_utils::*;

#[test]
fn vote_toggles_and_rejects_repeats() {
    let ledger = VoteLedger::new(tracks(&[7911, 7912]));
    let tag = Tag::new(vec![0xaa; 48]);

    ledger.record_vote(7911, &tag, true).unwrap();
    assert!(matches!(
        ledger.record_vote(7911, &tag, true),
        Err(Error::DuplicateIdenticalVote(7911))
    ));
    assert!(ledger.snapshot(&tag)[0].voted);

    ledger.record_vote(7911, &tag, false).unwrap();
    let summary = ledger.snapshot(&tag);
    assert!(!summary[0].voted);
    assert_eq!((summary[0].up, summary[0].down), (0, 1));

    // Flipping back is fine too.
    ledger.record_vote(7911, &tag, true).unwrap();
    assert_eq!(ledger.entry(7911).unwrap().votes.len(), 1);
}

#[test]
fn unknown_tracks_are_rejected_without_changes() {
    let ledger = VoteLedger::new(tracks(&[1, 2, 3]));
    ledger.record_vote(2, &Tag::new(vec![1]), false).unwrap();
    let before = ledger.snapshot(&Tag::default());

    assert!(matches!(
        ledger.record((999, Tag::new(vec![1])), true),
        Err(Error::UnknownTrack(999))
    ));
    assert_eq!(ledger.snapshot(&Tag::default()), before);
}

#[test]
fn votes_survive_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("votes.json");
    let schedule = tracks(&[3, 8, 12]);

    let ledger = VoteLedger::new(schedule.clone());
    ledger.record_vote(8, &Tag::default(), true).unwrap();
    ledger.record_vote(12, &Tag::new(vec![9; 48]), false).unwrap();
    ledger.save(&path).unwrap();

    let reloaded = VoteLedger::new(schedule);
    reloaded.load(&path).unwrap();
    assert_eq!(reloaded.entry(8), ledger.entry(8));
    assert_eq!(reloaded.entry(12), ledger.entry(12));
    assert!(reloaded.snapshot(&Tag::default())[1].voted);
    assert!(matches!(
        reloaded.record_vote(8, &Tag::default(), true),
        Err(Error::DuplicateIdenticalVote(8))
    ));

    // The file is ordered by ID and uses the client field names.
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let ids: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["ID"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![3, 8, 12]);
    assert_eq!(json[1]["Votes"][0]["Tag"], "");
    assert_eq!(json[1]["Votes"][0]["Vote"], true);
}

#[test]
fn load_replaces_votes_and_drops_unscheduled_tracks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("votes.json");

    let old = VoteLedger::new(tracks(&[1, 2]));
    old.record_vote(1, &Tag::new(vec![1]), true).unwrap();
    old.record_vote(2, &Tag::new(vec![1]), true).unwrap();
    old.save(&path).unwrap();

    let ledger = VoteLedger::new(tracks(&[1, 3]));
    ledger.record_vote(3, &Tag::new(vec![2]), true).unwrap();
    let dropped = ledger.load_report(&path).unwrap();

    assert_eq!(dropped, vec![2]);
    assert_eq!(ledger.entry(1).unwrap().votes.len(), 1);
    assert!(ledger.entry(3).unwrap().votes.is_empty());
    assert!(ledger.entry(2).is_none());
}

#[test]
fn files_with_repeated_votes_or_tracks_are_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = VoteLedger::new(tracks(&[8, 9]));
    ledger.record_vote(9, &Tag::new(vec![7]), false).unwrap();
    let before = ledger.snapshot(&Tag::new(vec![1]));

    let track = r#""ID":8,"Title":"Talk 8","Persons":"Speaker","Date":"2016-12-27""#;
    let twice = dir.path().join("twice.json");
    std::fs::write(
        &twice,
        format!(
            r#"[{{{},"Votes":[{{"Tag":"AQ==","Vote":true}},{{"Tag":"AQ==","Vote":true}}]}}]"#,
            track
        ),
    )
    .unwrap();
    let err = ledger.load(&twice).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corrupt);
    assert_eq!(ledger.snapshot(&Tag::new(vec![1])), before);

    let repeated = dir.path().join("repeated.json");
    std::fs::write(
        &repeated,
        format!(
            r#"[{{{t},"Votes":[{{"Tag":"AQ==","Vote":true}}]}},{{{t},"Votes":[]}}]"#,
            t = track
        ),
    )
    .unwrap();
    let err = ledger.load(&repeated).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corrupt);
    assert_eq!(ledger.snapshot(&Tag::new(vec![1])), before);
}

#[test]
fn unsaved_votes_are_undone() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = VoteLedger::new(tracks(&[1]));
    let tag = Tag::new(vec![5; 48]);

    // A directory cannot be replaced by the ledger file.
    let result = ledger.record_vote_persisted(1, &tag, true, dir.path());
    assert!(matches!(result, Err(Error::Persist(_))));
    assert!(ledger.entry(1).unwrap().votes.is_empty());

    let path = dir.path().join("votes.json");
    ledger.record_vote_persisted(1, &tag, true, &path).unwrap();
    let result = ledger.record_vote_persisted(1, &tag, false, dir.path());
    assert!(matches!(result, Err(Error::Persist(_))));
    assert_eq!(ledger.entry(1).unwrap().tally(), (1, 0));

    // The file holds exactly what the ledger holds.
    let reloaded = VoteLedger::new(tracks(&[1]));
    reloaded.load(&path).unwrap();
    assert_eq!(reloaded.entry(1), ledger.entry(1));
}

#[test]
fn concurrent_up_votes_are_all_counted() {
    const VOTERS: u8 = 32;
    let ledger = Arc::new(VoteLedger::new(tracks(&[8])));

    let handles: Vec<_> = (0..VOTERS)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || ledger.record_vote(8, &Tag::new(vec![i; 48]), true))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let summary = ledger.snapshot(&Tag::new(vec![0; 48]));
    assert_eq!(summary[0].up, VOTERS as usize);
    assert_eq!(summary[0].down, 0);
    assert!(summary[0].voted);
}

#[test]
fn session_registry_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = seeded_rng();

    // Empty registry.
    let empty = dir.path().join("empty.json");
    SessionRegistry::new().save(&empty).unwrap();
    let loaded = SessionRegistry::new();
    loaded.load(&empty).unwrap();
    assert_eq!(loaded.snapshot(), SessionStore::default());

    // Populated registry.
    let path = dir.path().join("sessions.json");
    let registry = SessionRegistry::new();
    let session = registry.issue_session(&mut rng);
    let nonce = registry.issue_nonce(&mut rng);
    registry
        .record(Token::new(b"external".to_vec()), TokenKind::Session)
        .unwrap();
    registry.save(&path).unwrap();

    let loaded = SessionRegistry::new();
    loaded.load(&path).unwrap();
    assert_eq!(loaded.snapshot(), registry.snapshot());
    assert!(loaded.has_session(&session));
    loaded.consume_nonce(&nonce).unwrap();
    assert!(matches!(
        loaded.consume_nonce(&nonce),
        Err(Error::UnknownNonce)
    ));
}

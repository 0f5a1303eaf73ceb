mod test_utils;

use pop_party::{
    ledger::Token, service::SESSIONS_PER_TAG, AttendeeTagSigner, Error, FinalStatement,
    LinkableRingSigner, PartyConfig, Settings, Signature, VoteLedger, VotingService,
};
use std::{fs, sync::Arc, thread};
use test_utils::*;

const CONTEXT: &str = "33c3 track vote";

// A sealed party of `n` attendees, each already joined.
fn joined(rng: &mut impl pop_party::Rng, n: usize) -> (FinalStatement, Vec<PartyConfig>) {
    let authority = authority(rng);
    let keys = attendee_keys(rng, n);
    let (_, statement) = sealed_party(rng, &authority, &keys);
    let configs = keys
        .iter()
        .map(|kp| {
            let mut config = PartyConfig::new(&mut *rng);
            let _ = config
                .join(statement.clone(), kp.secret_key().clone())
                .unwrap();
            config
        })
        .collect();
    (statement, configs)
}

fn login<S: AttendeeTagSigner>(
    rng: &mut impl pop_party::Rng,
    service: &VotingService<S>,
    signer: &S,
    config: &PartyConfig,
) -> Token {
    let nonce = service.issue_nonce(rng).unwrap();
    let (sig, _) = config
        .sign(signer, rng, nonce.as_bytes(), CONTEXT.as_bytes())
        .unwrap();
    service.login(rng, &nonce, &sig).unwrap()
}

#[test]
fn attendees_vote_once_per_track() {
    let mut rng = seeded_rng();
    let (statement, configs) = joined(&mut rng, 3);
    let service =
        VotingService::new(FakeSigner, &statement, CONTEXT, VoteLedger::new(tracks(&[1, 2])))
            .unwrap();

    let alice = login(&mut rng, &service, &FakeSigner, &configs[0]);
    let bob = login(&mut rng, &service, &FakeSigner, &configs[1]);
    service.vote(&alice, 1, true).unwrap();
    service.vote(&bob, 1, true).unwrap();
    assert!(matches!(
        service.vote(&alice, 1, true),
        Err(Error::DuplicateIdenticalVote(1))
    ));

    // A second login by the same attendee lands on the same tag.
    let alice_again = login(&mut rng, &service, &FakeSigner, &configs[0]);
    assert_ne!(alice, alice_again);
    assert!(matches!(
        service.vote(&alice_again, 1, true),
        Err(Error::DuplicateIdenticalVote(1))
    ));
    service.vote(&alice_again, 1, false).unwrap();

    let view = service.tracks(&bob).unwrap();
    assert_eq!((view[0].up, view[0].down), (1, 1));
    assert!(view[0].voted);
    assert!(!service.tracks(&alice).unwrap()[0].voted);

    assert!(matches!(
        service.vote(&alice, 999, true),
        Err(Error::UnknownTrack(999))
    ));
}

#[test]
fn nonces_cannot_be_replayed_or_forged() {
    let mut rng = seeded_rng();
    let (statement, configs) = joined(&mut rng, 2);
    let service =
        VotingService::new(FakeSigner, &statement, CONTEXT, VoteLedger::new(tracks(&[1])))
            .unwrap();

    let nonce = service.issue_nonce(&mut rng).unwrap();
    let (sig, _) = configs[0]
        .sign(&FakeSigner, &mut rng, nonce.as_bytes(), CONTEXT.as_bytes())
        .unwrap();
    let _ = service.login(&mut rng, &nonce, &sig).unwrap();
    assert!(matches!(
        service.login(&mut rng, &nonce, &sig),
        Err(Error::UnknownNonce)
    ));

    // A signature in another context is not accepted, and the nonce is burnt anyway.
    let nonce = service.issue_nonce(&mut rng).unwrap();
    let (wrong, _) = configs[1]
        .sign(&FakeSigner, &mut rng, nonce.as_bytes(), b"some other event")
        .unwrap();
    assert!(matches!(
        service.login(&mut rng, &nonce, &wrong),
        Err(Error::SignatureRejected)
    ));
    assert!(matches!(
        service.login(&mut rng, &nonce, &Signature::default()),
        Err(Error::UnknownNonce)
    ));

    assert!(matches!(
        service.vote(&Token::new(vec![0; 32]), 1, true),
        Err(Error::UnknownSession)
    ));
    assert!(matches!(
        service.tracks(&Token::new(vec![0; 32])),
        Err(Error::UnknownSession)
    ));
}

#[test]
fn ring_signatures_drive_the_service() {
    let mut rng = seeded_rng();
    let (statement, configs) = joined(&mut rng, 3);
    let signer = LinkableRingSigner;
    let service =
        VotingService::new(signer, &statement, CONTEXT, VoteLedger::new(tracks(&[8]))).unwrap();

    for config in &configs {
        let session = login(&mut rng, &service, &signer, config);
        service.vote(&session, 8, true).unwrap();
    }
    let session = login(&mut rng, &service, &signer, &configs[2]);
    assert!(matches!(
        service.vote(&session, 8, true),
        Err(Error::DuplicateIdenticalVote(8))
    ));

    let view = service.tracks(&session).unwrap();
    assert_eq!(view[0].up, configs.len());
}

#[test]
fn concurrent_voters_share_one_service() {
    let mut rng = seeded_rng();
    let (statement, configs) = joined(&mut rng, 8);
    let service = Arc::new(
        VotingService::new(FakeSigner, &statement, CONTEXT, VoteLedger::new(tracks(&[8])))
            .unwrap(),
    );
    let sessions: Vec<Token> = configs
        .iter()
        .map(|config| login(&mut rng, &service, &FakeSigner, config))
        .collect();

    let handles: Vec<_> = sessions
        .into_iter()
        .map(|session| {
            let service = Arc::clone(&service);
            thread::spawn(move || service.vote(&session, 8, true))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(service.ledger().entry(8).unwrap().tally(), (configs.len(), 0));
}

#[test]
fn services_resume_from_saved_files() {
    let mut rng = seeded_rng();
    let (statement, configs) = joined(&mut rng, 2);
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        config_dir: dir.path().to_path_buf(),
        ..Settings::default()
    };
    fs::write(
        settings.schedule_file(),
        serde_json::to_vec(&tracks(&[1, 8])).unwrap(),
    )
    .unwrap();

    let service = VotingService::from_settings(FakeSigner, &statement, &settings).unwrap();
    let session = login(&mut rng, &service, &FakeSigner, &configs[0]);
    service.vote(&session, 8, true).unwrap();
    let pending = service.issue_nonce(&mut rng).unwrap();
    drop(service);

    let restarted = VotingService::from_settings(FakeSigner, &statement, &settings).unwrap();
    assert_eq!(restarted.ledger().entry(8).unwrap().tally(), (1, 0));
    assert!(restarted.sessions().has_session(&session));

    // Session bindings are not persisted; the attendee logs in again with the saved nonce.
    assert!(matches!(
        restarted.vote(&session, 8, true),
        Err(Error::UnknownSession)
    ));
    let (sig, _) = configs[0]
        .sign(&FakeSigner, &mut rng, pending.as_bytes(), CONTEXT.as_bytes())
        .unwrap();
    let session = restarted.login(&mut rng, &pending, &sig).unwrap();
    assert!(matches!(
        restarted.vote(&session, 8, true),
        Err(Error::DuplicateIdenticalVote(8))
    ));
}

#[test]
fn failed_saves_leave_no_trace() {
    let mut rng = seeded_rng();
    let (statement, configs) = joined(&mut rng, 1);
    let dir = tempfile::tempdir().unwrap();
    let service =
        VotingService::new(FakeSigner, &statement, CONTEXT, VoteLedger::new(tracks(&[1])))
            .unwrap()
            .persist_to(dir.path().to_path_buf(), dir.path().join("sessions.json"));

    let session = login(&mut rng, &service, &FakeSigner, &configs[0]);
    assert!(matches!(
        service.vote(&session, 1, true),
        Err(Error::Persist(_))
    ));
    assert!(matches!(
        service.vote(&session, 1, true),
        Err(Error::Persist(_))
    ));
    assert_eq!(service.tracks(&session).unwrap()[0].up, 0);

    // Tokens that can't be saved are never handed out.
    let broken =
        VotingService::new(FakeSigner, &statement, CONTEXT, VoteLedger::new(tracks(&[1])))
            .unwrap()
            .persist_to(dir.path().join("votes.json"), dir.path().to_path_buf());
    assert!(matches!(
        broken.issue_nonce(&mut rng),
        Err(Error::Persist(_))
    ));
    assert!(broken.sessions().snapshot().nonces.is_empty());
}

#[test]
fn old_sessions_retire_after_many_logins() {
    let mut rng = seeded_rng();
    let (statement, configs) = joined(&mut rng, 2);
    let service =
        VotingService::new(FakeSigner, &statement, CONTEXT, VoteLedger::new(tracks(&[1])))
            .unwrap();

    let bob = login(&mut rng, &service, &FakeSigner, &configs[1]);
    let first = login(&mut rng, &service, &FakeSigner, &configs[0]);
    let newest: Vec<Token> = (0..SESSIONS_PER_TAG)
        .map(|_| login(&mut rng, &service, &FakeSigner, &configs[0]))
        .collect();

    assert!(matches!(
        service.tracks(&first),
        Err(Error::UnknownSession)
    ));
    for session in &newest {
        assert!(service.tracks(session).is_ok());
    }
    service.vote(&bob, 1, true).unwrap();
}

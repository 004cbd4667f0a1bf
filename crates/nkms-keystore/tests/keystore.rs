//! End-to-end behaviour of the keystore over real SQLite databases.

use std::thread;

use proptest::prelude::*;

use nkms_keystore::core::{
    compose, Fingerprint, Hrac, KFrag, PublicKey, SigningKeypair, KFRAG_LENGTH,
};
use nkms_keystore::{Engine, KeyStore, Store, StoreConfig, StoreError};
use nkms_keystore_testkit::generators::{self, ContractParams};
use nkms_keystore_testkit::{encrypting_key, random_kfrag, TestFixture};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

// ─────────────────────────────────────────────────────────────────────────────
// Keys
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn get_key_after_add_key_reconstructs_bytes() {
    let mut keystore = KeyStore::open_memory().unwrap();
    let alice = SigningKeypair::generate();

    for key in [PublicKey::Signing(alice.public_key()), encrypting_key()] {
        let fingerprint = Fingerprint::of(key.as_bytes());
        assert!(keystore.get_key(&fingerprint).unwrap_err().is_not_found());

        let stored = keystore.add_key(&key).unwrap();
        assert_eq!(stored.fingerprint, fingerprint);
        assert_eq!(stored.is_signing, key.is_signing());

        let loaded = keystore.get_key(&fingerprint).unwrap();
        assert_eq!(loaded.as_bytes(), key.as_bytes());
        assert_eq!(loaded, key);
    }
}

#[test]
fn del_key_then_get_key_is_not_found() {
    let mut keystore = KeyStore::open_memory().unwrap();
    let key = encrypting_key();
    let fingerprint = keystore.add_key(&key).unwrap().fingerprint;

    keystore.del_key(&fingerprint).unwrap();
    assert!(matches!(
        keystore.get_key(&fingerprint),
        Err(StoreError::NotFound(_))
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_stored_key_round_trips(key in generators::public_key()) {
        let mut keystore = KeyStore::open_memory().unwrap();
        let stored = keystore.add_key(&key).unwrap();
        prop_assert_eq!(keystore.get_key(&stored.fingerprint).unwrap(), key);
    }

    #[test]
    fn any_contract_round_trips(params: ContractParams) {
        let mut keystore = KeyStore::open_memory().unwrap();
        let terms = params.terms();
        keystore.add_policy_contract(terms.clone()).unwrap();

        let contract = keystore.get_policy_contract(&terms.hrac).unwrap();
        prop_assert_eq!(contract.expiration, terms.expiration);
        prop_assert_eq!(contract.deposit, terms.deposit);
        prop_assert_eq!(contract.alice_signature, terms.alice_signature);
        prop_assert!(contract.kfrag.is_none());
        if params.signed {
            prop_assert!(contract.verify_alice_signature().is_ok());
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Policy contracts
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn unknown_hrac_is_not_found() {
    let mut fixture = TestFixture::new();
    let err = fixture
        .keystore
        .get_policy_contract(&Hrac::from(b"missing"))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn new_contract_has_no_kfrag() {
    let mut fixture = TestFixture::new();
    let hrac = fixture.hrac(b"/files/report.pdf");
    fixture.make_policy(hrac.clone(), 250);

    let contract = fixture.keystore.get_policy_contract(&hrac).unwrap();
    assert_eq!(contract.kfrag, None);
    assert_eq!(contract.deposit, 250);
    assert_eq!(contract.alice_signature, None);
}

#[test]
fn del_policy_contract_removes_it() {
    let mut fixture = TestFixture::new();
    fixture.make_policy(b"H1", 1);

    fixture
        .keystore
        .del_policy_contract(&Hrac::from(b"H1"))
        .unwrap();
    assert!(fixture
        .keystore
        .get_policy_contract(&Hrac::from(b"H1"))
        .unwrap_err()
        .is_not_found());

    // Alice's key outlives the contract.
    let alice = Fingerprint::of(fixture.alice_key().as_bytes());
    assert!(fixture.keystore.get_key(&alice).is_ok());
}

#[test]
fn attach_kfrag_scenario() {
    init_tracing();
    let mut fixture = TestFixture::new();
    let expiration = 1_893_456_000_000;
    let hrac = Hrac::from(b"H1");
    let terms =
        nkms_keystore::NewPolicyContract::new(hrac.clone(), expiration, 100, fixture.alice_key());

    fixture.keystore.add_policy_contract(terms).unwrap();

    let kfrag = KFrag::from_bytes(&[0x5a; KFRAG_LENGTH]).unwrap();
    fixture
        .keystore
        .attach_kfrag_to_saved_contract(&fixture.alice, &hrac, &kfrag)
        .unwrap();

    let contract = fixture.keystore.get_policy_contract(&hrac).unwrap();
    assert_eq!(contract.expiration, expiration);
    assert_eq!(contract.deposit, 100);
    assert_eq!(contract.kfrag, Some(kfrag));
    assert!(contract
        .kfrag
        .iter()
        .all(|k| k.as_bytes() == &[0x5a; KFRAG_LENGTH]));
}

#[test]
fn attach_kfrag_from_impostor_is_suspicious() {
    init_tracing();
    let mut fixture = TestFixture::new();
    let hrac = fixture.hrac(b"/inbox");
    fixture.make_policy(hrac.clone(), 10);

    // Bob claims to be the delegator.
    let err = fixture
        .keystore
        .attach_kfrag_to_saved_contract(&fixture.bob, &hrac, &random_kfrag())
        .unwrap_err();
    assert!(matches!(err, StoreError::SuspiciousActivity { .. }));
    assert!(!err.is_not_found());

    let contract = fixture.keystore.get_policy_contract(&hrac).unwrap();
    assert_eq!(contract.kfrag, None);
}

#[test]
fn impostor_cannot_overwrite_attached_kfrag() {
    let mut fixture = TestFixture::new();
    let hrac = fixture.hrac(b"/inbox");
    fixture.make_policy(hrac.clone(), 10);

    let kfrag = random_kfrag();
    fixture
        .keystore
        .attach_kfrag_to_saved_contract(&fixture.alice, &hrac, &kfrag)
        .unwrap();

    let mallory = SigningKeypair::generate();
    assert!(fixture
        .keystore
        .attach_kfrag_to_saved_contract(&mallory, &hrac, &random_kfrag())
        .unwrap_err()
        .is_suspicious());

    let contract = fixture.keystore.get_policy_contract(&hrac).unwrap();
    assert_eq!(contract.kfrag, Some(kfrag));
}

#[test]
fn attach_signed_kfrag_splits_blob() {
    let mut fixture = TestFixture::new();
    let hrac = fixture.hrac(b"/photos");
    fixture.make_policy(hrac.clone(), 1);

    let kfrag = random_kfrag();
    let signature = fixture.alice.sign(kfrag.as_bytes());
    let blob = compose(&signature, &kfrag);

    let returned = fixture
        .keystore
        .attach_signed_kfrag(&fixture.alice, &hrac, &blob)
        .unwrap();
    assert_eq!(returned, signature);
    fixture
        .alice_key()
        .verify(kfrag.as_bytes(), &returned)
        .unwrap();

    let contract = fixture.keystore.get_policy_contract(&hrac).unwrap();
    assert_eq!(contract.kfrag, Some(kfrag));
}

#[test]
fn attach_malformed_blob_leaves_contract_untouched() {
    let mut fixture = TestFixture::new();
    let hrac = fixture.hrac(b"/photos");
    fixture.make_policy(hrac.clone(), 1);

    let err = fixture
        .keystore
        .attach_signed_kfrag(&fixture.alice, &hrac, &[0u8; 100])
        .unwrap_err();
    assert!(matches!(err, StoreError::Core(_)));
    assert_eq!(
        fixture.keystore.get_policy_contract(&hrac).unwrap().kfrag,
        None
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Workorders
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn workorder_lifecycle() {
    let mut fixture = TestFixture::new();
    let hrac = fixture.hrac(b"/stream");

    for i in 0..3 {
        let workorder = fixture.make_workorder(&hrac, format!("request {}", i).as_bytes());
        assert_eq!(workorder.hrac, hrac);
    }

    let workorders = fixture.keystore.get_workorders(&hrac).unwrap();
    assert_eq!(workorders.len(), 3);
    workorders[1].verify(b"request 1").unwrap();
    assert!(workorders[1].verify(b"request 2").is_err());

    assert_eq!(fixture.keystore.del_workorders(&hrac).unwrap(), 3);
    assert!(fixture
        .keystore
        .get_workorders(&hrac)
        .unwrap_err()
        .is_not_found());
}

#[test]
fn workorder_creates_requester_key_once() {
    let mut fixture = TestFixture::new();
    let hrac = fixture.hrac(b"/stream");
    let bob = Fingerprint::of(fixture.bob_key().as_bytes());

    assert!(fixture.keystore.get_key(&bob).unwrap_err().is_not_found());

    let first = fixture.make_workorder(&hrac, b"a");
    let second = fixture.make_workorder(&hrac, b"b");
    assert_eq!(first.bob_pubkey_sig.id, second.bob_pubkey_sig.id);

    assert_eq!(
        fixture.keystore.get_key(&bob).unwrap(),
        PublicKey::Signing(fixture.bob_key())
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Sessions and durability
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn data_survives_reopening_file_engine() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::file(dir.path().join("keystore.db"));
    let alice = SigningKeypair::generate();
    let kfrag = random_kfrag();

    {
        let mut keystore = KeyStore::open(&config).unwrap();
        keystore
            .add_policy_contract(nkms_keystore::NewPolicyContract::new(
                b"H1",
                42,
                7,
                alice.public_key(),
            ))
            .unwrap();
        keystore
            .attach_kfrag_to_saved_contract(&alice, &Hrac::from(b"H1"), &kfrag)
            .unwrap();
    }

    let mut keystore = KeyStore::open(&config).unwrap();
    let contract = keystore.get_policy_contract(&Hrac::from(b"H1")).unwrap();
    assert_eq!(contract.expiration, 42);
    assert_eq!(contract.deposit, 7);
    assert_eq!(contract.kfrag, Some(kfrag));
}

#[test]
fn concurrent_sessions_each_commit() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::from_config(&StoreConfig::file(dir.path().join("keystore.db"))).unwrap();
    let hrac = Hrac::from(b"shared");

    let handles: Vec<_> = (0..4u8)
        .map(|i| {
            let engine = engine.clone();
            let hrac = hrac.clone();
            thread::spawn(move || {
                let mut session = engine.open_session().unwrap();
                let bob = SigningKeypair::from_seed(&[i; 32]);
                for n in 0..5u8 {
                    let signature = bob.sign(&[n]);
                    session
                        .add_workorder(&bob.public_key(), &signature, &hrac)
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let mut keystore = KeyStore::new(engine).unwrap();
    assert_eq!(keystore.get_workorders(&hrac).unwrap().len(), 20);
    assert_eq!(keystore.del_workorders(&hrac).unwrap(), 20);
}

#[test]
fn concurrent_sessions_on_default_memory_engine() {
    let mut keystore = KeyStore::open(&StoreConfig::memory()).unwrap();
    let hrac = Hrac::from(b"shared");

    let handles: Vec<_> = (0..8u8)
        .map(|i| {
            let mut session = keystore.open_session().unwrap();
            let hrac = hrac.clone();
            thread::spawn(move || {
                let bob = SigningKeypair::from_seed(&[i; 32]);
                for n in 0..50u8 {
                    let signature = bob.sign(&[n]);
                    session
                        .add_workorder(&bob.public_key(), &signature, &hrac)
                        .unwrap();
                    session.get_workorders(&hrac).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(keystore.get_workorders(&hrac).unwrap().len(), 400);
}

#[test]
fn generic_over_store() {
    fn revoke(store: &mut impl Store, hrac: &Hrac) -> nkms_keystore::Result<usize> {
        store.del_policy_contract(hrac)?;
        store.del_workorders(hrac)
    }

    let mut fixture = TestFixture::new();
    let hrac = fixture.hrac(b"/revoked");
    fixture.make_policy(hrac.clone(), 1);
    fixture.make_workorder(&hrac, b"x");

    let mut session = fixture.keystore.open_session().unwrap();
    assert_eq!(revoke(&mut session, &hrac).unwrap(), 1);
    assert!(fixture
        .keystore
        .get_policy_contract(&hrac)
        .unwrap_err()
        .is_not_found());
}

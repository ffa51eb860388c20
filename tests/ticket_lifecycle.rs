//! Issuance and verification flows across the public API

use std::{collections::HashSet, sync::Arc};

use fsg_tickets::*;
use hex_literal::hex;
use rand_core::{OsRng, RngCore};

const SALT: [u8; 32] = [0x5c; 32];

fn keys(profile: SecurityProfile) -> KeyMaterial {
    KeyMaterial::initialize(profile, Some(vec![0x17; profile.key_len()]), Some(SALT.to_vec())).unwrap()
}

fn verifier(keys: KeyMaterial, catalog: Option<SeedCatalog>) -> TicketVerifier<()> {
    TicketVerifier::new(
        Arc::new(keys),
        catalog.map(Arc::new),
        Arc::new(RateLimiter::new(RateLimitConfig::unlimited())),
        PeriodWindows::default(),
    )
}

#[test]
fn live_dead_invalid_lifecycle() {
    let profile = SecurityProfile::QuantumResistant;
    let v = verifier(keys(profile), None);
    let ts = Timestamp(1000);
    let ticket = seal_ticket(v.keys(), profile, Item::from_i64(42), 7, ts).unwrap();
    assert_eq!(ticket.len(), 69);
    assert!(ticket.starts_with("4-"));

    let seven = CategoryNumber::new(7).unwrap();
    let live = v.verify(&(), &ticket, Item::from_i64(42), Some(seven), Timestamp(1001));
    assert_eq!(live.verdict, Verdict::Valid);
    assert_eq!(live.period, Period::Live);
    let t = live.ticket.unwrap();
    assert_eq!((t.item, t.category, t.timestamp), (Item::from_i64(42), 7, ts));

    let dead = v.verify(&(), &ticket, Item::from_i64(42), Some(seven), Timestamp(1000 + 57_601));
    assert_eq!(dead.verdict, Verdict::Valid);
    assert_eq!(dead.period, Period::Dead);

    let expired = v.verify(&(), &ticket, Item::from_i64(42), Some(seven), Timestamp(1000 + 9_676_801));
    assert_eq!(expired.verdict, Verdict::Rejected);
    assert_eq!(expired.failure, Some(VerifyFailure::PeriodInvalid));

    let early = v.verify(&(), &ticket, Item::from_i64(42), None, Timestamp(999));
    assert_eq!(early.failure, Some(VerifyFailure::PeriodInvalid));
}

#[test]
fn known_answer_ciphertext() {
    let profile = SecurityProfile::QuantumResistant;
    let key: Vec<u8> = (0u8..32).collect();
    let k = KeyMaterial::initialize(profile, Some(key), Some(b"fsg-conformance-salt-0123456789ab".to_vec())).unwrap();
    let ticket = seal_ticket(&k, profile, Item::from_i64(42), 7, Timestamp(1000)).unwrap();
    let (sealed, parsed) = from_display_string(&ticket).unwrap();
    assert_eq!(parsed, profile);
    assert_eq!(
        sealed,
        hex!("13ca96bff2330e93 8432aa862bc759cb 06bb5bd2b41a9ef6 f432232eca8f32a4").to_vec()
    );
}

#[test]
fn wrong_claims_are_rejected() {
    let profile = SecurityProfile::High;
    let v = verifier(keys(profile), None);
    let ticket = seal_ticket(v.keys(), profile, Item::from_i64(-3), 200, Timestamp(50)).unwrap();

    let r = v.verify(&(), &ticket, Item::from_i64(3), None, Timestamp(51));
    assert_eq!(r.failure, Some(VerifyFailure::SeedMismatch));
    assert!(r.ticket.is_none());

    let r = v.verify(&(), &ticket, Item::from_i64(-3), Some(CategoryNumber::new(201).unwrap()), Timestamp(51));
    assert_eq!(r.failure, Some(VerifyFailure::CategoryMismatch));

    let r = v.verify(&(), "3-not-a-ticket", Item::from_i64(-3), None, Timestamp(51));
    assert_eq!(r.failure, Some(VerifyFailure::Decode));
}

#[test]
fn catalog_membership_is_checked() {
    let profile = SecurityProfile::Medium;
    let catalog = SeedCatalog::new(vec![
        CategoryRecord::new(3, "https://three", "Three", vec![Item::from_i64(30)]).unwrap(),
    ])
    .unwrap();
    let v = verifier(keys(profile), Some(catalog));

    let good = seal_ticket(v.keys(), profile, Item::from_i64(30), 3, Timestamp(10)).unwrap();
    let r = v.verify(&(), &good, Item::from_i64(30), None, Timestamp(10));
    assert!(r.is_valid());
    assert!(r.ticket.unwrap().catalog_checked);

    // Authentic, but the seed does not belong to the category
    let stray = seal_ticket(v.keys(), profile, Item::from_i64(31), 3, Timestamp(10)).unwrap();
    let r = v.verify(&(), &stray, Item::from_i64(31), None, Timestamp(10));
    assert_eq!(r.failure, Some(VerifyFailure::CategoryMismatch));
}

#[test]
fn without_salt_only_structure_is_checked() {
    let profile = SecurityProfile::QuantumResistant;
    let full = keys(profile);
    let ticket = seal_ticket(&full, profile, Item::from_i64(9), 1, Timestamp(500)).unwrap();

    let v = verifier(KeyMaterial::verify_only(profile, full.cipher_key().to_vec()).unwrap(), None);
    let r = v.verify(&(), &ticket, Item::from_i64(9), None, Timestamp(500));
    assert_eq!(r.verdict, Verdict::StructuralOnly);
    assert!(r.is_accepted());
    assert!(!r.is_valid());
}

#[test]
fn category_above_range_is_rejected() {
    assert!(matches!(CategoryNumber::new(226), Err(TicketError::CategoryOutOfRange(226))));
    assert!(CategoryNumber::new(225).is_ok());
    assert!(CategoryRecord::new(226, "u", "n", vec![]).is_err());
}

#[test]
fn random_strings_do_not_verify() {
    // Syntactically valid strings with random payloads
    for profile in SecurityProfile::ALL {
        let k = keys(profile);
        let mut accepted = 0usize;
        for _ in 0..2000 {
            let mut payload = vec![0u8; profile.total_len()];
            OsRng.fill_bytes(&mut payload);
            let forged = to_display_string(&payload, profile).unwrap();
            if open_ticket(&k, &forged).is_ok() {
                accepted += 1;
            }
        }
        // A 24-bit tag admits roughly one forgery in sixteen million tries
        let allowed = if profile.block_count() == 1 { 1 } else { 0 };
        assert!(accepted <= allowed, "{profile}: {accepted} forged tickets accepted");
    }
}

#[test]
fn concurrent_issuance_yields_unique_timestamps() {
    let catalog = SeedCatalog::new(vec![
        CategoryRecord::new(0, "https://zero", "Zero", (0..64).map(Item::from_i64).collect()).unwrap(),
    ])
    .unwrap();
    let profile = SecurityProfile::QuantumResistant;
    let issuer = TicketIssuer::with_clock(
        Arc::new(keys(profile)),
        Arc::new(catalog),
        Arc::new(RateLimiter::new(RateLimitConfig::unlimited())),
        profile,
        Arc::new(TicketClock::new(ManualClock::at(Timestamp(2_000)))),
    )
    .unwrap();

    let stamps: Vec<Timestamp> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8u32)
            .map(|id| {
                let issuer = &issuer;
                s.spawn(move || {
                    (0..25).map(|_| issuer.issue(&id).unwrap().timestamp).collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
    });
    let unique: HashSet<_> = stamps.iter().copied().collect();
    assert_eq!(unique.len(), 200);
    assert!(stamps.iter().all(|t| t.units() >= 2_000));
}

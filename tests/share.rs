//! Share Link Integration Tests
//!
//! Any change to the signed path, expiry or signature must invalidate a link.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use professor::share::{sign, validate, LinkRejection, ShareService};

const SECRET: &[u8] = b"lecture-hall-secret";

fn split(signed: &str) -> (String, i64, String) {
    let (path, query) = signed.split_once('?').unwrap();
    let mut exp = None;
    let mut sig = None;
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some(("exp", value)) => exp = Some(value.parse().unwrap()),
            Some(("sig", value)) => sig = Some(value.to_string()),
            _ => {}
        }
    }
    (path.to_string(), exp.unwrap(), sig.unwrap())
}

/// Every single-character substitution of `s` drawn from `alphabet`
fn mutations(s: &str, alphabet: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut out = Vec::new();
    for i in 0..chars.len() {
        for replacement in alphabet.chars().filter(|c| *c != chars[i]).take(3) {
            let mut mutated = chars.clone();
            mutated[i] = replacement;
            out.push(mutated.into_iter().collect());
        }
    }
    out
}

#[test]
fn test_signed_link_validates() {
    let signed = sign("/pdf/abc-123", 1_900_000_000, SECRET);
    let (path, exp, sig) = split(&signed);

    assert_eq!(path, "/pdf/abc-123");
    assert_eq!(exp, 1_900_000_000);
    assert!(validate(&path, exp, &sig, SECRET));
}

#[test]
fn test_any_signature_flip_is_rejected() {
    let (path, exp, sig) = split(&sign("/pdf/abc-123", 1_900_000_000, SECRET));
    let alphabet = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

    for forged in mutations(&sig, alphabet) {
        assert!(!validate(&path, exp, &forged, SECRET), "accepted {forged}");
    }
}

#[test]
fn test_any_path_flip_is_rejected() {
    let (path, exp, sig) = split(&sign("/pdf/abc-123", 1_900_000_000, SECRET));

    for forged in mutations(&path, "/abcdef0123456789-.") {
        assert!(!validate(&forged, exp, &sig, SECRET), "accepted {forged}");
    }
}

#[test]
fn test_changed_expiry_is_rejected() {
    let (path, exp, sig) = split(&sign("/pdf/abc-123", 1_900_000_000, SECRET));

    assert!(!validate(&path, exp + 1, &sig, SECRET));
    assert!(!validate(&path, exp - 1, &sig, SECRET));
}

#[test]
fn test_other_secret_is_rejected() {
    let (path, exp, sig) = split(&sign("/pdf/abc-123", 1_900_000_000, SECRET));

    assert!(!validate(&path, exp, &sig, b"another-secret"));
    assert!(!validate(&path, exp, &sig, b""));
}

#[test]
fn test_service_links_expire_after_ttl() {
    let service = ShareService::new(SECRET, "https://lectures.example.com", Duration::from_secs(60));
    let issued_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let link = service.issue_at("abc-123", issued_at);

    let within = Utc.timestamp_opt(1_700_000_059, 0).unwrap();
    assert!(service.verify_url(&link.url, within).is_ok());

    let after = Utc.timestamp_opt(1_700_000_061, 0).unwrap();
    assert_eq!(
        service.verify_url(&link.url, after),
        Err(LinkRejection::Expired {
            expired_at: 1_700_000_060
        })
    );

    // A link from another deployment never verifies here
    let other = ShareService::new("different", "https://lectures.example.com", Duration::from_secs(60));
    assert_eq!(
        other.verify_url(&link.url, within),
        Err(LinkRejection::InvalidSignature)
    );
}

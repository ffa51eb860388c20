//! Runs the `fsg-ticket` binary: generate a ticket, then validate it with
//! good and bad claims.

use std::{
    path::PathBuf,
    process::{Command, Output},
};

const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
const SALT: &str = "fsg-conformance-salt-0123456789ab";
const INVALID_EXIT: i32 = 127;

fn fsg_ticket_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_fsg-ticket"))
}

fn run(args: &[&str]) -> Output {
    Command::new(fsg_ticket_bin()).args(args).output().expect("spawn fsg-ticket")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn generate(seed: &str, cat: &str, time: &str) -> String {
    let out = run(&["generate", "--seed", seed, "--cat", cat, "--time", time, "--key", KEY, "--salt", SALT]);
    assert!(out.status.success(), "generate failed: {}", String::from_utf8_lossy(&out.stderr));
    let text = stdout(&out);
    assert!(text.contains(&format!("Here is a ticket for seed {seed}:")));
    text.lines()
        .find_map(|l| l.trim().strip_prefix("TICKET:"))
        .map(|t| t.trim().to_owned())
        .expect("TICKET line")
}

#[test]
fn generated_ticket_validates_live() {
    let ticket = generate("42", "7", "1000");
    assert_eq!(ticket.len(), 69);
    assert!(ticket.starts_with("4-"));

    let out = run(&[
        "validate", "--ticket", &ticket, "--seed", "42", "--cat", "7", "--time", "1001", "--key", KEY, "--salt",
        SALT,
    ]);
    assert_eq!(out.status.code(), Some(0));
    let text = stdout(&out);
    assert!(text.contains("The ticket is LIVE"));
    assert!(text.contains("SEED: 42"));
    assert!(text.contains("CAT: 7"));
    assert!(!text.contains("WARNING"));
}

#[test]
fn negative_seed_round_trips() {
    let ticket = generate("-5", "0", "20");
    let out = run(&["validate", "--ticket", &ticket, "--seed", "-5", "--time", "21", "--key", KEY, "--salt", SALT]);
    assert_eq!(out.status.code(), Some(0));
    assert!(stdout(&out).contains("SEED: -5"));
}

#[test]
fn wrong_seed_exits_127() {
    let ticket = generate("42", "7", "1000");
    let out = run(&["validate", "--ticket", &ticket, "--seed", "43", "--time", "1001", "--key", KEY, "--salt", SALT]);
    assert_eq!(out.status.code(), Some(INVALID_EXIT));
    let text = stdout(&out);
    assert!(text.contains("The ticket is INVALID/EXPIRED!"));
    assert!(text.contains("REASON:"));
}

#[test]
fn undecodable_ticket_exits_127() {
    for bad in ["4-zzzz", "9-0011223344556677-8899aabbccddeeff"] {
        let out = run(&["validate", "--ticket", bad, "--seed", "42", "--key", KEY, "--salt", SALT]);
        assert_eq!(out.status.code(), Some(INVALID_EXIT), "ticket {bad:?}");
        assert!(stdout(&out).contains("INVALID/EXPIRED"));
    }
}

#[test]
fn expired_ticket_exits_127() {
    let ticket = generate("42", "7", "1000");
    let out = run(&[
        "validate", "--ticket", &ticket, "--seed", "42", "--time", "9677801", "--key", KEY, "--salt", SALT,
    ]);
    assert_eq!(out.status.code(), Some(INVALID_EXIT));
}

#[test]
fn missing_salt_warns_but_passes() {
    let ticket = generate("42", "7", "1000");
    let out = run(&["validate", "--ticket", &ticket, "--seed", "42", "--time", "1001", "--key", KEY]);
    assert_eq!(out.status.code(), Some(0));
    let text = stdout(&out);
    assert!(text.contains("The ticket is LIVE"));
    assert!(text.contains(" WARNING: No value for the salt was provided, so this could be a forged ticket."));
}

#[test]
fn bad_key_is_an_error_not_an_invalid_ticket() {
    let out = run(&["validate", "--ticket", "4-00", "--key", "abcd"]);
    assert!(!out.status.success());
    assert_ne!(out.status.code(), Some(INVALID_EXIT));
    assert!(String::from_utf8_lossy(&out.stderr).contains("invalid key"));
}

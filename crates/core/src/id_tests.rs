// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashSet;
use yare::parameterized;

#[test]
fn generated_token_is_32_hex_chars() {
    let token = SessionToken::generate();
    assert_eq!(token.as_str().len(), 32);
    assert_eq!(SessionToken::parse(token.as_str()), Ok(token));
}

#[test]
fn generated_tokens_differ() {
    let tokens: HashSet<_> = (0..256).map(|_| SessionToken::generate()).collect();
    assert_eq!(tokens.len(), 256);
}

#[test]
fn short_truncates() {
    let token = SessionToken::parse("abcdef0123456789abcdef0123456789").unwrap();
    assert_eq!(token.short(4), "abcd");
    assert_eq!(token.short(64), token.as_str());
}

#[test]
fn short_stops_on_char_boundary() {
    let token = SessionToken("ab\u{e9}\u{e9}cd".to_string());
    assert_eq!(token.short(3), "ab\u{e9}");
    assert_eq!(token.short(8), "ab\u{e9}\u{e9}cd");
}

#[test]
fn token_serializes_as_plain_string() {
    let token = SessionToken::from_seed(0xff);
    let json = serde_json::to_string(&token).unwrap();
    assert_eq!(json, "\"000000000000000000000000000000ff\"");
    assert_eq!(serde_json::from_str::<SessionToken>(&json).unwrap(), token);
}

#[parameterized(
    parent_dir = { "../escaped" },
    absolute = { "/etc/passwd" },
    uppercase = { "ABCDEF0123456789ABCDEF0123456789" },
    too_short = { "5e55" },
    too_long = { "0123456789abcdef0123456789abcdef0" },
    empty = { "" },
    non_ascii = { "aaaaaaaaaaaaaaaaaaaaaaaaaaaaa\u{e9}a" },
    separator = { "0123456789abcdef/123456789abcdef" },
)]
fn malformed_token_is_rejected(raw: &str) {
    assert_eq!(SessionToken::parse(raw), Err(InvalidSessionToken(raw.to_string())));
    let json = serde_json::to_string(raw).unwrap();
    assert!(serde_json::from_str::<SessionToken>(&json).is_err());
}

#[test]
fn builder_id_serializes_as_integer() {
    assert_eq!(serde_json::to_string(&BuilderId(7)).unwrap(), "7");
    assert_eq!(BuilderId(7).to_string(), "7");
}

// medallion-core/src/domain/canonical.rs
//
// Canonical JSON + SHA-256. Struct fields serialize in declaration order and
// every map in the domain is a BTreeMap, so equal values give equal bytes.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Write;

pub fn to_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(value)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().fold(String::with_capacity(64), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

pub fn checksum<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    to_canonical_json(value).map(|bytes| sha256_hex(&bytes))
}

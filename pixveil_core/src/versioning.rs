//! Format revisions of the persisted side-channel artifacts.
//!
//! Every artifact document carries a `version` field. Readers accept exactly
//! the revision they were built for; a document written by any other revision
//! is refused before its payload is interpreted.

use serde::de::{Error as DeError, Unexpected};

pub const NOISE_MATRIX_VERSION: u16 = 1;
pub const PERMUTATION_INDICES_VERSION: u16 = 1;

pub fn expect_version<E: DeError>(
    found: u16,
    expected: u16,
    artifact: &'static str,
) -> Result<(), E> {
    if found == expected {
        return Ok(());
    }
    let wanted = format!("{artifact} format version {expected}");
    Err(E::invalid_value(
        Unexpected::Unsigned(u64::from(found)),
        &wanted.as_str(),
    ))
}

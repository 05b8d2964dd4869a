//! Content digest of a replace payload.
//!
//! SHA-256 over the canonical JSON of the module record followed by each unit
//! sorted by path. Unit order in the candidate does not matter.

use modex_core::module::{ModuleVersion, Unit};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::Result;

#[derive(Serialize)]
struct Payload<'a> {
  module: &'a ModuleVersion,
  units:  Vec<&'a Unit>,
}

pub fn compute_digest(module: &ModuleVersion, units: &[Unit]) -> Result<String> {
  let mut sorted: Vec<&Unit> = units.iter().collect();
  sorted.sort_by(|a, b| a.path.cmp(&b.path));

  let bytes = serde_json::to_vec(&Payload { module, units: sorted })?;
  Ok(hex::encode(Sha256::digest(&bytes)))
}

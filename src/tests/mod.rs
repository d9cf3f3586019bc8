// Tests module
// Defense invariants: rate enforcement, eviction, escalation, independence
// Reporting: idempotence and severity classification over engine state

pub mod defense_invariants;

//! Anti-collusion detection over a whole grading round.
//!
//! Workers are mutually distrusting and may copy each other, resubmit the
//! same answers under several identities, or pad submissions with junk. The
//! detectors in [`detector`] compare workers through lossy canonical keys
//! ([`canonical`]) so that trivial rewrites (reordering, case, leetspeak,
//! transliteration) do not hide duplication.
//!
//! Detection produces a [`CollusionSignal`](idgrade_core::CollusionSignal) per
//! worker; the caller applies it multiplicatively to the raw reward.

pub mod canonical;
pub mod detector;

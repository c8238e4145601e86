//! Address plausibility pipeline.
//!
//! A worker's addresses pass through four stages:
//!
//! ```text
//! FORMAT  ──fail──┐
//!   ↓ pass        │
//! REGION  ──fail──┤
//!   ↓ pass        ↓
//! GEOCODE ──→ SCORED
//! ```
//!
//! - [`format`]: structural checks (length, letters, digits, commas,
//!   disallowed characters).
//! - [`region`]: the candidate must lie in the seed's country or city.
//!   Countries and cities are extracted the same way on both sides, with the
//!   help of a [`gazetteer`].
//! - [`geocode`]: a small deterministic sample of addresses is resolved
//!   through a rate-limited, time-bounded [`geocode::GeocodeGate`].
//! - [`pipeline`]: ties the stages together and aggregates one score per
//!   worker.
//!
//! A failure in FORMAT or REGION for any address zeroes the worker's address
//! score and no external call is made.

pub mod format;
pub mod gazetteer;
pub mod geocode;
pub mod pipeline;
pub mod region;

//! Statistical summaries for grading rounds.
//!
//! # Modules
//!
//! - [`descriptive`]: min/max/mean/median/spread of a dataset, used to summarize
//!   raw and final rewards of a round.
//!
//! # Examples
//!
//! ```
//! use idgrade_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! ```

pub mod descriptive;

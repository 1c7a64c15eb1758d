//! # Pumpkin Job Shop
//! Schedules weighted job shops in which every operation occupies a number of interchangeable
//! resource slices for its whole duration.
//!
//! Jobs are ordered by [priority](priority::prioritise) and scheduled in groups by
//! [`decompose`]. Every group is modelled as a constraint optimisation problem by the
//! [`GroupModelBuilder`](model::GroupModelBuilder), which minimises
//! `10000 * makespan + sum(round(10000 * weight) * completion time)`, and solved by an
//! [`Engine`](engine::Engine). The [`PumpkinEngine`](engine::PumpkinEngine) uses the Pumpkin
//! solver.
//!
//! ```rust
//! # use pumpkin_jobshop::decompose;
//! # use pumpkin_jobshop::engine::PumpkinEngine;
//! # use pumpkin_jobshop::DecompositionOptions;
//! # use pumpkin_jobshop::Instance;
//! // One slice and one job with two operations, the second depending on the first.
//! let instance = Instance::parse("1\n1\n2\n1.0\n1 3 0\n1 2 1 1\n".as_bytes())
//!     .expect("valid instance");
//!
//! let decomposition = decompose(
//!     &instance,
//!     &DecompositionOptions::default(),
//!     &mut PumpkinEngine::default(),
//! )
//! .expect("the instance can be scheduled");
//!
//! let mut output = vec![];
//! decomposition
//!     .schedule
//!     .write(&mut output)
//!     .expect("writing to a vector succeeds");
//! assert_eq!(output, b"0 1\n3 1\n");
//! ```

pub mod availability;
pub mod decomposition;
pub mod engine;
mod error;
pub mod instance;
pub mod model;
pub mod priority;
pub mod schedule;

pub use availability::Availability;
pub use decomposition::decompose;
pub use decomposition::Decomposition;
pub use decomposition::DecompositionOptions;
pub use decomposition::GroupReport;
pub use error::JobShopError;
pub use error::JobShopResult;
pub use instance::Instance;
pub use instance::Job;
pub use instance::Operation;
pub use instance::ParseError;
pub use schedule::Schedule;
pub use schedule::ScheduleViolation;

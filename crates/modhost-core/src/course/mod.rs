//! # Modhost Course Modules
//!
//! Activity instances inside course sections and per-user completion.
//!
//! - [`sequence`]: [`SectionSequence`], the ordered module ids of a section.
//! - [`ledger`]: the grading ledger collaborator.
//! - [`enrollment`]: the enrollment collaborator behind `can_access`.
//! - [`manager`]: [`CourseModuleManager`].
pub mod enrollment;
pub mod error;
pub mod ledger;
pub mod manager;
pub mod sequence;

pub use enrollment::{EnrollmentCheck, StaticEnrollments};
pub use ledger::{GradingInfo, GradingLedger, RecordGradingLedger};
pub use manager::{CourseModuleManager, CourseModuleUpdate, CreatedModule, NewCourseModule};
pub use sequence::SectionSequence;

//! # Modhost Course System Errors
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CourseSystemError {
    #[error("Course module {0} not found")]
    ModuleNotFound(i64),

    #[error("Section {0} not found")]
    SectionNotFound(i64),

    #[error("Section {section} does not belong to course {course}")]
    SectionCourseMismatch { section: i64, course: i64 },

    #[error("Module '{module}' is not enabled")]
    PluginDisabled { module: String },

    #[error("Course module {before} is not in section {section}")]
    InvalidPosition { section: i64, before: i64 },

    #[error("Invalid section sequence '{0}'")]
    InvalidSequence(String),
}

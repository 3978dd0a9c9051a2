//! Enrollment collaborator.
use std::collections::HashSet;
use std::fmt::Debug;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::kernel::error::Result;

#[async_trait]
pub trait EnrollmentCheck: Send + Sync + Debug {
    async fn is_actively_enrolled(&self, user_id: i64, course_id: i64) -> Result<bool>;
}

/// Enrollments held in memory.
#[derive(Debug, Default)]
pub struct StaticEnrollments {
    active: RwLock<HashSet<(i64, i64)>>,
}

impl StaticEnrollments {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enroll(&self, user_id: i64, course_id: i64) {
        self.active.write().await.insert((user_id, course_id));
    }

    pub async fn unenroll(&self, user_id: i64, course_id: i64) {
        self.active.write().await.remove(&(user_id, course_id));
    }
}

#[async_trait]
impl EnrollmentCheck for StaticEnrollments {
    async fn is_actively_enrolled(&self, user_id: i64, course_id: i64) -> Result<bool> {
        Ok(self.active.read().await.contains(&(user_id, course_id)))
    }
}

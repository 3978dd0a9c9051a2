//! Grading ledger collaborator.
//!
//! Items are created only for modules that declare grading support and
//! deleted with every module instance. Calls happen inside
//! the store transaction of the module operation, so a ledger entry commits
//! or rolls back together with the course module.
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::kernel::error::Result;
use crate::storage::records::GradeItemRecord;
use crate::storage::StoreTransaction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingInfo {
    pub item_name: String,
    pub grade_max: f64,
    pub grade_pass: f64,
}

impl GradingInfo {
    pub fn new(item_name: impl Into<String>, grade_max: f64) -> Self {
        Self {
            item_name: item_name.into(),
            grade_max,
            grade_pass: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradeItemRequest {
    pub course_id: i64,
    pub course_module_id: i64,
    pub module_name: String,
    pub instance_id: i64,
    pub grading: GradingInfo,
}

pub trait GradingLedger: Send + Sync + Debug {
    fn create_item(&self, tx: &mut StoreTransaction<'_>, request: GradeItemRequest) -> Result<i64>;

    /// Returns false when the instance had no item.
    fn delete_item(&self, tx: &mut StoreTransaction<'_>, course_id: i64, module_name: &str, instance_id: i64)
        -> Result<bool>;
}

/// Keeps grade items in the record store.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordGradingLedger;

impl GradingLedger for RecordGradingLedger {
    fn create_item(&self, tx: &mut StoreTransaction<'_>, request: GradeItemRequest) -> Result<i64> {
        Ok(tx.insert_grade_item(GradeItemRecord {
            id: 0,
            course_id: request.course_id,
            course_module_id: request.course_module_id,
            module_name: request.module_name,
            instance_id: request.instance_id,
            item_name: request.grading.item_name,
            grade_max: request.grading.grade_max,
            grade_pass: request.grading.grade_pass,
        }))
    }

    fn delete_item(
        &self,
        tx: &mut StoreTransaction<'_>,
        course_id: i64,
        module_name: &str,
        instance_id: i64,
    ) -> Result<bool> {
        let item = tx.grade_item_for(course_id, module_name, instance_id).map(|g| g.id);
        Ok(match item {
            Some(id) => tx.delete_grade_item(id).is_some(),
            None => false,
        })
    }
}

//! Assignment activity module.
//!
//! Each instance is one plugin-owned row:
//!
//! ```json
//! { "course": 2, "name": "Essay", "intro": "...", "grade_max": 100.0,
//!   "grade_pass": 50.0, "submissions": { "17": "text" } }
//! ```
//!
//! Submissions arrive through the `submit` ajax action.
use std::sync::Arc;

use log::{debug, info};
use modhost_core::course::GradingInfo;
use modhost_core::kernel::error::{Error, Result as KernelResult};
use modhost_core::plugin_system::capability::{
    AccessType, CapabilityDefinition, CONTEXT_COURSE, CONTEXT_MODULE, RISK_PERSONAL, RISK_SPAM, RISK_XSS,
};
use modhost_core::plugin_system::traits::{ModuleFeatures, ModulePlugin, ModuleView, Plugin};
use modhost_core::plugin_system::PluginFactories;
use modhost_core::storage::records::{CourseModuleRecord, Records};
use modhost_core::storage::StoreTransaction;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const NAME: &str = "assign";
pub const COMPONENT: &str = "mod_assign";
const DEFAULT_GRADE_MAX: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub course: i64,
    pub name: String,
    #[serde(default)]
    pub intro: String,
    #[serde(default = "default_grade_max")]
    pub grade_max: f64,
    #[serde(default)]
    pub grade_pass: f64,
    #[serde(default)]
    pub submissions: Map<String, Value>,
}

fn default_grade_max() -> f64 {
    DEFAULT_GRADE_MAX
}

fn load(records: &Records, instance_id: i64) -> KernelResult<Assignment> {
    let row = records
        .plugin_row(COMPONENT, instance_id)
        .ok_or_else(|| Error::from(format!("assignment {} does not exist", instance_id)))?;
    serde_json::from_value(row.clone()).map_err(|e| Error::from(format!("assignment {} is corrupt: {}", instance_id, e)))
}

fn to_row(assignment: &Assignment) -> KernelResult<Value> {
    serde_json::to_value(assignment).map_err(|e| Error::from(format!("cannot store assignment: {}", e)))
}

fn non_empty_str<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

#[derive(Debug, Default)]
pub struct AssignModule;

impl Plugin for AssignModule {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Vec<CapabilityDefinition> {
        vec![
            CapabilityDefinition::new("mod/assign:addinstance", AccessType::Write, CONTEXT_COURSE)
                .with_risks(RISK_XSS),
            CapabilityDefinition::new("mod/assign:view", AccessType::Read, CONTEXT_MODULE),
            CapabilityDefinition::new("mod/assign:submit", AccessType::Write, CONTEXT_MODULE).with_risks(RISK_SPAM),
            CapabilityDefinition::new("mod/assign:grade", AccessType::Write, CONTEXT_MODULE)
                .with_risks(RISK_PERSONAL | RISK_XSS),
        ]
    }

    fn install(&self, tx: &mut StoreTransaction<'_>) -> KernelResult<()> {
        tx.set_setting(COMPONENT, "default_grade_max", json!(DEFAULT_GRADE_MAX));
        info!("Installed assignment defaults");
        Ok(())
    }

    fn upgrade(&self, tx: &mut StoreTransaction<'_>, old_version: i64, new_version: i64) -> KernelResult<()> {
        if tx.setting(COMPONENT, "default_grade_max").is_none() {
            tx.set_setting(COMPONENT, "default_grade_max", json!(DEFAULT_GRADE_MAX));
        }
        debug!("Assignment upgraded from {} to {}", old_version, new_version);
        Ok(())
    }
}

impl ModulePlugin for AssignModule {
    fn supported_features(&self) -> ModuleFeatures {
        ModuleFeatures {
            grade: true,
            completion_tracks_views: false,
            groups: true,
        }
    }

    fn add_instance(&self, tx: &mut StoreTransaction<'_>, course_id: i64, data: &Value) -> KernelResult<i64> {
        let name = non_empty_str(data, "name").ok_or_else(|| Error::from("assignment name is required"))?;
        let grade_max = data
            .get("grade_max")
            .and_then(Value::as_f64)
            .or_else(|| tx.setting(COMPONENT, "default_grade_max").and_then(Value::as_f64))
            .unwrap_or(DEFAULT_GRADE_MAX);
        let assignment = Assignment {
            course: course_id,
            name: name.to_string(),
            intro: non_empty_str(data, "intro").unwrap_or_default().to_string(),
            grade_max,
            grade_pass: data.get("grade_pass").and_then(Value::as_f64).unwrap_or(0.0),
            submissions: Map::new(),
        };
        let row = to_row(&assignment)?;
        Ok(tx.insert_plugin_row(COMPONENT, row))
    }

    fn update_instance(&self, tx: &mut StoreTransaction<'_>, instance_id: i64, data: &Value) -> KernelResult<()> {
        let mut assignment = load(tx, instance_id)?;
        if let Some(name) = non_empty_str(data, "name") {
            assignment.name = name.to_string();
        }
        if let Some(intro) = data.get("intro").and_then(Value::as_str) {
            assignment.intro = intro.to_string();
        }
        if let Some(grade_max) = data.get("grade_max").and_then(Value::as_f64) {
            assignment.grade_max = grade_max;
        }
        let row = to_row(&assignment)?;
        tx.update_plugin_row(COMPONENT, instance_id, row)
    }

    fn delete_instance(&self, tx: &mut StoreTransaction<'_>, instance_id: i64) -> KernelResult<()> {
        tx.delete_plugin_row(COMPONENT, instance_id).map(|_| ())
    }

    fn grading_info(&self, records: &Records, instance_id: i64) -> KernelResult<GradingInfo> {
        let assignment = load(records, instance_id)?;
        Ok(GradingInfo {
            item_name: assignment.name,
            grade_max: assignment.grade_max,
            grade_pass: assignment.grade_pass,
        })
    }

    fn view(&self, records: &Records, course_module: &CourseModuleRecord, user_id: i64) -> KernelResult<ModuleView> {
        let assignment = load(records, course_module.instance_id)?;
        let status = if assignment.submissions.contains_key(&user_id.to_string()) {
            "Submitted for grading"
        } else {
            "No attempt"
        };
        Ok(ModuleView {
            title: assignment.name,
            body: format!("{}\n\nSubmission status: {}", assignment.intro, status),
        })
    }

    fn dispatch_ajax(
        &self,
        tx: &mut StoreTransaction<'_>,
        course_module: &CourseModuleRecord,
        action: &str,
        args: &Value,
    ) -> KernelResult<Value> {
        let user_id = args
            .get("user_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::from("user_id is required"))?;
        let mut assignment = load(tx, course_module.instance_id)?;
        match action {
            "status" => Ok(json!({
                "submitted": assignment.submissions.contains_key(&user_id.to_string()),
            })),
            "submit" => {
                let text = args.get("text").and_then(Value::as_str).unwrap_or_default();
                assignment.submissions.insert(user_id.to_string(), json!(text));
                let row = to_row(&assignment)?;
                tx.update_plugin_row(COMPONENT, course_module.instance_id, row)?;
                Ok(json!({ "status": "submitted" }))
            }
            other => Err(Error::from(format!("unknown assignment action '{}'", other))),
        }
    }
}

pub fn register(factories: &mut PluginFactories) {
    factories.register_module(NAME, || Arc::new(AssignModule));
}

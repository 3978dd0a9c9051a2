//! # Modhost Records
//!
//! Shapes of every persisted row and the [`Records`] table set holding them.
//!
//! [`Records`] only exposes reads. Writes go through [`StoreTransaction`],
//! which a [`RecordStore`](crate::storage::RecordStore) hands out for the
//! duration of one atomic unit. Unique constraints are checked on insert and
//! fail with [`StorageSystemError::ConstraintViolation`].
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::course::sequence::SectionSequence;
use crate::kernel::error::Result;
use crate::plugin_system::capability::AccessType;
use crate::storage::error::StorageSystemError;

/// A registered capability, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRecord {
    pub name: String,
    pub access_type: AccessType,
    pub context_level: i64,
    pub component: String,
    pub risk_bits: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInstanceRecord {
    pub id: i64,
    pub block_name: String,
    pub parent_context_id: i64,
    pub show_in_subcontexts: bool,
    pub page_type_pattern: String,
    pub default_region: String,
    pub default_weight: i64,
    /// Opaque plugin-owned configuration
    pub config_data: Vec<u8>,
    pub visible: bool,
    pub time_created: i64,
    pub time_modified: i64,
}

/// Placement of a block instance on one page of one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPositionRecord {
    pub id: i64,
    pub block_instance_id: i64,
    pub context_id: i64,
    pub page_type: String,
    #[serde(default)]
    pub subpage: String,
    pub visible: bool,
    pub region: String,
    pub weight: i64,
}

impl BlockPositionRecord {
    fn unique_key(&self) -> (i64, i64, &str, &str) {
        (self.block_instance_id, self.context_id, &self.page_type, &self.subpage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub id: i64,
    pub course: i64,
    /// Position of the section within the course, starting at 0
    pub section: i64,
    pub sequence: SectionSequence,
}

/// Group mode of a course module
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    #[default]
    None,
    Separate,
    Visible,
}

impl GroupMode {
    pub fn as_i64(self) -> i64 {
        match self {
            GroupMode::None => 0,
            GroupMode::Separate => 1,
            GroupMode::Visible => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseModuleRecord {
    pub id: i64,
    pub course: i64,
    /// Module plugin name, e.g. `assign`
    pub module_type: String,
    pub instance_id: i64,
    pub section: i64,
    pub visible: bool,
    pub visible_on_course_page: bool,
    pub indent: i64,
    pub group_mode: GroupMode,
    /// 0 none, 1 manual, 2 automatic
    pub completion_policy: i64,
    pub availability: Option<String>,
    pub added: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    #[default]
    Incomplete,
    Complete,
    CompletePass,
    CompleteFail,
}

impl CompletionState {
    pub fn as_i64(self) -> i64 {
        match self {
            CompletionState::Incomplete => 0,
            CompletionState::Complete => 1,
            CompletionState::CompletePass => 2,
            CompletionState::CompleteFail => 3,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(CompletionState::Incomplete),
            1 => Some(CompletionState::Complete),
            2 => Some(CompletionState::CompletePass),
            3 => Some(CompletionState::CompleteFail),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub id: i64,
    pub user_id: i64,
    pub course_module_id: i64,
    pub completion_state: CompletionState,
    pub viewed: bool,
    pub time_modified: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeItemRecord {
    pub id: i64,
    pub course_id: i64,
    pub course_module_id: i64,
    pub module_name: String,
    pub instance_id: i64,
    pub item_name: String,
    pub grade_max: f64,
    pub grade_pass: f64,
}

/// Every table the runtime persists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Records {
    enabled: BTreeSet<String>,
    installed: BTreeMap<String, i64>,
    settings: BTreeMap<String, BTreeMap<String, Value>>,
    capabilities: BTreeMap<String, CapabilityRecord>,
    block_instances: BTreeMap<i64, BlockInstanceRecord>,
    block_positions: BTreeMap<i64, BlockPositionRecord>,
    sections: BTreeMap<i64, SectionRecord>,
    course_modules: BTreeMap<i64, CourseModuleRecord>,
    completions: BTreeMap<i64, CompletionRecord>,
    grade_items: BTreeMap<i64, GradeItemRecord>,
    /// Plugin-owned instance rows, per component
    plugin_rows: BTreeMap<String, BTreeMap<i64, Value>>,
    next_ids: BTreeMap<String, i64>,
}

impl Records {
    pub fn is_enabled(&self, component: &str) -> bool {
        self.enabled.contains(component)
    }

    pub fn enabled_components(&self) -> impl Iterator<Item = &str> {
        self.enabled.iter().map(String::as_str)
    }

    pub fn installed_version(&self, component: &str) -> Option<i64> {
        self.installed.get(component).copied()
    }

    pub fn installed(&self) -> impl Iterator<Item = (&str, i64)> {
        self.installed.iter().map(|(c, v)| (c.as_str(), *v))
    }

    pub fn setting(&self, component: &str, name: &str) -> Option<&Value> {
        self.settings.get(component).and_then(|s| s.get(name))
    }

    pub fn has_settings(&self, component: &str) -> bool {
        self.settings.get(component).is_some_and(|s| !s.is_empty())
    }

    pub fn capability(&self, name: &str) -> Option<&CapabilityRecord> {
        self.capabilities.get(name)
    }

    pub fn capabilities_for<'a>(&'a self, component: &'a str) -> impl Iterator<Item = &'a CapabilityRecord> + 'a {
        self.capabilities.values().filter(move |c| c.component == component)
    }

    pub fn block_instance(&self, id: i64) -> Option<&BlockInstanceRecord> {
        self.block_instances.get(&id)
    }

    pub fn block_instances(&self) -> impl Iterator<Item = &BlockInstanceRecord> {
        self.block_instances.values()
    }

    pub fn block_positions(&self) -> impl Iterator<Item = &BlockPositionRecord> {
        self.block_positions.values()
    }

    pub fn positions_for_instance(&self, instance_id: i64) -> impl Iterator<Item = &BlockPositionRecord> {
        self.block_positions
            .values()
            .filter(move |p| p.block_instance_id == instance_id)
    }

    /// Highest weight among positions at exactly this coordinate.
    pub fn max_block_weight(&self, region: &str, page_type: &str, context_id: i64) -> Option<i64> {
        self.block_positions
            .values()
            .filter(|p| p.region == region && p.page_type == page_type && p.context_id == context_id)
            .map(|p| p.weight)
            .max()
    }

    pub fn section(&self, id: i64) -> Option<&SectionRecord> {
        self.sections.get(&id)
    }

    pub fn sections_of_course(&self, course: i64) -> impl Iterator<Item = &SectionRecord> {
        self.sections.values().filter(move |s| s.course == course)
    }

    pub fn course_module(&self, id: i64) -> Option<&CourseModuleRecord> {
        self.course_modules.get(&id)
    }

    pub fn course_modules_of_type<'a>(&'a self, module_type: &'a str) -> impl Iterator<Item = &'a CourseModuleRecord> + 'a {
        self.course_modules.values().filter(move |cm| cm.module_type == module_type)
    }

    pub fn completion(&self, user_id: i64, course_module_id: i64) -> Option<&CompletionRecord> {
        self.completions
            .values()
            .find(|c| c.user_id == user_id && c.course_module_id == course_module_id)
    }

    pub fn completions_for_module(&self, course_module_id: i64) -> impl Iterator<Item = &CompletionRecord> {
        self.completions
            .values()
            .filter(move |c| c.course_module_id == course_module_id)
    }

    pub fn grade_item(&self, id: i64) -> Option<&GradeItemRecord> {
        self.grade_items.get(&id)
    }

    pub fn grade_items(&self) -> impl Iterator<Item = &GradeItemRecord> {
        self.grade_items.values()
    }

    /// The grade item of one module instance in one course.
    pub fn grade_item_for(&self, course_id: i64, module_name: &str, instance_id: i64) -> Option<&GradeItemRecord> {
        self.grade_items
            .values()
            .find(|g| g.course_id == course_id && g.module_name == module_name && g.instance_id == instance_id)
    }

    pub fn plugin_row(&self, component: &str, id: i64) -> Option<&Value> {
        self.plugin_rows.get(component).and_then(|rows| rows.get(&id))
    }

    pub fn plugin_rows(&self, component: &str) -> impl Iterator<Item = (i64, &Value)> {
        self.plugin_rows
            .get(component)
            .into_iter()
            .flat_map(|rows| rows.iter().map(|(id, v)| (*id, v)))
    }

    fn allocate_id(&mut self, table: &str) -> i64 {
        let next = self.next_ids.entry(table.to_string()).or_insert(1);
        let id = *next;
        *next += 1;
        id
    }
}

/// Write access to [`Records`] for the length of one atomic unit.
///
/// Obtained from [`RecordStore::transaction`](crate::storage::RecordStore::transaction);
/// every change is discarded unless the closure it was handed to returns `Ok`.
pub struct StoreTransaction<'a> {
    records: &'a mut Records,
}

impl<'a> Deref for StoreTransaction<'a> {
    type Target = Records;

    fn deref(&self) -> &Records {
        &*self.records
    }
}

impl<'a> StoreTransaction<'a> {
    pub(crate) fn new(records: &'a mut Records) -> Self {
        Self { records }
    }

    /// Returns true when the stored state changed.
    pub fn set_enabled(&mut self, component: &str, enabled: bool) -> bool {
        if enabled {
            self.records.enabled.insert(component.to_string())
        } else {
            self.records.enabled.remove(component)
        }
    }

    pub fn set_installed_version(&mut self, component: &str, version: i64) {
        self.records.installed.insert(component.to_string(), version);
    }

    pub fn remove_installed_version(&mut self, component: &str) -> Option<i64> {
        self.records.installed.remove(component)
    }

    pub fn set_setting(&mut self, component: &str, name: &str, value: Value) {
        self.records
            .settings
            .entry(component.to_string())
            .or_default()
            .insert(name.to_string(), value);
    }

    /// Removes every setting of a component, returning how many there were.
    pub fn remove_settings(&mut self, component: &str) -> usize {
        self.records.settings.remove(component).map_or(0, |s| s.len())
    }

    /// Insert or replace by name. Returns true when the capability was new.
    pub fn upsert_capability(&mut self, capability: CapabilityRecord) -> bool {
        self.records
            .capabilities
            .insert(capability.name.clone(), capability)
            .is_none()
    }

    /// Stores a new block instance; `record.id` is ignored and assigned here.
    pub fn insert_block_instance(&mut self, mut record: BlockInstanceRecord) -> i64 {
        record.id = self.records.allocate_id("block_instances");
        let id = record.id;
        self.records.block_instances.insert(id, record);
        id
    }

    pub fn update_block_instance(&mut self, record: BlockInstanceRecord) -> Result<()> {
        match self.records.block_instances.get_mut(&record.id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(StorageSystemError::not_found("block_instances", record.id).into()),
        }
    }

    pub fn delete_block_instance(&mut self, id: i64) -> Result<BlockInstanceRecord> {
        self.records
            .block_instances
            .remove(&id)
            .ok_or_else(|| StorageSystemError::not_found("block_instances", id).into())
    }

    fn check_position_unique(&self, record: &BlockPositionRecord) -> Result<()> {
        let clash = self
            .records
            .block_positions
            .values()
            .any(|p| p.id != record.id && p.unique_key() == record.unique_key());
        if clash {
            let (instance, context, page_type, subpage) = record.unique_key();
            return Err(StorageSystemError::constraint(
                "block_positions",
                format!("({}, {}, {}, {})", instance, context, page_type, subpage),
            )
            .into());
        }
        Ok(())
    }

    pub fn insert_block_position(&mut self, mut record: BlockPositionRecord) -> Result<i64> {
        record.id = 0;
        self.check_position_unique(&record)?;
        record.id = self.records.allocate_id("block_positions");
        let id = record.id;
        self.records.block_positions.insert(id, record);
        Ok(id)
    }

    pub fn update_block_position(&mut self, record: BlockPositionRecord) -> Result<()> {
        if !self.records.block_positions.contains_key(&record.id) {
            return Err(StorageSystemError::not_found("block_positions", record.id).into());
        }
        self.check_position_unique(&record)?;
        self.records.block_positions.insert(record.id, record);
        Ok(())
    }

    /// Returns how many positions were removed.
    pub fn delete_positions_for_instance(&mut self, instance_id: i64) -> usize {
        let before = self.records.block_positions.len();
        self.records
            .block_positions
            .retain(|_, p| p.block_instance_id != instance_id);
        before - self.records.block_positions.len()
    }

    pub fn insert_section(&mut self, mut record: SectionRecord) -> i64 {
        record.id = self.records.allocate_id("sections");
        let id = record.id;
        self.records.sections.insert(id, record);
        id
    }

    pub fn update_section_sequence(&mut self, section_id: i64, sequence: SectionSequence) -> Result<()> {
        match self.records.sections.get_mut(&section_id) {
            Some(section) => {
                section.sequence = sequence;
                Ok(())
            }
            None => Err(StorageSystemError::not_found("sections", section_id).into()),
        }
    }

    pub fn insert_course_module(&mut self, mut record: CourseModuleRecord) -> i64 {
        record.id = self.records.allocate_id("course_modules");
        let id = record.id;
        self.records.course_modules.insert(id, record);
        id
    }

    pub fn update_course_module(&mut self, record: CourseModuleRecord) -> Result<()> {
        match self.records.course_modules.get_mut(&record.id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(StorageSystemError::not_found("course_modules", record.id).into()),
        }
    }

    pub fn delete_course_module(&mut self, id: i64) -> Result<CourseModuleRecord> {
        self.records
            .course_modules
            .remove(&id)
            .ok_or_else(|| StorageSystemError::not_found("course_modules", id).into())
    }

    pub fn insert_completion(&mut self, mut record: CompletionRecord) -> Result<i64> {
        if self.completion(record.user_id, record.course_module_id).is_some() {
            return Err(StorageSystemError::constraint(
                "completions",
                format!("({}, {})", record.user_id, record.course_module_id),
            )
            .into());
        }
        record.id = self.records.allocate_id("completions");
        let id = record.id;
        self.records.completions.insert(id, record);
        Ok(id)
    }

    pub fn update_completion(&mut self, record: CompletionRecord) -> Result<()> {
        match self.records.completions.get_mut(&record.id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(StorageSystemError::not_found("completions", record.id).into()),
        }
    }

    pub fn delete_completions_for_module(&mut self, course_module_id: i64) -> usize {
        let before = self.records.completions.len();
        self.records
            .completions
            .retain(|_, c| c.course_module_id != course_module_id);
        before - self.records.completions.len()
    }

    pub fn insert_grade_item(&mut self, mut record: GradeItemRecord) -> i64 {
        record.id = self.records.allocate_id("grade_items");
        let id = record.id;
        self.records.grade_items.insert(id, record);
        id
    }

    pub fn delete_grade_item(&mut self, id: i64) -> Option<GradeItemRecord> {
        self.records.grade_items.remove(&id)
    }

    pub fn insert_plugin_row(&mut self, component: &str, row: Value) -> i64 {
        let id = self.records.allocate_id(component);
        self.records
            .plugin_rows
            .entry(component.to_string())
            .or_default()
            .insert(id, row);
        id
    }

    pub fn update_plugin_row(&mut self, component: &str, id: i64, row: Value) -> Result<()> {
        match self.records.plugin_rows.get_mut(component).and_then(|rows| rows.get_mut(&id)) {
            Some(existing) => {
                *existing = row;
                Ok(())
            }
            None => Err(StorageSystemError::not_found("plugin_rows", format!("{}:{}", component, id)).into()),
        }
    }

    pub fn delete_plugin_row(&mut self, component: &str, id: i64) -> Result<Value> {
        self.records
            .plugin_rows
            .get_mut(component)
            .and_then(|rows| rows.remove(&id))
            .ok_or_else(|| StorageSystemError::not_found("plugin_rows", format!("{}:{}", component, id)).into())
    }

    /// Drops every block instance of the named block and their positions.
    pub fn purge_block_instances(&mut self, block_name: &str) -> usize {
        let ids: Vec<i64> = self
            .records
            .block_instances
            .values()
            .filter(|b| b.block_name == block_name)
            .map(|b| b.id)
            .collect();
        for id in &ids {
            self.records.block_instances.remove(id);
            self.delete_positions_for_instance(*id);
        }
        ids.len()
    }
}

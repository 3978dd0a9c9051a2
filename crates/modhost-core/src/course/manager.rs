//! # Modhost Course Module Manager
//!
//! Creates, updates, moves and deletes activity instances inside course
//! sections and records per-user completion.
//!
//! A module instance spans up to four rows: the plugin-owned instance, the
//! [`CourseModuleRecord`], its entry in the section sequence and, for graded
//! modules, a grading ledger item. Create and delete touch all of them inside
//! one store transaction, with the plugin and the ledger writing through the
//! same [`StoreTransaction`](crate::storage::StoreTransaction).
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::course::enrollment::EnrollmentCheck;
use crate::course::error::CourseSystemError;
use crate::course::ledger::{GradeItemRequest, GradingLedger};
use crate::course::sequence::SectionSequence;
use crate::kernel::error::Result;
use crate::plugin_system::descriptor::{PluginKey, PluginType};
use crate::plugin_system::loader::PluginLoader;
use crate::plugin_system::traits::{ModulePlugin, ModuleView};
use crate::storage::records::{CompletionRecord, CompletionState, CourseModuleRecord, GroupMode, SectionRecord};
use crate::storage::RecordStore;

pub const COMPLETION_TRACKING_NONE: i64 = 0;
pub const COMPLETION_TRACKING_MANUAL: i64 = 1;
pub const COMPLETION_TRACKING_AUTOMATIC: i64 = 2;

/// Parameters of a new course module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCourseModule {
    /// Handed to the plugin's `add_instance` untouched
    pub data: Value,
    pub visible: bool,
    pub visible_on_course_page: bool,
    pub indent: i64,
    pub group_mode: GroupMode,
    pub completion_policy: i64,
    pub availability: Option<String>,
}

impl NewCourseModule {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            visible: true,
            visible_on_course_page: true,
            indent: 0,
            group_mode: GroupMode::None,
            completion_policy: COMPLETION_TRACKING_NONE,
            availability: None,
        }
    }
}

/// Changes to an existing course module. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseModuleUpdate {
    /// Plugin data; the plugin is not called when null
    pub data: Value,
    pub visible: Option<bool>,
    pub visible_on_course_page: Option<bool>,
    pub indent: Option<i64>,
    pub group_mode: Option<GroupMode>,
    pub completion_policy: Option<i64>,
    pub availability: Option<Option<String>>,
}

impl CourseModuleUpdate {
    fn apply(&self, record: &mut CourseModuleRecord) {
        if let Some(visible) = self.visible {
            record.visible = visible;
        }
        if let Some(visible) = self.visible_on_course_page {
            record.visible_on_course_page = visible;
        }
        if let Some(indent) = self.indent {
            record.indent = indent;
        }
        if let Some(group_mode) = self.group_mode {
            record.group_mode = group_mode;
        }
        if let Some(policy) = self.completion_policy {
            record.completion_policy = policy;
        }
        if let Some(availability) = &self.availability {
            record.availability = availability.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreatedModule {
    pub instance_id: i64,
    pub course_module_id: i64,
}

fn module_component(module_name: &str) -> String {
    PluginKey::new(PluginType::Module, module_name).component()
}

#[derive(Debug)]
pub struct CourseModuleManager {
    loader: Arc<PluginLoader>,
    store: Arc<RecordStore>,
    ledger: Arc<dyn GradingLedger>,
    enrollments: Arc<dyn EnrollmentCheck>,
}

impl CourseModuleManager {
    pub fn new(
        loader: Arc<PluginLoader>,
        store: Arc<RecordStore>,
        ledger: Arc<dyn GradingLedger>,
        enrollments: Arc<dyn EnrollmentCheck>,
    ) -> Self {
        Self {
            loader,
            store,
            ledger,
            enrollments,
        }
    }

    /// Append an empty section to a course.
    pub async fn add_section(&self, course_id: i64) -> Result<i64> {
        self.store
            .transaction(|tx| {
                let number = tx.sections_of_course(course_id).count() as i64;
                Ok(tx.insert_section(SectionRecord {
                    id: 0,
                    course: course_id,
                    section: number,
                    sequence: SectionSequence::new(),
                }))
            })
            .await
    }

    pub async fn course_module(&self, course_module_id: i64) -> Result<CourseModuleRecord> {
        self.store
            .read(|r| r.course_module(course_module_id).cloned())
            .await
            .ok_or_else(|| CourseSystemError::ModuleNotFound(course_module_id).into())
    }

    pub async fn section_sequence(&self, section_id: i64) -> Result<SectionSequence> {
        self.store
            .read(|r| r.section(section_id).map(|s| s.sequence.clone()))
            .await
            .ok_or_else(|| CourseSystemError::SectionNotFound(section_id).into())
    }

    async fn enabled_module(&self, module_name: &str) -> Result<Arc<dyn ModulePlugin>> {
        let component = module_component(module_name);
        if !self.store.read(|r| r.is_enabled(&component)).await {
            return Err(CourseSystemError::PluginDisabled {
                module: module_name.to_string(),
            }
            .into());
        }
        self.loader.load_module(module_name).await
    }

    /// Create a module instance in `section_id` of `course_id`.
    ///
    /// Plugin instance, course module, section sequence entry and (for graded
    /// modules) the grade item are written as one unit.
    pub async fn create_instance(
        &self,
        module_name: &str,
        course_id: i64,
        section_id: i64,
        new: NewCourseModule,
    ) -> Result<CreatedModule> {
        let module = self.enabled_module(module_name).await?;
        let features = module.supported_features();
        let now = Utc::now().timestamp();

        let created = self
            .store
            .transaction(|tx| {
                let instance_id = module.add_instance(tx, course_id, &new.data)?;

                let course_module_id = tx.insert_course_module(CourseModuleRecord {
                    id: 0,
                    course: course_id,
                    module_type: module_name.to_string(),
                    instance_id,
                    section: section_id,
                    visible: new.visible,
                    visible_on_course_page: new.visible_on_course_page,
                    indent: new.indent,
                    group_mode: new.group_mode,
                    completion_policy: new.completion_policy,
                    availability: new.availability.clone(),
                    added: now,
                });

                let section = tx
                    .section(section_id)
                    .cloned()
                    .ok_or(CourseSystemError::SectionNotFound(section_id))?;
                if section.course != course_id {
                    return Err(CourseSystemError::SectionCourseMismatch {
                        section: section_id,
                        course: course_id,
                    }
                    .into());
                }
                let mut sequence = section.sequence;
                sequence.append(course_module_id);
                tx.update_section_sequence(section_id, sequence)?;

                if features.grade {
                    let grading = module.grading_info(tx, instance_id)?;
                    self.ledger.create_item(
                        tx,
                        GradeItemRequest {
                            course_id,
                            course_module_id,
                            module_name: module_name.to_string(),
                            instance_id,
                            grading,
                        },
                    )?;
                }
                Ok(CreatedModule {
                    instance_id,
                    course_module_id,
                })
            })
            .await?;
        info!(
            "Created {} instance {} as course module {} in course {}",
            module_name, created.instance_id, created.course_module_id, course_id
        );
        Ok(created)
    }

    /// Forward plugin data to the module, then change only the fields set in
    /// `update`.
    pub async fn update_instance(
        &self,
        course_module_id: i64,
        update: CourseModuleUpdate,
    ) -> Result<CourseModuleRecord> {
        let record = self.course_module(course_module_id).await?;
        let module = self.loader.load_module(&record.module_type).await?;
        self.store
            .transaction(|tx| {
                let mut record = tx
                    .course_module(course_module_id)
                    .cloned()
                    .ok_or(CourseSystemError::ModuleNotFound(course_module_id))?;
                if !update.data.is_null() {
                    module.update_instance(tx, record.instance_id, &update.data)?;
                }
                update.apply(&mut record);
                tx.update_course_module(record.clone())?;
                Ok(record)
            })
            .await
    }

    /// Remove the plugin instance, grade item, sequence entry, completions and
    /// course module as one unit.
    pub async fn delete_instance(&self, course_module_id: i64) -> Result<()> {
        let record = self.course_module(course_module_id).await?;
        let module = self.loader.load_module(&record.module_type).await?;
        self.store
            .transaction(|tx| {
                let record = tx
                    .course_module(course_module_id)
                    .cloned()
                    .ok_or(CourseSystemError::ModuleNotFound(course_module_id))?;
                module.delete_instance(tx, record.instance_id)?;
                // Whatever the module declares now, no item may outlive it
                self.ledger
                    .delete_item(tx, record.course, &record.module_type, record.instance_id)?;
                if let Some(section) = tx.section(record.section).cloned() {
                    let mut sequence = section.sequence;
                    if sequence.remove(course_module_id) {
                        tx.update_section_sequence(section.id, sequence)?;
                    }
                }
                tx.delete_completions_for_module(course_module_id);
                tx.delete_course_module(course_module_id)?;
                Ok(())
            })
            .await?;
        info!("Deleted course module {} ({})", course_module_id, record.module_type);
        Ok(())
    }

    /// Move a module to `section_id`, in front of `before` or at the end.
    pub async fn move_to_section(&self, course_module_id: i64, section_id: i64, before: Option<i64>) -> Result<()> {
        self.store
            .transaction(|tx| {
                let mut record = tx
                    .course_module(course_module_id)
                    .cloned()
                    .ok_or(CourseSystemError::ModuleNotFound(course_module_id))?;
                let target = tx
                    .section(section_id)
                    .cloned()
                    .ok_or(CourseSystemError::SectionNotFound(section_id))?;
                if target.course != record.course {
                    return Err(CourseSystemError::SectionCourseMismatch {
                        section: section_id,
                        course: record.course,
                    }
                    .into());
                }
                if let Some(before) = before {
                    if before == course_module_id || !target.sequence.contains(before) {
                        return Err(CourseSystemError::InvalidPosition {
                            section: section_id,
                            before,
                        }
                        .into());
                    }
                }

                if let Some(source) = tx.section(record.section).cloned() {
                    if source.id != section_id {
                        let mut sequence = source.sequence;
                        sequence.remove(course_module_id);
                        tx.update_section_sequence(source.id, sequence)?;
                    }
                }
                let mut sequence = target.sequence;
                sequence.remove(course_module_id);
                match before {
                    Some(before) => sequence.insert_before(course_module_id, before),
                    None => sequence.append(course_module_id),
                };
                tx.update_section_sequence(section_id, sequence)?;

                record.section = section_id;
                tx.update_course_module(record)
            })
            .await
    }

    /// Upsert the user's completion of a module; always marks it viewed.
    pub async fn record_completion(
        &self,
        user_id: i64,
        course_module_id: i64,
        state: CompletionState,
    ) -> Result<CompletionRecord> {
        self.upsert_completion(user_id, course_module_id, Some(state)).await
    }

    /// Mark the module viewed, keeping the completion state.
    pub async fn record_view(&self, user_id: i64, course_module_id: i64) -> Result<CompletionRecord> {
        self.upsert_completion(user_id, course_module_id, None).await
    }

    async fn upsert_completion(
        &self,
        user_id: i64,
        course_module_id: i64,
        state: Option<CompletionState>,
    ) -> Result<CompletionRecord> {
        let now = Utc::now().timestamp();
        self.store
            .transaction(|tx| {
                if tx.course_module(course_module_id).is_none() {
                    return Err(CourseSystemError::ModuleNotFound(course_module_id).into());
                }
                match tx.completion(user_id, course_module_id).cloned() {
                    Some(mut completion) => {
                        if let Some(state) = state {
                            completion.completion_state = state;
                        }
                        completion.viewed = true;
                        completion.time_modified = now;
                        tx.update_completion(completion.clone())?;
                        Ok(completion)
                    }
                    None => {
                        let mut completion = CompletionRecord {
                            id: 0,
                            user_id,
                            course_module_id,
                            completion_state: state.unwrap_or_default(),
                            viewed: true,
                            time_modified: now,
                        };
                        completion.id = tx.insert_completion(completion.clone())?;
                        Ok(completion)
                    }
                }
            })
            .await
    }

    pub async fn completion(&self, user_id: i64, course_module_id: i64) -> Option<CompletionRecord> {
        self.store
            .read(|r| r.completion(user_id, course_module_id).cloned())
            .await
    }

    /// The module exists, is visible and the user is actively enrolled in its
    /// course.
    pub async fn can_access(&self, user_id: i64, course_module_id: i64) -> Result<bool> {
        let record = self.store.read(|r| r.course_module(course_module_id).cloned()).await;
        match record {
            Some(record) if record.visible => self.enrollments.is_actively_enrolled(user_id, record.course).await,
            _ => Ok(false),
        }
    }

    /// Render the module for a user and record the view. Modules tracking
    /// views complete on view when the course module uses automatic
    /// completion.
    pub async fn view(&self, course_module_id: i64, user_id: i64) -> Result<ModuleView> {
        let record = self.course_module(course_module_id).await?;
        let module = self.loader.load_module(&record.module_type).await?;
        let view = self.store.read(|r| module.view(r, &record, user_id)).await?;
        if module.supported_features().completion_tracks_views
            && record.completion_policy == COMPLETION_TRACKING_AUTOMATIC
        {
            self.record_completion(user_id, course_module_id, CompletionState::Complete)
                .await?;
        } else {
            self.record_view(user_id, course_module_id).await?;
        }
        debug!("User {} viewed course module {}", user_id, course_module_id);
        Ok(view)
    }

    pub async fn dispatch_ajax(&self, course_module_id: i64, action: &str, args: &Value) -> Result<Value> {
        let record = self.course_module(course_module_id).await?;
        let module = self.loader.load_module(&record.module_type).await?;
        self.store
            .transaction(|tx| module.dispatch_ajax(tx, &record, action, args))
            .await
    }
}

#![cfg(test)]

use std::sync::Arc;

use serde_json::json;

use super::common::{host_config, plugin_root, Probe, TestHost, TestModule, MODULE_NAME};
use crate::course::error::CourseSystemError;
use crate::course::ledger::{GradeItemRequest, GradingInfo, GradingLedger, RecordGradingLedger};
use crate::course::manager::COMPLETION_TRACKING_AUTOMATIC;
use crate::course::{CourseModuleUpdate, NewCourseModule, StaticEnrollments};
use crate::kernel::bootstrap::{Application, Collaborators};
use crate::kernel::error::{Error, Result as KernelResult};
use crate::plugin_system::traits::ModuleFeatures;
use crate::plugin_system::{PluginFactories, PluginType};
use crate::storage::records::CompletionState;
use crate::storage::{RecordStore, StoreTransaction};

const COURSE: i64 = 2;
const USER: i64 = 7;

/// Ledger that refuses every new item.
#[derive(Debug)]
struct RefusingLedger;

impl GradingLedger for RefusingLedger {
    fn create_item(&self, _tx: &mut StoreTransaction<'_>, request: GradeItemRequest) -> KernelResult<i64> {
        Err(Error::from(format!("ledger closed for course {}", request.course_id)))
    }

    fn delete_item(
        &self,
        _tx: &mut StoreTransaction<'_>,
        _course_id: i64,
        _module_name: &str,
        _instance_id: i64,
    ) -> KernelResult<bool> {
        Ok(false)
    }
}

fn quiz(name: &str) -> NewCourseModule {
    NewCourseModule::new(json!({ "name": name }))
}

async fn assert_no_module_rows(host: &TestHost) {
    let (modules, rows, grades) = host
        .app
        .store()
        .read(|r| {
            (
                r.course_modules_of_type(MODULE_NAME).count(),
                r.plugin_rows("mod_quiz").count(),
                r.grade_items().count(),
            )
        })
        .await;
    assert_eq!(modules, 0, "no course module may survive a failed create");
    assert_eq!(rows, 0, "no plugin row may survive a failed create");
    assert_eq!(grades, 0, "no grade item may survive a failed create");
}

#[tokio::test]
async fn test_module_round_trip_through_a_course() {
    let host = TestHost::new();
    host.ready().await;
    let modules = host.app.modules();
    let section = modules.add_section(COURSE).await.unwrap();

    let mut new = quiz("Quiz 1");
    new.completion_policy = COMPLETION_TRACKING_AUTOMATIC;
    let created = modules.create_instance(MODULE_NAME, COURSE, section, new).await.unwrap();

    let record = modules.course_module(created.course_module_id).await.unwrap();
    assert_eq!(record.module_type, MODULE_NAME);
    assert_eq!(record.instance_id, created.instance_id);
    assert_eq!(record.section, section);
    assert_eq!(
        modules.section_sequence(section).await.unwrap().ids(),
        &[created.course_module_id]
    );
    let grade = host
        .app
        .store()
        .read(|r| r.grade_item_for(COURSE, MODULE_NAME, created.instance_id).cloned())
        .await
        .expect("graded module must get a grade item");
    assert_eq!(grade.course_module_id, created.course_module_id);
    assert_eq!(grade.grade_max, 100.0);

    let view = modules.view(created.course_module_id, USER).await.unwrap();
    assert_eq!(view.title, "Quiz 1");
    let completion = modules.completion(USER, created.course_module_id).await.unwrap();
    assert_eq!(completion.completion_state, CompletionState::Complete);
    assert!(completion.viewed);

    modules.delete_instance(created.course_module_id).await.unwrap();

    let err = modules.course_module(created.course_module_id).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(modules.section_sequence(section).await.unwrap().is_empty());
    assert!(modules.completion(USER, created.course_module_id).await.is_none());
    assert_no_module_rows(&host).await;
}

#[tokio::test]
async fn test_view_without_automatic_completion_only_marks_viewed() {
    let host = TestHost::new();
    host.ready().await;
    let modules = host.app.modules();
    let section = modules.add_section(COURSE).await.unwrap();
    let created = modules
        .create_instance(MODULE_NAME, COURSE, section, quiz("Quiz 1"))
        .await
        .unwrap();

    modules.view(created.course_module_id, USER).await.unwrap();

    let completion = modules.completion(USER, created.course_module_id).await.unwrap();
    assert_eq!(completion.completion_state, CompletionState::Incomplete);
    assert!(completion.viewed);
}

#[tokio::test]
async fn test_failed_add_instance_rolls_back() {
    let host = TestHost::new();
    host.ready().await;
    let section = host.app.modules().add_section(COURSE).await.unwrap();
    host.probe.fail("add_instance");

    let result = host
        .app
        .modules()
        .create_instance(MODULE_NAME, COURSE, section, quiz("Quiz 1"))
        .await;

    assert!(result.is_err());
    assert_no_module_rows(&host).await;
    assert!(host.app.modules().section_sequence(section).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_data_is_rejected_by_the_module() {
    let host = TestHost::new();
    host.ready().await;
    let section = host.app.modules().add_section(COURSE).await.unwrap();

    let result = host
        .app
        .modules()
        .create_instance(MODULE_NAME, COURSE, section, NewCourseModule::new(json!({})))
        .await;

    assert!(result.is_err());
    assert_no_module_rows(&host).await;
}

#[tokio::test]
async fn test_unknown_or_foreign_section_rolls_back() {
    let host = TestHost::new();
    host.ready().await;
    let modules = host.app.modules();

    let err = modules
        .create_instance(MODULE_NAME, COURSE, 999, quiz("Quiz 1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CourseSystem(CourseSystemError::SectionNotFound(999))));

    let foreign = modules.add_section(COURSE + 1).await.unwrap();
    let err = modules
        .create_instance(MODULE_NAME, COURSE, foreign, quiz("Quiz 1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::CourseSystem(CourseSystemError::SectionCourseMismatch { .. })
    ));
    assert_no_module_rows(&host).await;
}

#[tokio::test]
async fn test_ledger_failure_rolls_back() {
    let collaborators = Collaborators {
        ledger: Arc::new(RefusingLedger),
        enrollments: Arc::new(StaticEnrollments::new()),
    };
    let host = TestHost::with_store(Arc::new(RecordStore::in_memory()), collaborators);
    host.ready().await;
    let section = host.app.modules().add_section(COURSE).await.unwrap();

    let err = host
        .app
        .modules()
        .create_instance(MODULE_NAME, COURSE, section, quiz("Quiz 1"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("ledger closed"));
    assert_no_module_rows(&host).await;
    assert!(host.app.modules().section_sequence(section).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_disabled_module_cannot_be_added() {
    let host = TestHost::new();
    let section = host.app.modules().add_section(COURSE).await.unwrap();

    let err = host
        .app
        .modules()
        .create_instance(MODULE_NAME, COURSE, section, quiz("Quiz 1"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::CourseSystem(CourseSystemError::PluginDisabled { .. })
    ));
    assert_eq!(host.probe.count("add_instance"), 0);
}

#[tokio::test]
async fn test_access_requires_visibility_and_enrollment() {
    let enrollments = Arc::new(StaticEnrollments::new());
    let collaborators = Collaborators {
        ledger: Collaborators::default().ledger,
        enrollments: enrollments.clone(),
    };
    let host = TestHost::with_store(Arc::new(RecordStore::in_memory()), collaborators);
    host.ready().await;
    let modules = host.app.modules();
    let section = modules.add_section(COURSE).await.unwrap();
    let created = modules
        .create_instance(MODULE_NAME, COURSE, section, quiz("Quiz 1"))
        .await
        .unwrap();
    let cm = created.course_module_id;

    assert!(!modules.can_access(USER, cm).await.unwrap());

    enrollments.enroll(USER, COURSE).await;
    assert!(modules.can_access(USER, cm).await.unwrap());

    let update = CourseModuleUpdate {
        visible: Some(false),
        ..Default::default()
    };
    let record = modules.update_instance(cm, update).await.unwrap();
    assert!(!record.visible);
    assert!(!modules.can_access(USER, cm).await.unwrap());
    assert!(!modules.can_access(USER, cm + 100).await.unwrap());
}

#[tokio::test]
async fn test_ajax_writes_commit_only_on_success() {
    let host = TestHost::new();
    host.ready().await;
    let modules = host.app.modules();
    let section = modules.add_section(COURSE).await.unwrap();
    let cm = modules
        .create_instance(MODULE_NAME, COURSE, section, quiz("Quiz 1"))
        .await
        .unwrap()
        .course_module_id;

    let echoed = modules.dispatch_ajax(cm, "echo", &json!({ "x": 1 })).await.unwrap();
    assert_eq!(echoed, json!({ "cm": cm, "args": { "x": 1 } }));

    modules.dispatch_ajax(cm, "note", &json!("first")).await.unwrap();
    let err = modules.dispatch_ajax(cm, "fail_after_write", &json!("second")).await;
    assert!(err.is_err());
    assert!(modules.dispatch_ajax(cm, "nope", &json!(null)).await.is_err());

    let note = host.app.store().read(|r| r.setting("mod_quiz", "note").cloned()).await;
    assert_eq!(note, Some(json!("first")));
}

#[tokio::test]
async fn test_update_forwards_data_to_module() {
    let host = TestHost::new();
    host.ready().await;
    let modules = host.app.modules();
    let section = modules.add_section(COURSE).await.unwrap();
    let created = modules
        .create_instance(MODULE_NAME, COURSE, section, quiz("Quiz 1"))
        .await
        .unwrap();

    let record = modules
        .update_instance(created.course_module_id, CourseModuleUpdate::default())
        .await
        .unwrap();
    assert_eq!(record.indent, 0);
    assert_eq!(host.probe.count("update_instance"), 0);

    let update = CourseModuleUpdate {
        data: json!({ "name": "Renamed" }),
        indent: Some(2),
        ..Default::default()
    };
    let record = modules.update_instance(created.course_module_id, update).await.unwrap();
    assert_eq!(record.indent, 2);
    assert_eq!(host.probe.count("update_instance"), 1);
    let view = modules.view(created.course_module_id, USER).await.unwrap();
    assert_eq!(view.title, "Renamed");

    host.probe.fail("update_instance");
    let update = CourseModuleUpdate {
        data: json!({ "name": "Lost" }),
        indent: Some(4),
        ..Default::default()
    };
    assert!(modules.update_instance(created.course_module_id, update).await.is_err());
    let record = modules.course_module(created.course_module_id).await.unwrap();
    assert_eq!(record.indent, 2);
}

#[tokio::test]
async fn test_failed_delete_keeps_every_row() {
    let host = TestHost::new();
    host.ready().await;
    let modules = host.app.modules();
    let section = modules.add_section(COURSE).await.unwrap();
    let created = modules
        .create_instance(MODULE_NAME, COURSE, section, quiz("Quiz 1"))
        .await
        .unwrap();
    let cm = created.course_module_id;
    host.probe.fail("delete_instance");

    assert!(modules.delete_instance(cm).await.is_err());

    assert_eq!(modules.course_module(cm).await.unwrap().instance_id, created.instance_id);
    assert_eq!(modules.section_sequence(section).await.unwrap().ids(), &[cm]);
    let (grade, row) = host
        .app
        .store()
        .read(|r| {
            (
                r.grade_item_for(COURSE, MODULE_NAME, created.instance_id).is_some(),
                r.plugin_row("mod_quiz", created.instance_id).is_some(),
            )
        })
        .await;
    assert!(grade, "grade item must survive a failed delete");
    assert!(row, "plugin row must survive a failed delete");

    host.probe.heal("delete_instance");
    modules.delete_instance(cm).await.unwrap();
    assert_no_module_rows(&host).await;
}

#[tokio::test]
async fn test_delete_drops_grade_item_of_module_no_longer_grading() {
    let root = plugin_root();
    let probe = Probe::new();
    let mut factories = PluginFactories::new();
    let module_probe = Arc::clone(&probe);
    factories.register_module(MODULE_NAME, move || {
        Arc::new(TestModule::new(MODULE_NAME, ModuleFeatures::default(), Arc::clone(&module_probe)))
    });
    let app = Application::in_memory(host_config(root.path()), factories);
    app.registry().enable(PluginType::Module, MODULE_NAME).await.unwrap();
    let section = app.modules().add_section(COURSE).await.unwrap();
    let created = app
        .modules()
        .create_instance(MODULE_NAME, COURSE, section, quiz("Quiz 1"))
        .await
        .unwrap();
    assert_eq!(app.store().read(|r| r.grade_items().count()).await, 0);

    // Item written back when the module still declared grading
    app.store()
        .transaction(|tx| {
            RecordGradingLedger.create_item(
                tx,
                GradeItemRequest {
                    course_id: COURSE,
                    course_module_id: created.course_module_id,
                    module_name: MODULE_NAME.to_string(),
                    instance_id: created.instance_id,
                    grading: GradingInfo::new("Quiz 1", 10.0),
                },
            )
        })
        .await
        .unwrap();

    app.modules().delete_instance(created.course_module_id).await.unwrap();

    assert_eq!(app.store().read(|r| r.grade_items().count()).await, 0);
}

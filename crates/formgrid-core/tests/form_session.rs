use async_trait::async_trait;
use formgrid_core::form::{FormEvent, FormSession, FormState, FormStep, StepStatus, SubmitError, SubmitHandler};
use formgrid_core::{CoreError, FormDefinition};
use formgrid_schema::{FieldDescriptor, FieldPath, Refinement, Schema, TextFormat};
use mockall::mock;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use proptest::test_runner::Config;
use serde_json::{json, Value};
use std::sync::Arc;

mock! {
    #[derive(Debug)]
    pub Handler {}

    #[async_trait]
    impl SubmitHandler for Handler {
        async fn submit(&self, record: &Value) -> Result<(), SubmitError>;
    }
}

fn paths(paths: &[&str]) -> Vec<FieldPath> {
    paths.iter().map(|p| FieldPath::parse(p).unwrap()).collect()
}

fn signup_schema() -> Schema {
    let contact = FieldDescriptor::object(
        "contact",
        vec![
            FieldDescriptor::enumeration("kind", ["email", "phone"]).required(),
            FieldDescriptor::text("value").required(),
        ],
    );
    Schema::new(
        "signup",
        vec![
            FieldDescriptor::text("name").required().min_length(2),
            FieldDescriptor::text("email").required().format(TextFormat::Email),
            FieldDescriptor::text("city").required(),
            FieldDescriptor::text("zip").pattern(r"^\d{5}$").allow_empty(),
            FieldDescriptor::array("contacts", contact).max_length(3),
            FieldDescriptor::boolean("newsletter"),
            FieldDescriptor::boolean("accept_terms").required().refine(Refinement::MustBeTrue {
                message: Some("You must accept the terms".to_string()),
            }),
        ],
    )
    .unwrap()
}

fn signup_form() -> Arc<FormDefinition> {
    let steps = vec![
        FormStep::new("profile", "Profile", paths(&["name", "email"])),
        FormStep::new("address", "Address", paths(&["city", "zip"])),
        FormStep::new("extras", "Extras", paths(&["contacts", "newsletter", "accept_terms"])),
    ];
    Arc::new(FormDefinition::new("signup", "Sign up", Arc::new(signup_schema()), steps).unwrap())
}

fn session_on_last_step() -> FormSession {
    let mut session = FormSession::new(signup_form());
    session.set_field("name", json!("Anna Schmidt")).unwrap();
    session.set_field("email", json!("anna@example.com")).unwrap();
    session.next_step().unwrap();
    session.set_field("city", json!("Berlin")).unwrap();
    session.next_step().unwrap();
    session.set_field("accept_terms", json!(true)).unwrap();
    session
}

#[test]
fn test_new_session_is_seeded_from_defaults() {
    let session = FormSession::new(signup_form());
    assert_eq!(session.state(), FormState::Editing { step: 0 });
    assert_eq!(session.value("contacts"), Some(&json!([])));
    assert_eq!(session.value("accept_terms"), Some(&json!(false)));
    assert!(!session.has_errors());
    assert_eq!(session.progress(), 0.0);
}

#[test]
fn test_required_city_blocks_second_step() {
    let mut session = FormSession::new(signup_form());
    session.set_field("name", json!("Anna")).unwrap();
    session.set_field("email", json!("anna@example.com")).unwrap();
    assert_eq!(session.next_step().unwrap(), 1);

    session.set_field("city", json!("")).unwrap();
    let err = session.next_step().unwrap_err();
    match err {
        CoreError::StepValidationFailed { step, errors } => {
            assert_eq!(step, 1);
            assert_eq!(errors.len(), 1);
            assert_eq!(errors.iter().next().map(|e| e.path.as_str()), Some("city"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(session.current_step(), Some(1));
    assert!(session.error("city").is_some());
    assert_eq!(session.step_status(1), Some(StepStatus::Error));
    assert_eq!(session.step_status(0), Some(StepStatus::Completed));
}

#[test]
fn test_invalid_input_is_recorded_not_refused() {
    let mut session = FormSession::new(signup_form());
    session.set_field("name", json!("A")).unwrap();
    assert_eq!(session.value("name"), Some(&json!("A")));
    assert!(session.error("name").is_some());
    assert!(session.error("email").is_none(), "untouched fields stay quiet");

    session.set_field("name", json!("Anna")).unwrap();
    assert!(session.error("name").is_none());
}

#[test]
fn test_optional_errors_do_not_block_a_step() {
    let mut session = FormSession::new(signup_form());
    session.set_field("name", json!("Anna")).unwrap();
    session.set_field("email", json!("anna@example.com")).unwrap();
    session.next_step().unwrap();
    session.set_field("city", json!("Berlin")).unwrap();
    session.set_field("zip", json!("12")).unwrap();

    assert_eq!(session.next_step().unwrap(), 2);
    assert!(session.error("zip").is_some());
}

#[test]
fn test_previous_step_ignores_validity() {
    let mut session = session_on_last_step();
    session.set_field("accept_terms", json!(false)).unwrap();
    assert!(session.has_errors());
    assert_eq!(session.previous_step().unwrap(), 1);
    assert_eq!(session.previous_step().unwrap(), 0);
    assert_eq!(session.previous_step().unwrap(), 0);
}

#[test]
fn test_next_step_on_last_step_stays() {
    let mut session = session_on_last_step();
    assert_eq!(session.next_step().unwrap(), 2);
    assert_eq!(session.current_step(), Some(2));
}

#[test]
fn test_step_without_fields_is_trivially_valid() {
    let steps = vec![
        FormStep::new("intro", "Welcome", vec![]),
        FormStep::new("profile", "Profile", paths(&["name", "email", "city", "accept_terms"])),
    ];
    let definition = FormDefinition::new("welcome", "Welcome", Arc::new(signup_schema()), steps).unwrap();
    let mut session = FormSession::new(Arc::new(definition));
    assert_eq!(session.next_step().unwrap(), 1);
}

#[tokio::test]
async fn test_successful_submit_discards_record() {
    let mut handler = MockHandler::new();
    handler
        .expect_submit()
        .withf(|record| record["name"] == json!("Anna Schmidt") && record.get("zip").is_none())
        .times(1)
        .returning(|_| Ok(()));

    let mut session = session_on_last_step();
    session.submit(&handler).await.unwrap();

    assert_eq!(session.state(), FormState::Completed);
    assert_eq!(session.record(), &Value::Null);
    assert_eq!(session.progress(), 1.0);
    assert_eq!(session.step_status(0), Some(StepStatus::Completed));
    assert_eq!(session.set_field("name", json!("x")), Err(CoreError::SessionClosed));
}

#[tokio::test]
async fn test_failed_submit_keeps_record() {
    let mut handler = MockHandler::new();
    handler
        .expect_submit()
        .times(1)
        .returning(|_| Err(SubmitError::Network("connection reset".to_string())));

    let mut session = session_on_last_step();
    let before = session.record().clone();

    let err = session.submit(&handler).await.unwrap_err();
    assert_eq!(err, CoreError::SubmissionFailed("Network error: connection reset".to_string()));
    assert_eq!(session.state(), FormState::Editing { step: 2 });
    assert_eq!(session.record(), &before);
    assert_eq!(session.submission_error(), Some("Network error: connection reset"));

    let events: Vec<&'static str> = session.take_events().iter().map(|e| e.event.event_type()).collect();
    assert_eq!(events.last(), Some(&"form_session.submission_failed"));
}

#[tokio::test]
async fn test_invalid_record_never_reaches_handler() {
    let mut handler = MockHandler::new();
    handler.expect_submit().times(0);

    let mut session = session_on_last_step();
    session.set_field("contacts", json!([{"kind": "fax", "value": "123"}])).unwrap();

    let err = session.submit(&handler).await.unwrap_err();
    assert_eq!(err.error_code(), "ERR_FORM_VALIDATION_FAILED");
    assert_eq!(session.state(), FormState::Editing { step: 2 });
    assert!(session.error("contacts[0].kind").is_some());
}

#[test]
fn test_submit_only_from_last_step() {
    let mut session = FormSession::new(signup_form());
    assert_eq!(
        session.begin_submit().unwrap_err(),
        CoreError::NotOnLastStep { step: 0, last: 2 }
    );
}

#[test]
fn test_mutations_rejected_while_submitting() {
    let mut session = session_on_last_step();
    let record = session.begin_submit().unwrap();
    assert_eq!(record["city"], json!("Berlin"));
    assert!(session.is_submitting());

    assert_eq!(session.set_field("city", json!("Hamburg")), Err(CoreError::SubmissionInProgress));
    assert_eq!(session.next_step(), Err(CoreError::SubmissionInProgress));
    assert_eq!(session.previous_step(), Err(CoreError::SubmissionInProgress));
    assert_eq!(session.add_entry("contacts"), Err(CoreError::SubmissionInProgress));

    assert_eq!(session.complete_submit(Ok(())).unwrap(), FormState::Completed);
}

#[test]
fn test_completion_after_cancel_is_discarded() {
    let mut session = session_on_last_step();
    session.begin_submit().unwrap();
    session.cancel();
    assert_eq!(session.state(), FormState::Cancelled);
    assert_eq!(session.record(), &Value::Null);

    assert_eq!(session.complete_submit(Ok(())), Err(CoreError::SessionClosed));
    assert_eq!(session.state(), FormState::Cancelled);
    let events = session.take_events();
    assert_eq!(events.last().map(|e| e.event.clone()), Some(FormEvent::CompletionDiscarded));
}

#[test]
fn test_entries_and_reindexed_errors() {
    let mut session = session_on_last_step();
    assert_eq!(session.add_entry("contacts").unwrap(), 0);
    assert_eq!(session.add_entry("contacts").unwrap(), 1);
    assert_eq!(session.add_entry("contacts").unwrap(), 2);
    assert_eq!(
        session.add_entry("contacts"),
        Err(CoreError::EntryLimitReached { path: "contacts".to_string(), max: 3 })
    );

    session.set_field("contacts[0].kind", json!("email")).unwrap();
    session.set_field("contacts[0].value", json!("anna@example.com")).unwrap();
    session.set_field("contacts[1].value", json!("x")).unwrap();
    session.next_step().unwrap();
    assert!(session.error("contacts[1].kind").is_some());
    assert!(session.error("contacts[2].value").is_some());

    let removed = session.remove_entry("contacts", 0).unwrap();
    assert_eq!(removed["kind"], json!("email"));
    assert!(session.error("contacts[0].kind").is_some());
    assert!(session.error("contacts[0].value").is_none());
    assert!(session.error("contacts[1].value").is_some());
    assert!(session.error("contacts[2].kind").is_none());
    assert_eq!(session.errors().find(|e| e.path == "contacts[1].kind").map(|e| e.code), Some("ERR_SCHEMA_REQUIRED"));

    assert_eq!(
        session.remove_entry("contacts", 5),
        Err(CoreError::IndexOutOfRange { path: "contacts".to_string(), index: 5, len: 2 })
    );
    assert_eq!(session.add_entry("city"), Err(CoreError::NotAnArray("city".to_string())));
}

#[test]
fn test_undeclared_paths_are_rejected() {
    let mut session = FormSession::new(signup_form());
    let err = session.set_field("nickname", json!("anna")).unwrap_err();
    assert_eq!(err.error_code(), "ERR_FORM_INVALID_PATH");
}

#[test]
fn test_edit_mode_and_reset() {
    let existing = json!({"name": "Max", "email": "max@example.com", "city": "Köln", "role": "ignored"});
    let mut session = FormSession::edit(signup_form(), &existing);
    assert_eq!(session.value("city"), Some(&json!("Köln")));
    assert_eq!(session.value("role"), None);

    session.set_field("city", json!("Bonn")).unwrap();
    session.next_step().unwrap();
    session.reset().unwrap();

    assert_eq!(session.current_step(), Some(0));
    assert_eq!(session.value("city"), Some(&json!("Köln")));
    assert!(!session.has_errors());
}

#[test]
fn test_snapshot_serializes_state() {
    let mut session = FormSession::new(signup_form());
    session.set_field("name", json!("A")).unwrap();
    let snapshot = serde_json::to_value(session.snapshot()).unwrap();
    assert_eq!(snapshot["state"], json!("editing"));
    assert_eq!(snapshot["step"], json!(0));
    assert_eq!(snapshot["errors"][0]["path"], json!("name"));
    assert_eq!(snapshot["steps"], json!(["error", "not_started", "not_started"]));
    assert_eq!(snapshot["submitting"], json!(false));

    session.set_field("name", json!("Anna")).unwrap();
    let snapshot = serde_json::to_value(session.snapshot()).unwrap();
    assert_eq!(snapshot["steps"][0], json!("current"));
}

proptest! {
    #![proptest_config(Config::with_cases(64))]

    #[test]
    fn prop_next_step_gates_on_required_fields(
        name in prop::option::of("[a-zA-Z]{0,6}"),
        email in prop::sample::select(vec!["", "bad", "anna@example.com"]),
    ) {
        let mut session = FormSession::new(signup_form());
        if let Some(name) = &name {
            session.set_field("name", json!(name)).unwrap();
        }
        session.set_field("email", json!(email)).unwrap();

        let valid = name.as_ref().map_or(false, |n| n.chars().count() >= 2) && email == "anna@example.com";
        let result = session.next_step();
        if valid {
            prop_assert_eq!(result, Ok(1));
            prop_assert_eq!(session.current_step(), Some(1));
        } else {
            prop_assert!(result.is_err());
            prop_assert_eq!(session.current_step(), Some(0));
        }
    }

    #[test]
    fn prop_previous_step_always_moves_back(steps_forward in 0usize..3, junk in ".{0,8}") {
        let mut session = session_on_last_step();
        for _ in 0..(2 - steps_forward.min(2)) {
            session.previous_step().unwrap();
        }
        session.set_field("name", json!(junk)).unwrap();
        let step = session.current_step().unwrap();
        let back = session.previous_step().unwrap();
        prop_assert_eq!(back, step.saturating_sub(1));
    }
}

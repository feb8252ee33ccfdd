//! Template lifecycle through the version manager: creation, sequencing,
//! activation, rollback, and family deletion.

mod common;

use assert_matches::assert_matches;
use common::{active_versions, add_version, build_engine, create_template, string_param, AUTHOR};
use promptline_core::error::CoreError;
use promptline_core::template::TemplateFields;
use promptline_core::value::Value;
use promptline_core::version_log::{
    VersionAction, META_REPLACED_BY_VERSION, META_REPLACES_VERSION, META_ROLLED_BACK_FROM,
    META_ROLLED_BACK_TO,
};
use promptline_engine::store::FamilyCounts;
use promptline_engine::{CreateTemplateInput, CreateVersionInput, EngineError};

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_template_starts_active_at_version_one() {
    let (engine, _) = build_engine();

    let template = create_template(&engine, "greeting", "Hello {{name}}").await;

    assert_eq!(template.version, 1);
    assert!(template.is_active);
    assert_eq!(template.previous_version_id, None);
    assert_eq!(template.category, "general");

    let log = engine.versions.history("greeting").await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action().unwrap(), VersionAction::Created);
    assert_eq!(log[0].author, AUTHOR);
}

#[tokio::test]
async fn create_template_rejects_existing_name() {
    let (engine, _) = build_engine();
    create_template(&engine, "greeting", "Hello").await;

    let err = engine
        .versions
        .create_template(CreateTemplateInput {
            name: "greeting".into(),
            fields: TemplateFields::new("Hi"),
            author: AUTHOR.into(),
        })
        .await
        .unwrap_err();

    assert_matches!(err, EngineError::Core(CoreError::DuplicateName(name)) if name == "greeting");
}

#[tokio::test]
async fn create_template_validates_before_writing() {
    let (engine, store) = build_engine();

    let err = engine
        .versions
        .create_template(CreateTemplateInput {
            name: "bad name!".into(),
            fields: TemplateFields::new("Hello"),
            author: AUTHOR.into(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::Validation { field, .. }) if field == "name");

    let err = engine
        .versions
        .create_template(CreateTemplateInput {
            name: "greeting".into(),
            fields: TemplateFields::new("   "),
            author: AUTHOR.into(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::Validation { field, .. }) if field == "content");

    assert_eq!(store.family_counts("greeting").await, FamilyCounts::default());
}

#[tokio::test]
async fn tags_are_stored_as_a_sorted_set() {
    let (engine, _) = build_engine();

    let template = engine
        .versions
        .create_template(CreateTemplateInput {
            name: "greeting".into(),
            fields: TemplateFields::new("Hello").with_tags(["tone", "onboarding", "tone"]),
            author: AUTHOR.into(),
        })
        .await
        .unwrap();

    assert_eq!(template.tags, vec!["onboarding".to_string(), "tone".to_string()]);
}

// ---------------------------------------------------------------------------
// Version sequence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_version_appends_inactive_next_version() {
    let (engine, _) = build_engine();
    let v1 = create_template(&engine, "greeting", "Hello").await;

    let v2 = add_version(&engine, "greeting", "Hi").await;

    assert_eq!(v2.version, 2);
    assert!(!v2.is_active);
    assert_eq!(v2.previous_version_id, Some(v1.id));
    assert_eq!(active_versions(&engine, "greeting").await, vec![1]);
}

#[tokio::test]
async fn create_version_succeeds_only_for_the_next_number() {
    let (engine, _) = build_engine();
    create_template(&engine, "greeting", "v1").await;
    add_version(&engine, "greeting", "v2").await;

    let input = |expected| CreateVersionInput {
        template_name: "greeting".into(),
        fields: TemplateFields::new("v3"),
        author: AUTHOR.into(),
        notes: None,
        expected_version: Some(expected),
    };

    for wrong in [1, 2, 4] {
        let err = engine.versions.create_version(input(wrong)).await.unwrap_err();
        assert_matches!(
            err,
            EngineError::Core(CoreError::InvalidVersionSequence { expected, actual: 3, .. })
                if expected == wrong
        );
    }

    let v3 = engine.versions.create_version(input(3)).await.unwrap();
    assert_eq!(v3.version, 3);
}

#[tokio::test]
async fn create_version_requires_existing_family() {
    let (engine, _) = build_engine();

    let err = engine
        .versions
        .create_version(CreateVersionInput {
            template_name: "missing".into(),
            fields: TemplateFields::new("Hello"),
            author: AUTHOR.into(),
            notes: None,
            expected_version: None,
        })
        .await
        .unwrap_err();

    assert_matches!(err, EngineError::Core(CoreError::NotFound { .. }));
}

#[tokio::test]
async fn new_version_is_addressed_by_any_family_member() {
    let (engine, _) = build_engine();
    let v1 = create_template(&engine, "greeting", "v1").await;
    add_version(&engine, "greeting", "v2").await;

    let v3 = engine
        .versions
        .new_version(v1.id, TemplateFields::new("v3"), AUTHOR, Some("tweak".into()))
        .await
        .unwrap();

    assert_eq!(v3.version, 3);
    let log = engine.versions.history("greeting").await.unwrap();
    assert_eq!(log[0].notes.as_deref(), Some("tweak"));
}

#[tokio::test]
async fn concurrent_version_writes_keep_the_sequence_dense() {
    let (engine, _) = build_engine();
    create_template(&engine, "greeting", "v1").await;

    let writes = (0..8).map(|i| {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .versions
                .create_version(CreateVersionInput {
                    template_name: "greeting".into(),
                    fields: TemplateFields::new(format!("draft {i}")),
                    author: AUTHOR.into(),
                    notes: None,
                    expected_version: None,
                })
                .await
        })
    });
    let results = futures::future::join_all(writes).await;

    for result in results {
        match result.unwrap() {
            Ok(_) => {}
            Err(err) => assert_matches!(
                err,
                EngineError::Core(CoreError::InvalidVersionSequence { .. })
            ),
        }
    }

    let versions: Vec<i32> = engine
        .versions
        .list_versions("greeting")
        .await
        .unwrap()
        .iter()
        .map(|t| t.version)
        .collect();
    let expected: Vec<i32> = (1..=versions.len() as i32).collect();
    assert_eq!(versions, expected);
}

// ---------------------------------------------------------------------------
// Activation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn activation_swaps_and_logs_both_sides() {
    let (engine, _) = build_engine();
    create_template(&engine, "greeting", "v1").await;
    let v2 = add_version(&engine, "greeting", "v2").await;

    let activated = engine
        .versions
        .activate_version(v2.id, "bob", Some("ship it"))
        .await
        .unwrap();

    assert!(activated.is_active);
    assert_eq!(active_versions(&engine, "greeting").await, vec![2]);

    let log = engine.versions.history("greeting").await.unwrap();
    let actions: Vec<VersionAction> = log.iter().map(|e| e.action().unwrap()).collect();
    assert_eq!(
        actions,
        vec![
            VersionAction::Activated,
            VersionAction::Deactivated,
            VersionAction::Created,
            VersionAction::Created,
        ]
    );

    let (activated_entry, deactivated_entry) = (&log[0], &log[1]);
    assert_eq!(activated_entry.version, 2);
    assert_eq!(activated_entry.author, "bob");
    assert_eq!(activated_entry.notes.as_deref(), Some("ship it"));
    assert_eq!(activated_entry.metadata.0[META_REPLACES_VERSION], Value::from(1));
    assert_eq!(deactivated_entry.version, 1);
    assert_eq!(deactivated_entry.metadata.0[META_REPLACED_BY_VERSION], Value::from(2));
}

#[tokio::test]
async fn activating_the_active_version_is_a_no_op() {
    let (engine, _) = build_engine();
    let v1 = create_template(&engine, "greeting", "v1").await;

    let again = engine.versions.activate_version(v1.id, AUTHOR, None).await.unwrap();

    assert!(again.is_active);
    assert_eq!(engine.versions.history("greeting").await.unwrap().len(), 1);
}

#[tokio::test]
async fn activating_unknown_version_is_not_found() {
    let (engine, _) = build_engine();

    let err = engine.versions.activate_version(404, AUTHOR, None).await.unwrap_err();

    assert_matches!(err, EngineError::Core(CoreError::NotFound { .. }));
}

#[tokio::test]
async fn single_active_version_after_any_sequence() {
    let (engine, _) = build_engine();
    create_template(&engine, "greeting", "v1").await;
    let mut ids = Vec::new();
    for i in 2..=5 {
        ids.push(add_version(&engine, "greeting", &format!("v{i}")).await.id);
    }

    for &id in ids.iter().rev().chain(ids.iter()) {
        engine.versions.activate_version(id, AUTHOR, None).await.unwrap();
        assert_eq!(active_versions(&engine, "greeting").await.len(), 1);
    }
}

#[tokio::test]
async fn concurrent_activations_leave_exactly_one_active() {
    let (engine, _) = build_engine();
    create_template(&engine, "greeting", "v1").await;
    let mut ids = Vec::new();
    for i in 2..=6 {
        ids.push(add_version(&engine, "greeting", &format!("v{i}")).await.id);
    }

    let activations = ids.iter().map(|&id| {
        let engine = engine.clone();
        tokio::spawn(async move { engine.versions.activate_version(id, AUTHOR, None).await })
    });
    for result in futures::future::join_all(activations).await {
        result.unwrap().unwrap();
    }

    let active = active_versions(&engine, "greeting").await;
    assert_eq!(active.len(), 1);
    let current = engine.versions.get_active("greeting").await.unwrap();
    assert_eq!(vec![current.version], active);
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rollback_copies_target_as_new_inactive_version() {
    let (engine, _) = build_engine();
    let v1 = engine
        .versions
        .create_template(CreateTemplateInput {
            name: "greeting".into(),
            fields: TemplateFields::new("Hello {{name}}")
                .with_category("onboarding")
                .with_tags(["friendly"])
                .with_parameters(vec![string_param("name", true, Some("there"))]),
            author: AUTHOR.into(),
        })
        .await
        .unwrap();
    add_version(&engine, "greeting", "Hi").await;
    let v3 = add_version(&engine, "greeting", "Hey").await;

    let rolled = engine.versions.rollback(v3.id, 1, "bob").await.unwrap();

    assert_eq!(rolled.version, 4);
    assert!(!rolled.is_active);
    assert_eq!(rolled.previous_version_id, Some(v3.id));
    assert_eq!(rolled.fields(), v1.fields());
    assert_eq!(rolled.created_by, "bob");

    let entry = &engine.versions.history("greeting").await.unwrap()[0];
    assert_eq!(entry.action().unwrap(), VersionAction::Rollback);
    assert_eq!(entry.version, 4);
    assert_eq!(entry.metadata.0[META_ROLLED_BACK_FROM], Value::from(3));
    assert_eq!(entry.metadata.0[META_ROLLED_BACK_TO], Value::from(1));

    assert_eq!(active_versions(&engine, "greeting").await, vec![1]);
}

#[tokio::test]
async fn rollback_to_missing_version_is_not_found() {
    let (engine, _) = build_engine();
    let v1 = create_template(&engine, "greeting", "v1").await;

    let err = engine.versions.rollback(v1.id, 9, AUTHOR).await.unwrap_err();

    assert_matches!(err, EngineError::Core(CoreError::NotFound { .. }));
}

// ---------------------------------------------------------------------------
// Family delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_family_removes_everything_for_the_name() {
    let (engine, store) = build_engine();
    let v1 = engine
        .versions
        .create_template(CreateTemplateInput {
            name: "greeting".into(),
            fields: TemplateFields::new("Hello {{name}}")
                .with_parameters(vec![string_param("name", false, None)]),
            author: AUTHOR.into(),
        })
        .await
        .unwrap();
    let v2 = add_version(&engine, "greeting", "Hi").await;
    engine.versions.activate_version(v2.id, AUTHOR, None).await.unwrap();
    engine
        .renderer
        .render_active("greeting", &Default::default())
        .await
        .unwrap();
    create_template(&engine, "farewell", "Bye").await;

    let before = store.family_counts("greeting").await;
    assert_eq!(before.versions, 2);
    assert_eq!(before.parameters, 1);
    assert_eq!(before.usage_records, 1);

    let deleted = engine.versions.delete_family(v1.id).await.unwrap();

    assert_eq!(deleted.deleted_versions, 2);
    assert_eq!(deleted.name, "greeting");
    assert_eq!(store.family_counts("greeting").await, FamilyCounts::default());
    assert!(engine.versions.list_versions("greeting").await.unwrap().is_empty());
    assert_eq!(store.family_counts("farewell").await.versions, 1);

    let err = engine.versions.get_template(v1.id).await.unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::NotFound { .. }));
}

#[tokio::test]
async fn delete_family_of_unknown_id_is_not_found() {
    let (engine, _) = build_engine();

    let err = engine.versions.delete_family(1).await.unwrap_err();

    assert_matches!(err, EngineError::Core(CoreError::NotFound { .. }));
}

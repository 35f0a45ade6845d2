//! End-to-end tests over in-memory providers: two separate stores for
//! tasks and users (so relationship filters correlate across providers),
//! plus a secrets store whose entity deliberately has no ACL.

use async_trait::async_trait;
use authgate_acl::{Acl, Permission, PermissionValue, RolePermissions};
use authgate_audit::{FieldSelection, Fragment, OperationDocument, RootField, Selection};
use authgate_core::{Action, EntityGraph, EntitySchema, Filter, Relation};
use authgate_datasource::{MemoryProvider, Record};
use authgate_engine::{
    with_authorization_context, AccessEngine, AuthorizationContext, EngineBuilder, EngineError,
    EntityHook, HookResult,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Route engine spans and warn logs to the test harness; safe to call
/// from every test, only the first registration wins.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn record(v: Value) -> Record {
    v.as_object().cloned().expect("object literal")
}

fn graph() -> EntityGraph {
    EntityGraph::new()
        .entity(
            EntitySchema::new("Task")
                .scalar("id")
                .scalar("title")
                .scalar("status")
                .scalar("owner")
                .scalar("assignee_id")
                .relation("assignee", Relation::new("User", "assignee_id", "id"))
                .relation("parent", Relation::new("Task", "parent_id", "id")),
        )
        .entity(
            EntitySchema::new("User")
                .scalar("id")
                .scalar("username")
                .relation("vault", Relation::new("Secret", "vault_id", "id")),
        )
        .entity(EntitySchema::new("Secret").scalar("id").scalar("payload"))
}

fn owner_filter(ctx: &AuthorizationContext) -> authgate_acl::Result<PermissionValue> {
    Ok(PermissionValue::Filtered(Filter::eq(
        "owner",
        ctx.user_id.clone(),
    )))
}

struct Fixture {
    builder: EngineBuilder,
    tasks: Arc<MemoryProvider>,
    users: Arc<MemoryProvider>,
    secrets: Arc<MemoryProvider>,
}

/// Standard wiring: admin is unconstrained, "banned" is an explicit deny
/// on everything, "user" may read/create/delete only their own tasks (and
/// has no update grant at all). `Secret` has no ACL registered.
fn fixture() -> Fixture {
    init_tracing();
    let tasks = Arc::new(MemoryProvider::new("task-store").with_transactions());
    tasks.load(
        "Task",
        vec![
            record(json!({"id": 1, "title": "write", "status": "open", "owner": "u1", "assignee_id": "a1"})),
            record(json!({"id": 2, "title": "review", "status": "closed", "owner": "u1", "assignee_id": "a2"})),
            record(json!({"id": 3, "title": "ship", "status": "open", "owner": "u2", "assignee_id": "a1"})),
        ],
    );

    let users = Arc::new(MemoryProvider::new("user-store"));
    users.load(
        "User",
        vec![
            record(json!({"id": "a1", "username": "alice"})),
            record(json!({"id": "a2", "username": "bob"})),
        ],
    );

    let secrets = Arc::new(MemoryProvider::new("secret-store"));
    secrets.load("Secret", vec![record(json!({"id": "s1", "payload": "x"}))]);

    let builder = AccessEngine::builder(graph())
        .acl(
            "Task",
            Acl::new()
                .role("admin", RolePermissions::new().all(true))
                .role("banned", RolePermissions::new().all(false))
                .role(
                    "user",
                    RolePermissions::new()
                        .action(Action::Read, Permission::dynamic(owner_filter))
                        .action(Action::Create, Permission::dynamic(owner_filter))
                        .action(Action::Delete, Permission::dynamic(owner_filter)),
                ),
        )
        .expect("task acl")
        .acl(
            "User",
            Acl::new().role(
                authgate_core::EVERYONE_ROLE,
                RolePermissions::new().action(Action::Read, true),
            ),
        )
        .expect("user acl")
        .source("Task", tasks.clone())
        .expect("bind tasks")
        .source("User", users.clone())
        .expect("bind users")
        .source("Secret", secrets.clone())
        .expect("bind secrets");

    Fixture {
        builder,
        tasks,
        users,
        secrets,
    }
}

fn ctx(user: &str, roles: &[&str]) -> AuthorizationContext {
    AuthorizationContext::new(user, roles.iter().map(|r| r.to_string()).collect())
}

fn ids(rows: &[Record]) -> Vec<Value> {
    rows.iter().map(|r| r["id"].clone()).collect()
}

#[tokio::test]
async fn test_audit_approves_and_carries_decisions() {
    let f = fixture();
    let engine = f.builder.build().expect("engine");

    let doc = OperationDocument::query(vec![RootField::read("Task").select(vec![
        Selection::field("id"),
        Selection::Field(FieldSelection::new("assignee").select(vec![Selection::field("username")])),
    ])]);
    let approved = engine.audit(&doc, &ctx("u1", &["admin"])).await.expect("approved");

    assert_eq!(approved.touches().len(), 2);
    assert!(approved.decision("Task", Action::Read).expect("decided").allowed);
    assert!(approved.decision("User", Action::Read).expect("decided").allowed);
}

#[tokio::test]
async fn test_missing_acl_denies_without_provider_call() {
    let f = fixture();
    let engine = f.builder.build().expect("engine");

    let doc = OperationDocument::query(vec![RootField::read("Secret")]);
    let err = engine.audit(&doc, &ctx("u1", &["admin"])).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    assert_eq!(f.secrets.find_calls(), 0);
}

#[tokio::test]
async fn test_fragment_reached_entity_is_still_checked() {
    let f = fixture();
    let engine = f.builder.build().expect("engine");

    // No direct selection touches Secret; only the fragment does
    let doc = OperationDocument::query(vec![
        RootField::read("Task").select(vec![Selection::spread("leak")])
    ])
    .fragment(Fragment::new(
        "leak",
        "Secret",
        vec![Selection::field("payload")],
    ));

    let err = engine.audit(&doc, &ctx("u1", &["admin"])).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    assert_eq!(f.tasks.find_calls(), 0);
    assert_eq!(f.secrets.find_calls(), 0);
}

#[tokio::test]
async fn test_filter_reached_entity_denies_whole_operation() {
    let f = fixture();
    let engine = f.builder.build().expect("engine");

    // The filter path traverses User into Secret; nothing of Secret is
    // returned, but the whole operation still fails atomically
    let doc = OperationDocument::query(vec![RootField::read("Task")
        .filter(Filter::eq("assignee.vault.payload", "x"))
        .select(vec![Selection::field("id")])]);

    let err = engine.audit(&doc, &ctx("u1", &["admin"])).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    assert_eq!(f.tasks.find_calls(), 0);
    assert_eq!(f.users.find_calls(), 0);
    assert_eq!(f.secrets.find_calls(), 0);
}

#[tokio::test]
async fn test_depth_limit_checked_before_anything_else() {
    let f = fixture();
    let engine = f.builder.build().expect("engine");

    fn chain(hops: usize) -> Vec<Selection> {
        let mut sel = vec![Selection::field("id")];
        for _ in 0..hops {
            sel = vec![Selection::Field(FieldSelection::new("parent").select(sel))];
        }
        sel
    }

    let ok = OperationDocument::query(vec![RootField::read("Task").select(chain(5))]);
    assert!(engine.audit(&ok, &ctx("u1", &["admin"])).await.is_ok());

    let too_deep = OperationDocument::query(vec![RootField::read("Task").select(chain(6))]);
    let err = engine.audit(&too_deep, &ctx("u1", &["admin"])).await.unwrap_err();
    assert_eq!(err.to_string(), "Query depth limit of 6 exceeded");
    assert_eq!(f.tasks.find_calls(), 0);
}

#[tokio::test]
async fn test_deny_overrides_end_to_end() {
    let f = fixture();
    let engine = f.builder.build().expect("engine");

    // admin alone is unconstrained; adding the revocation role denies
    let rows = engine
        .find("Task", &ctx("u1", &["admin"]), None, None, None)
        .await
        .expect("admin find");
    assert_eq!(rows.len(), 3);

    let err = engine
        .find("Task", &ctx("u1", &["admin", "banned"]), None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn test_denial_messages_are_indistinguishable() {
    let f = fixture();
    let engine = f.builder.build().expect("engine");

    // Missing ACL vs explicit deny vs no contribution: same bytes out
    let missing_acl = engine
        .audit(&OperationDocument::query(vec![RootField::read("Secret")]), &ctx("u1", &["admin"]))
        .await
        .unwrap_err();
    let explicit_deny = engine
        .find("Task", &ctx("u1", &["banned"]), None, None, None)
        .await
        .unwrap_err();
    let no_grant = engine
        .update_one("Task", &ctx("u1", &["user"]), Filter::eq("id", 1), Record::new())
        .await
        .unwrap_err();

    assert_eq!(missing_acl.to_string(), "Not authorized");
    assert_eq!(missing_acl.to_string(), explicit_deny.to_string());
    assert_eq!(missing_acl.to_string(), no_grant.to_string());
}

#[tokio::test]
async fn test_consolidated_filter_constrains_find() {
    let f = fixture();
    let engine = f.builder.build().expect("engine");

    let rows = engine
        .find("Task", &ctx("u1", &["user"]), None, None, None)
        .await
        .expect("find");
    assert_eq!(ids(&rows), vec![json!(1), json!(2)]);

    // Caller filter is ANDed with the consolidated constraint
    let rows = engine
        .find(
            "Task",
            &ctx("u1", &["user"]),
            Some(Filter::eq("status", "open")),
            None,
            None,
        )
        .await
        .expect("find");
    assert_eq!(ids(&rows), vec![json!(1)]);

    // The caller filter can never widen past the ACL constraint
    let rows = engine
        .find(
            "Task",
            &ctx("u1", &["user"]),
            Some(Filter::eq("owner", "u2")),
            None,
            None,
        )
        .await
        .expect("find");
    assert!(rows.is_empty());
}

struct OpenOnly;

#[async_trait]
impl EntityHook for OpenOnly {
    async fn before(&self, _ctx: &AuthorizationContext) -> HookResult<Option<Filter>> {
        Ok(Some(Filter::eq("status", "open")))
    }
}

struct DropTitles;

#[async_trait]
impl EntityHook for DropTitles {
    async fn after(
        &self,
        _ctx: &AuthorizationContext,
        mut records: Vec<Record>,
    ) -> HookResult<Vec<Record>> {
        for r in &mut records {
            r.remove("title");
        }
        Ok(records)
    }
}

#[tokio::test]
async fn test_hooks_narrow_and_reshape() {
    let f = fixture();
    let engine = f
        .builder
        .hook("Task", Action::Read, Arc::new(OpenOnly))
        .hook("Task", Action::Read, Arc::new(DropTitles))
        .build()
        .expect("engine");

    // The hook filter narrows even an unconstrained admin grant
    let rows = engine
        .find("Task", &ctx("u1", &["admin"]), None, None, None)
        .await
        .expect("find");
    assert_eq!(ids(&rows), vec![json!(1), json!(3)]);
    assert!(rows.iter().all(|r| r.get("title").is_none()));
}

#[tokio::test]
async fn test_relationship_filter_correlates_across_providers() {
    let f = fixture();
    let engine = f.builder.build().expect("engine");

    let rows = engine
        .find(
            "Task",
            &ctx("u1", &["admin"]),
            Some(Filter::eq("assignee.username", "alice")),
            None,
            None,
        )
        .await
        .expect("correlated find");

    // Inner join: only tasks whose assignee_id matched a user id
    assert_eq!(ids(&rows), vec![json!(1), json!(3)]);
    assert_eq!(f.users.find_calls(), 1);
    assert_eq!(f.tasks.find_calls(), 1);
}

#[tokio::test]
async fn test_find_related_batches_one_call() {
    let f = fixture();
    let engine = f.builder.build().expect("engine");
    let admin = ctx("u1", &["admin"]);

    let parents = engine
        .find("Task", &admin, None, None, None)
        .await
        .expect("parents");
    let related = engine
        .find_related("Task", "assignee", &parents, &admin, None)
        .await
        .expect("related");

    assert_eq!(related.len(), 2);
    // One provider call for the whole parent set
    assert_eq!(f.users.find_calls(), 1);

    let alice_only = engine
        .find_related(
            "Task",
            "assignee",
            &parents,
            &admin,
            Some(Filter::eq("username", "alice")),
        )
        .await
        .expect("related filtered");
    assert_eq!(ids(&alice_only), vec![json!("a1")]);
}

#[tokio::test]
async fn test_find_one_honors_acl_filter() {
    let f = fixture();
    let engine = f.builder.build().expect("engine");

    // Task 3 belongs to u2; u1 sees nothing through the same selector
    let row = engine
        .find_one("Task", &ctx("u2", &["user"]), Some(Filter::eq("id", 3)))
        .await
        .expect("find_one");
    assert_eq!(row.expect("visible")["id"], json!(3));

    let hidden = engine
        .find_one("Task", &ctx("u1", &["user"]), Some(Filter::eq("id", 3)))
        .await
        .expect("find_one");
    assert!(hidden.is_none());
}

#[tokio::test]
async fn test_denied_mutation_never_opens_transaction() {
    let f = fixture();
    let engine = f.builder.build().expect("engine");

    // "user" has no update grant at all
    let err = engine
        .update_one(
            "Task",
            &ctx("u1", &["user"]),
            Filter::eq("id", 1),
            record(json!({"status": "closed"})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    assert_eq!(f.tasks.begin_calls(), 0);
    assert_eq!(f.tasks.mutation_calls(), 0);
}

#[tokio::test]
async fn test_allowed_mutation_brackets_and_commits() {
    let f = fixture();
    let engine = f.builder.build().expect("engine");

    let updated = engine
        .update_one(
            "Task",
            &ctx("u1", &["admin"]),
            Filter::eq("id", 1),
            record(json!({"status": "closed"})),
        )
        .await
        .expect("update")
        .expect("matched");
    assert_eq!(updated["status"], json!("closed"));
    assert_eq!(f.tasks.begin_calls(), 1);
    assert_eq!(f.tasks.commits(), 1);
    assert_eq!(f.tasks.rollbacks(), 0);
}

#[tokio::test]
async fn test_create_must_satisfy_consolidated_constraint() {
    let f = fixture();
    let engine = f.builder.build().expect("engine");
    let user = ctx("u1", &["user"]);

    let created = engine
        .create_one(
            "Task",
            &user,
            record(json!({"id": 4, "title": "new", "status": "open", "owner": "u1"})),
        )
        .await
        .expect("create own task");
    assert_eq!(created["id"], json!(4));

    // Creating a row outside the constraint is the same generic denial
    let err = engine
        .create_one(
            "Task",
            &user,
            record(json!({"id": 5, "title": "planted", "status": "open", "owner": "u2"})),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Not authorized");
    assert_eq!(f.tasks.mutation_calls(), 1);
}

#[tokio::test]
async fn test_delete_selector_cannot_reach_hidden_rows() {
    let f = fixture();
    let engine = f.builder.build().expect("engine");

    // Task 3 is owned by u2: u1's delete is allowed but matches nothing
    let gone = engine
        .delete_one("Task", &ctx("u1", &["user"]), Filter::eq("id", 3))
        .await
        .expect("delete");
    assert!(gone.is_none());

    let gone = engine
        .delete_one("Task", &ctx("u2", &["user"]), Filter::eq("id", 3))
        .await
        .expect("delete")
        .expect("matched");
    assert_eq!(gone["id"], json!(3));
}

#[tokio::test]
async fn test_scoped_context_wraps_a_request() {
    let f = fixture();
    let engine = Arc::new(f.builder.build().expect("engine"));

    let rows = with_authorization_context(ctx("u1", &["user"]), |ctx| {
        let engine = Arc::clone(&engine);
        async move { engine.find("Task", &ctx, None, None, None).await }
    })
    .await
    .expect("scoped find");
    assert_eq!(rows.len(), 2);
}

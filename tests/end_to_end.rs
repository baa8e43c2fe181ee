//! Crate-level integration tests exercising the public API across module
//! boundaries: token issuance through `IdentityProvider`, dispatch through
//! `Authenticator`, and permission checks through the resulting `Caller`.

mod support;

use std::sync::Arc;
use std::time::Duration;

use tharsis_auth::auth::InternalIdpAuthenticator;
use tharsis_auth::authz::{builtin_roles, Action, Permission, ResourceType};
use tharsis_auth::caller::{constraints::Constraints, Caller};
use tharsis_auth::model::{Namespace, NamespaceKind, Role};
use tharsis_auth::{AuthError, Authenticator, IdentityProvider};

use support::{bootstrapped_key_manager, membership, FakeStore};

const ISSUER: &str = "https://tharsis.example.com";

/// S1 (service-account token), `spec.md` §8: mint, authenticate, and
/// confirm permission checks respect the granted namespace membership.
#[tokio::test]
async fn service_account_token_round_trips_through_authenticator() {
    let store = Arc::new(FakeStore::default());
    store.roles.lock().unwrap().insert("viewer".to_string(), Role {
        id: "viewer".to_string(),
        name: "viewer".to_string(),
        permissions: builtin_roles::viewer_permissions(),
    });
    store.memberships.lock().unwrap().push(membership("sa-1", "org", "viewer"));
    store.namespaces.lock().unwrap().insert(
        "W".to_string(),
        Namespace { id: "W".to_string(), full_path: "org/ws1".to_string(), kind: NamespaceKind::Workspace },
    );
    store.namespaces.lock().unwrap().insert(
        "W2".to_string(),
        Namespace { id: "W2".to_string(), full_path: "other/ws2".to_string(), kind: NamespaceKind::Workspace },
    );

    let key_manager = bootstrapped_key_manager(store.clone()).await;
    let identity = Arc::new(IdentityProvider::new(key_manager));

    let token = identity
        .mint_service_account_token("sa-1", "org/team", Duration::from_secs(900))
        .await
        .unwrap();

    let internal = InternalIdpAuthenticator::new(ISSUER, identity, store);
    let authenticator = Authenticator::new(vec![Box::new(internal)]);

    let caller = authenticator.authenticate(&token, true).await.unwrap();
    let Caller::ServiceAccount(sa) = &caller else { panic!("expected ServiceAccountCaller") };
    assert_eq!(sa.service_account_id, "sa-1");
    assert_eq!(sa.path, "org/team");

    let in_org = Constraints { workspace_id: Some("W".to_string()), ..Default::default() };
    caller.require_permission(Permission::view(ResourceType::Workspace), &in_org).await.unwrap();

    let outside_org = Constraints { workspace_id: Some("W2".to_string()), ..Default::default() };
    let err = caller.require_permission(Permission::view(ResourceType::Workspace), &outside_org).await.unwrap_err();
    assert!(matches!(err, AuthError::NotFound));
}

/// Property 1 (`spec.md` §8): dispatch to an unclaimed issuer fails
/// `Unauthorized` with the issuer named in the message, rather than
/// silently matching the wrong sub-authenticator.
#[tokio::test]
async fn unknown_issuer_is_rejected_with_issuer_named_in_the_message() {
    let store = Arc::new(FakeStore::default());
    let key_manager = bootstrapped_key_manager(store.clone()).await;
    let identity = Arc::new(IdentityProvider::new(key_manager));

    let token = identity
        .mint_service_account_token("sa-1", "org/team", Duration::from_secs(900))
        .await
        .unwrap();

    // Authenticator configured for a *different* issuer than the one that
    // signed the token.
    let internal = InternalIdpAuthenticator::new("https://some-other-issuer.example.com", identity, store);
    let authenticator = Authenticator::new(vec![Box::new(internal)]);

    let err = authenticator.authenticate(&token, true).await.unwrap_err();
    match err {
        AuthError::Unauthorized(msg) => assert!(msg.contains(ISSUER), "expected {msg:?} to mention {ISSUER:?}"),
        other => panic!("expected Unauthorized, got {other:?}"),
    }
}

/// Property 3 (`spec.md` §8): across a rotation, the in-memory JWKS keeps
/// serving both the outgoing (Decommissioning) and incoming (Active) key,
/// and at most one key is ever Active.
#[tokio::test]
async fn rotation_keeps_both_keys_published_with_only_one_active() {
    use tharsis_auth::model::SigningKeyStatus;

    let store = Arc::new(FakeStore::default());
    let key_manager = bootstrapped_key_manager(store.clone()).await;

    let before = key_manager.jwk_set().await;
    assert_eq!(before.keys.len(), 1);

    key_manager.rotate().await.unwrap();

    let after = key_manager.jwk_set().await;
    assert_eq!(after.keys.len(), 2, "both the outgoing and incoming key must still be published");

    let statuses: Vec<SigningKeyStatus> =
        store.signing_keys.lock().unwrap().values().map(|k| k.status).collect();
    let active_count = statuses.iter().filter(|s| **s == SigningKeyStatus::Active).count();
    assert_eq!(active_count, 1, "at most one key may be Active at a time");
    assert!(statuses.contains(&SigningKeyStatus::Decommissioning));
}

/// Property 6 (`spec.md` §8): deepest membership wins regardless of
/// ancestor roles, exercised end-to-end via a minted `UserCaller` rather
/// than `NamespaceAuthorizer` directly.
#[tokio::test]
async fn user_caller_permission_check_honours_deepest_membership() {
    let store = Arc::new(FakeStore::default());
    store.users.lock().unwrap().insert(
        "u1".to_string(),
        tharsis_auth::model::User {
            id: "u1".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            active: true,
            admin: false,
            external_identity: None,
            scim_external_id: None,
        },
    );
    store.roles.lock().unwrap().insert(
        "owner".to_string(),
        Role { id: "owner".to_string(), name: "owner".to_string(), permissions: builtin_roles::owner_permissions() },
    );
    store.roles.lock().unwrap().insert(
        "deployer".to_string(),
        Role {
            id: "deployer".to_string(),
            name: "deployer".to_string(),
            permissions: builtin_roles::deployer_permissions(),
        },
    );
    store.memberships.lock().unwrap().extend([membership("u1", "a", "owner"), membership("u1", "a/b", "deployer")]);

    let key_manager = bootstrapped_key_manager(store.clone()).await;
    let identity = Arc::new(IdentityProvider::new(key_manager));
    let token = identity.mint_user_session_access_token("u1", "sess-1", Duration::from_secs(900)).await.unwrap();

    let internal = InternalIdpAuthenticator::new(ISSUER, identity, store);
    let authenticator = Authenticator::new(vec![Box::new(internal)]);
    let caller = authenticator.authenticate(&token, true).await.unwrap();

    let at_ab = Constraints { namespace_path: Some("a/b".to_string()), ..Default::default() };
    // Deployer can create a run...
    caller.require_permission(Permission::new(Action::Create, ResourceType::Run), &at_ab).await.unwrap();
    // ...but not delete a workspace, even though an Owner role exists at
    // the ancestor "a" — the deeper Deployer membership wins outright.
    let err = caller
        .require_permission(Permission::new(Action::Delete, ResourceType::Workspace), &at_ab)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Forbidden(_)), "expected Forbidden (viewer access held), got {err:?}");
}

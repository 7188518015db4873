//! Token issuance, verification, rotation and revocation against the
//! in-memory session store with a manually driven clock.

use catalog_auth::application_impl::*;
use catalog_auth::application_port::*;
use catalog_auth::domain_model::*;
use catalog_auth::domain_port::*;
use catalog_auth::infra_memory::MemoryAuthSessionStore;
use catalog_auth::logger::init_test_logging;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Credential store keyed by id so tests can pick ids like 42.
#[derive(Default)]
struct RoleTable {
    roles: RwLock<HashMap<UserId, Role>>,
}

impl RoleTable {
    fn with(users: &[(i64, Role)]) -> Self {
        let table = RoleTable::default();
        for (id, role) in users {
            table.set(UserId(*id), *role);
        }
        table
    }

    fn set(&self, user_id: UserId, role: Role) {
        self.roles.write().unwrap().insert(user_id, role);
    }

    fn remove(&self, user_id: UserId) {
        self.roles.write().unwrap().remove(&user_id);
    }
}

#[async_trait::async_trait]
impl UserRepo for RoleTable {
    async fn find_by_username(&self, _: &str) -> Result<Option<UserCredentials>, AuthError> {
        Ok(None)
    }

    async fn find_role_by_id(&self, user_id: UserId) -> Result<Option<Role>, AuthError> {
        Ok(self.roles.read().unwrap().get(&user_id).copied())
    }

    async fn username_exists(&self, _: &str) -> Result<bool, AuthError> {
        Ok(false)
    }

    async fn create_user(&self, _: &str, _: &str, _: Role) -> Result<UserId, AuthError> {
        Err(AuthError::InternalError("read-only".to_string()))
    }
}

/// Session store whose backend is always down.
struct UnreachableStore;

fn unreachable() -> AuthError {
    AuthError::UpstreamUnavailable("connection refused".to_string())
}

#[async_trait::async_trait]
impl AuthSessionStore for UnreachableStore {
    async fn add_refresh(
        &self,
        _: UserId,
        _: &str,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        Err(unreachable())
    }

    async fn is_refresh_active(
        &self,
        _: UserId,
        _: &str,
        _: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        Err(unreachable())
    }

    async fn rotate_refresh(
        &self,
        _: UserId,
        _: &str,
        _: &str,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        Err(unreachable())
    }

    async fn remove_refresh(&self, _: UserId, _: &str) -> Result<(), AuthError> {
        Err(unreachable())
    }

    async fn remove_all_refresh(&self, _: UserId) -> Result<(), AuthError> {
        Err(unreachable())
    }

    async fn count_refresh(&self, _: UserId, _: DateTime<Utc>) -> Result<usize, AuthError> {
        Err(unreachable())
    }

    async fn save_access(
        &self,
        _: &str,
        _: UserId,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        Err(unreachable())
    }

    async fn is_access_active(&self, _: &str, _: DateTime<Utc>) -> Result<bool, AuthError> {
        Err(unreachable())
    }

    async fn remove_access(&self, _: &str) -> Result<(), AuthError> {
        Err(unreachable())
    }
}

fn jwt_config(access_secret: &[u8]) -> JwtConfig {
    JwtConfig {
        issuer: "catalog.auth".to_string(),
        audience: "catalog-web".to_string(),
        access_ttl: Duration::minutes(10),
        refresh_ttl: Duration::days(7),
        access_secret: access_secret.to_vec(),
        refresh_secret: b"refresh-secret".to_vec(),
    }
}

struct Harness {
    clock: Arc<ManualClock>,
    users: Arc<RoleTable>,
    tokens: Arc<RealTokenService>,
}

fn harness_with(tracking: AccessTracking, store: Arc<dyn AuthSessionStore>) -> Harness {
    init_test_logging();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let users = Arc::new(RoleTable::with(&[
        (1, Role::User),
        (2, Role::User),
        (42, Role::Admin),
    ]));
    let tokens = Arc::new(RealTokenService::new(
        Arc::new(JwtHs256Codec::new(jwt_config(b"access-secret"))),
        store,
        users.clone(),
        clock.clone(),
        tracking,
    ));
    Harness {
        clock,
        users,
        tokens,
    }
}

fn harness(tracking: AccessTracking) -> Harness {
    harness_with(tracking, Arc::new(MemoryAuthSessionStore::new()))
}

#[tokio::test]
async fn access_token_verifies_to_its_user() {
    let h = harness(AccessTracking::Stateless);

    for (id, role) in [(1, Role::User), (2, Role::User), (42, Role::Admin)] {
        let pair = h.tokens.issue_token_pair(UserId(id), role).await.unwrap();
        let claims = h
            .tokens
            .verify_access(&pair.access_token)
            .await
            .unwrap()
            .expect("fresh access token verifies");
        assert_eq!(claims.user_id, UserId(id));
        assert_eq!(claims.role, role);
        assert!(claims.expires_at > claims.issued_at);
    }
}

#[tokio::test]
async fn refresh_token_rotates_exactly_once() {
    let h = harness(AccessTracking::Stateless);
    let pair = h.tokens.issue_token_pair(UserId(1), Role::User).await.unwrap();

    let rotated = h.tokens.rotate_refresh(&pair.refresh_token).await.unwrap();
    assert!(rotated.is_some());

    let replay = h.tokens.rotate_refresh(&pair.refresh_token).await.unwrap();
    assert!(replay.is_none());
    assert_eq!(h.tokens.active_sessions(UserId(1)).await.unwrap(), 1);
}

#[tokio::test]
async fn revoked_refresh_token_cannot_rotate() {
    let h = harness(AccessTracking::Stateless);
    let pair = h.tokens.issue_token_pair(UserId(2), Role::User).await.unwrap();

    h.tokens.revoke(UserId(2), &pair.refresh_token).await.unwrap();
    // idempotent
    h.tokens.revoke(UserId(2), &pair.refresh_token).await.unwrap();

    assert!(h.tokens.rotate_refresh(&pair.refresh_token).await.unwrap().is_none());
    assert_eq!(h.tokens.active_sessions(UserId(2)).await.unwrap(), 0);
}

#[tokio::test]
async fn expired_access_token_is_rejected() {
    let h = harness(AccessTracking::Stateless);
    let pair = h.tokens.issue_token_pair(UserId(1), Role::User).await.unwrap();

    h.clock.advance(Duration::minutes(9));
    assert!(h.tokens.verify_access(&pair.access_token).await.unwrap().is_some());

    h.clock.advance(Duration::minutes(1) + Duration::seconds(1));
    assert!(h.tokens.verify_access(&pair.access_token).await.unwrap().is_none());
}

#[tokio::test]
async fn expired_refresh_token_cannot_rotate() {
    let h = harness(AccessTracking::Stateless);
    let pair = h.tokens.issue_token_pair(UserId(1), Role::User).await.unwrap();

    h.clock.advance(Duration::days(7) + Duration::seconds(1));
    assert!(h.tokens.rotate_refresh(&pair.refresh_token).await.unwrap().is_none());
    assert_eq!(h.tokens.active_sessions(UserId(1)).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rotations_have_one_winner() {
    let h = harness(AccessTracking::Stateless);
    let pair = h.tokens.issue_token_pair(UserId(1), Role::User).await.unwrap();

    let attempts = (0..8).map(|_| {
        let tokens = h.tokens.clone();
        let refresh_token = pair.refresh_token.clone();
        tokio::spawn(async move { tokens.rotate_refresh(&refresh_token).await })
    });
    let results = futures_util::future::join_all(attempts).await;

    let winners: Vec<AuthTokens> = results
        .into_iter()
        .filter_map(|joined| joined.unwrap().unwrap())
        .collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(h.tokens.active_sessions(UserId(1)).await.unwrap(), 1);

    // the survivor is the winner's token, and it still works
    let next = h.tokens.rotate_refresh(&winners[0].refresh_token).await.unwrap();
    assert!(next.is_some());
}

#[tokio::test]
async fn login_rotate_revoke_scenario() {
    let h = harness(AccessTracking::Stateless);
    let user = UserId(42);

    let first = h.tokens.issue_token_pair(user, Role::Admin).await.unwrap();
    let second = h
        .tokens
        .rotate_refresh(&first.refresh_token)
        .await
        .unwrap()
        .expect("R1 rotates");

    assert_ne!(first.refresh_token, second.refresh_token);
    assert!(h.tokens.rotate_refresh(&first.refresh_token).await.unwrap().is_none());
    let claims = h
        .tokens
        .verify_access(&second.access_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claims.user_id, user);
    assert_eq!(claims.role, Role::Admin);

    h.tokens.revoke(user, &second.refresh_token).await.unwrap();
    assert!(h.tokens.rotate_refresh(&second.refresh_token).await.unwrap().is_none());
}

#[tokio::test]
async fn forged_access_token_is_rejected_whatever_its_role() {
    let h = harness(AccessTracking::Stateless);
    let attacker = JwtHs256Codec::new(jwt_config(b"not-the-real-secret"));

    for role in [Role::User, Role::Admin] {
        let forged = attacker
            .encode(TokenKind::Access, UserId(42), role, h.clock.now())
            .unwrap();
        let verdict = h
            .tokens
            .verify_access(&AccessToken(forged.token))
            .await
            .unwrap();
        assert!(verdict.is_none());
    }
}

#[tokio::test]
async fn token_kinds_do_not_cross() {
    let h = harness(AccessTracking::Stateless);
    let pair = h.tokens.issue_token_pair(UserId(1), Role::User).await.unwrap();

    let as_access = AccessToken(pair.refresh_token.0.clone());
    assert!(h.tokens.verify_access(&as_access).await.unwrap().is_none());

    let as_refresh = RefreshToken(pair.access_token.0.clone());
    assert!(h.tokens.rotate_refresh(&as_refresh).await.unwrap().is_none());
}

#[tokio::test]
async fn rotation_rereads_the_role() {
    let h = harness(AccessTracking::Stateless);
    let pair = h.tokens.issue_token_pair(UserId(2), Role::User).await.unwrap();

    h.users.set(UserId(2), Role::Admin);
    let promoted = h
        .tokens
        .rotate_refresh(&pair.refresh_token)
        .await
        .unwrap()
        .unwrap();
    let claims = h
        .tokens
        .verify_access(&promoted.access_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claims.role, Role::Admin);

    h.users.set(UserId(2), Role::User);
    let demoted = h
        .tokens
        .rotate_refresh(&promoted.refresh_token)
        .await
        .unwrap()
        .unwrap();
    let claims = h
        .tokens
        .verify_access(&demoted.access_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claims.role, Role::User);
}

#[tokio::test]
async fn deleted_user_cannot_rotate() {
    let h = harness(AccessTracking::Stateless);
    let pair = h.tokens.issue_token_pair(UserId(1), Role::User).await.unwrap();

    h.users.remove(UserId(1));
    assert!(h.tokens.rotate_refresh(&pair.refresh_token).await.unwrap().is_none());
}

#[tokio::test]
async fn revoking_under_another_user_changes_nothing() {
    let h = harness(AccessTracking::Stateless);
    let pair = h.tokens.issue_token_pair(UserId(1), Role::User).await.unwrap();

    h.tokens.revoke(UserId(2), &pair.refresh_token).await.unwrap();
    assert_eq!(h.tokens.active_sessions(UserId(1)).await.unwrap(), 1);
    assert!(h.tokens.rotate_refresh(&pair.refresh_token).await.unwrap().is_some());
}

#[tokio::test]
async fn devices_hold_independent_sessions() {
    let h = harness(AccessTracking::Stateless);
    let laptop = h.tokens.issue_token_pair(UserId(1), Role::User).await.unwrap();
    let phone = h.tokens.issue_token_pair(UserId(1), Role::User).await.unwrap();
    assert_eq!(h.tokens.active_sessions(UserId(1)).await.unwrap(), 2);

    h.tokens.revoke(UserId(1), &laptop.refresh_token).await.unwrap();
    assert_eq!(h.tokens.active_sessions(UserId(1)).await.unwrap(), 1);
    assert!(h.tokens.rotate_refresh(&laptop.refresh_token).await.unwrap().is_none());
    assert!(h.tokens.rotate_refresh(&phone.refresh_token).await.unwrap().is_some());
}

#[tokio::test]
async fn revoke_all_ends_every_session() {
    let h = harness(AccessTracking::Stateless);
    let a = h.tokens.issue_token_pair(UserId(1), Role::User).await.unwrap();
    let b = h.tokens.issue_token_pair(UserId(1), Role::User).await.unwrap();
    let other = h.tokens.issue_token_pair(UserId(2), Role::User).await.unwrap();

    h.tokens.revoke_all(UserId(1)).await.unwrap();

    assert_eq!(h.tokens.active_sessions(UserId(1)).await.unwrap(), 0);
    assert!(h.tokens.rotate_refresh(&a.refresh_token).await.unwrap().is_none());
    assert!(h.tokens.rotate_refresh(&b.refresh_token).await.unwrap().is_none());
    assert!(h.tokens.rotate_refresh(&other.refresh_token).await.unwrap().is_some());
}

#[tokio::test]
async fn stateless_access_tokens_survive_revoke_access() {
    let h = harness(AccessTracking::Stateless);
    let pair = h.tokens.issue_token_pair(UserId(1), Role::User).await.unwrap();

    h.tokens.revoke_access(&pair.access_token).await.unwrap();
    assert!(h.tokens.verify_access(&pair.access_token).await.unwrap().is_some());
}

#[tokio::test]
async fn tracked_access_tokens_can_be_revoked_early() {
    let h = harness(AccessTracking::Tracked);
    let pair = h.tokens.issue_token_pair(UserId(1), Role::User).await.unwrap();
    assert!(h.tokens.verify_access(&pair.access_token).await.unwrap().is_some());

    h.tokens.revoke_access(&pair.access_token).await.unwrap();
    assert!(h.tokens.verify_access(&pair.access_token).await.unwrap().is_none());
}

#[tokio::test]
async fn tracked_rotation_registers_the_new_access_token() {
    let h = harness(AccessTracking::Tracked);
    let pair = h.tokens.issue_token_pair(UserId(1), Role::User).await.unwrap();

    let rotated = h
        .tokens
        .rotate_refresh(&pair.refresh_token)
        .await
        .unwrap()
        .unwrap();
    assert!(h.tokens.verify_access(&rotated.access_token).await.unwrap().is_some());

    h.clock.advance(Duration::minutes(11));
    assert!(h.tokens.verify_access(&rotated.access_token).await.unwrap().is_none());
}

#[tokio::test]
async fn store_outage_is_an_error_not_a_rejection() {
    let h = harness_with(AccessTracking::Stateless, Arc::new(UnreachableStore));

    let issued = h.tokens.issue_token_pair(UserId(1), Role::User).await;
    assert!(matches!(issued, Err(AuthError::UpstreamUnavailable(_))));

    let codec = JwtHs256Codec::new(jwt_config(b"access-secret"));
    let access = codec
        .encode(TokenKind::Access, UserId(1), Role::User, h.clock.now())
        .unwrap();
    let refresh = codec
        .encode(TokenKind::Refresh, UserId(1), Role::User, h.clock.now())
        .unwrap();

    // stateless verification never touches the store
    let verdict = h.tokens.verify_access(&AccessToken(access.token.clone())).await;
    assert!(matches!(verdict, Ok(Some(_))));

    let rotated = h.tokens.rotate_refresh(&RefreshToken(refresh.token)).await;
    assert!(matches!(rotated, Err(AuthError::UpstreamUnavailable(_))));

    let tracked = harness_with(AccessTracking::Tracked, Arc::new(UnreachableStore));
    let verdict = tracked.tokens.verify_access(&AccessToken(access.token)).await;
    assert!(matches!(verdict, Err(AuthError::UpstreamUnavailable(_))));
}

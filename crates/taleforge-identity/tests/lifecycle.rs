//! Integration tests for identifier collisions, retries, and concurrent
//! logins, using a scripted token generator.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use argon2::Params;
use taleforge_identity::{
    Argon2Hasher, CredentialHasher, IdentityConfig, IdentityError, IdentityManager, TokenGenerator,
};
use taleforge_protocol::{ErrorKind, ManualClock, ProfileUpdate, UserId};
use taleforge_store::{MemoryStore, Store, Transaction};
use uuid::Uuid;

// =========================================================================
// Scripted hooks
// =========================================================================

/// Hands out queued tokens and ids first, then falls back to fresh ones.
#[derive(Default)]
struct Scripted {
    tokens: Mutex<VecDeque<String>>,
    ids: Mutex<VecDeque<UserId>>,
    fallback: AtomicU64,
}

impl Scripted {
    fn new(tokens: &[&str], ids: &[UserId]) -> Self {
        Self {
            tokens: Mutex::new(tokens.iter().map(|t| t.to_string()).collect()),
            ids: Mutex::new(ids.iter().copied().collect()),
            fallback: AtomicU64::new(0),
        }
    }
}

impl TokenGenerator for Scripted {
    fn token(&self) -> String {
        self.tokens.lock().unwrap().pop_front().unwrap_or_else(|| {
            format!("auto-{}", self.fallback.fetch_add(1, Ordering::SeqCst))
        })
    }

    fn user_id(&self) -> UserId {
        self.ids.lock().unwrap().pop_front().unwrap_or_else(UserId::random)
    }
}

struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, plaintext: &str) -> Result<String, IdentityError> {
        Ok(format!("plain:{plaintext}"))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        hash.strip_prefix("plain:") == Some(plaintext)
    }
}

/// Plain hashing, but `verify` reports that it started and then waits to
/// be released.
struct GatedHasher {
    entered: mpsc::Sender<()>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl CredentialHasher for GatedHasher {
    fn hash(&self, plaintext: &str) -> Result<String, IdentityError> {
        PlainHasher.hash(plaintext)
    }

    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let _ = self.entered.send(());
        let _ = self.release.lock().unwrap().recv();
        PlainHasher.verify(plaintext, hash)
    }
}

fn uid(n: u128) -> UserId {
    UserId(Uuid::from_u128(n))
}

fn manager(
    store: &Arc<MemoryStore>,
    tokens: Scripted,
) -> IdentityManager<MemoryStore> {
    IdentityManager::new(Arc::clone(store), IdentityConfig::default())
        .with_hasher(Arc::new(PlainHasher))
        .with_tokens(Arc::new(tokens))
        .with_clock(Arc::new(ManualClock::default()))
}

// =========================================================================
// User id collisions
// =========================================================================

#[tokio::test]
async fn test_confirm_registration_retries_on_user_id_collision() {
    let store = Arc::new(MemoryStore::new());
    let identity = manager(
        &store,
        Scripted::new(&["a-link", "a-acc", "b-link", "b-acc"], &[uid(1), uid(1), uid(2)]),
    );

    identity.request_registration("alice@example.com", "pw").await.unwrap();
    assert_eq!(identity.confirm_registration("a-link").await.unwrap(), "a-acc");

    identity.request_registration("bob@example.com", "pw").await.unwrap();
    assert_eq!(identity.confirm_registration("b-link").await.unwrap(), "b-acc");

    assert_eq!(identity.validate_token("a-acc").await.unwrap(), uid(1));
    assert_eq!(identity.validate_token("b-acc").await.unwrap(), uid(2));
}

#[tokio::test]
async fn test_confirm_registration_exhausted_retries_is_internal_and_rolls_back() {
    let store = Arc::new(MemoryStore::new());
    let identity = manager(
        &store,
        Scripted::new(&["a-link", "a-acc", "b-link"], &[uid(1), uid(1), uid(1), uid(1)]),
    );

    identity.request_registration("alice@example.com", "pw").await.unwrap();
    identity.confirm_registration("a-link").await.unwrap();
    identity.request_registration("bob@example.com", "pw").await.unwrap();

    let err = identity.confirm_registration("b-link").await.unwrap_err();
    assert!(matches!(err, IdentityError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(err.kind(), ErrorKind::InternalError);

    // Nothing from the failed attempts was kept: the link still works once
    // the generator stops colliding.
    let access = identity.confirm_registration("b-link").await.unwrap();
    assert_ne!(identity.validate_token(&access).await.unwrap(), uid(1));
}

// =========================================================================
// Token collisions
// =========================================================================

#[tokio::test]
async fn test_login_retries_on_access_token_collision() {
    let store = Arc::new(MemoryStore::new());
    let identity = manager(
        &store,
        Scripted::new(&["a-link", "a-acc", "b-link", "b-acc", "b-acc", "a-acc2"], &[]),
    );

    identity.request_registration("alice@example.com", "pw").await.unwrap();
    let alice = identity
        .validate_token(&identity.confirm_registration("a-link").await.unwrap())
        .await
        .unwrap();
    identity.request_registration("bob@example.com", "pw").await.unwrap();
    let bob = identity
        .validate_token(&identity.confirm_registration("b-link").await.unwrap())
        .await
        .unwrap();

    assert_eq!(identity.login("alice@example.com", "pw").await.unwrap(), "a-acc2");
    assert_eq!(identity.validate_token("a-acc2").await.unwrap(), alice);
    assert_eq!(identity.validate_token("b-acc").await.unwrap(), bob);
    assert!(identity.validate_token("a-acc").await.is_err());
}

#[tokio::test]
async fn test_request_registration_retries_on_token_collision() {
    let store = Arc::new(MemoryStore::new());
    let identity = manager(&store, Scripted::new(&["dup", "dup", "b-link"], &[]));

    assert_eq!(
        identity.request_registration("alice@example.com", "pw").await.unwrap(),
        "dup"
    );
    assert_eq!(
        identity.request_registration("bob@example.com", "pw").await.unwrap(),
        "b-link"
    );

    let mut tx = store.begin().await.unwrap();
    assert_eq!(
        tx.email_token("dup").await.unwrap().unwrap().email.as_str(),
        "alice@example.com"
    );
    assert_eq!(
        tx.email_token("b-link").await.unwrap().unwrap().email.as_str(),
        "bob@example.com"
    );
}

#[tokio::test]
async fn test_confirm_password_reset_retries_when_rotation_collides() {
    let store = Arc::new(MemoryStore::new());
    let identity = manager(
        &store,
        Scripted::new(&["a-link", "a-acc", "r1", "dup", "dup", "r2"], &[]),
    );

    identity.request_registration("alice@example.com", "pw").await.unwrap();
    identity.confirm_registration("a-link").await.unwrap();
    identity.request_password_reset("alice@example.com").await.unwrap();
    identity.request_registration("bob@example.com", "pw").await.unwrap();

    let email = identity.confirm_password_reset("r1", "fresh").await.unwrap();
    assert_eq!(email.as_str(), "alice@example.com");
    assert!(identity.login("alice@example.com", "fresh").await.is_ok());

    let mut tx = store.begin().await.unwrap();
    assert!(tx.email_token("r1").await.unwrap().is_none());
    assert!(tx.email_token("r2").await.unwrap().is_some());
    assert_eq!(
        tx.email_token("dup").await.unwrap().unwrap().email.as_str(),
        "bob@example.com"
    );
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_logins_leave_exactly_one_valid_token() {
    let store = Arc::new(MemoryStore::new());
    let identity = Arc::new(
        IdentityManager::new(Arc::clone(&store), IdentityConfig::default())
            .with_hasher(Arc::new(PlainHasher)),
    );

    let link = identity
        .request_registration("alice@example.com", "pw")
        .await
        .unwrap();
    identity.confirm_registration(&link).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let identity = Arc::clone(&identity);
            tokio::spawn(async move { identity.login("alice@example.com", "pw").await })
        })
        .collect();

    let mut issued = Vec::new();
    for handle in handles {
        issued.push(handle.await.unwrap().unwrap());
    }

    let mut valid = 0;
    for token in &issued {
        if identity.validate_token(token).await.is_ok() {
            valid += 1;
        }
    }
    assert_eq!(valid, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_login_leaves_store_free_while_verifying_password() {
    let store = Arc::new(MemoryStore::new());
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let identity = Arc::new(
        IdentityManager::new(Arc::clone(&store), IdentityConfig::default()).with_hasher(
            Arc::new(GatedHasher {
                entered: entered_tx,
                release: Mutex::new(release_rx),
            }),
        ),
    );

    let link = identity
        .request_registration("alice@example.com", "pw")
        .await
        .unwrap();
    identity.confirm_registration(&link).await.unwrap();

    let login = tokio::spawn({
        let identity = Arc::clone(&identity);
        async move { identity.login("alice@example.com", "pw").await }
    });
    tokio::task::spawn_blocking(move || entered_rx.recv())
        .await
        .unwrap()
        .unwrap();

    let tx = tokio::time::timeout(Duration::from_secs(5), store.begin()).await;
    assert!(tx.is_ok(), "store was locked during password verification");
    drop(tx);

    release_tx.send(()).unwrap();
    let access = login.await.unwrap().unwrap();
    assert!(identity.validate_token(&access).await.is_ok());
}

#[tokio::test]
async fn test_login_rejected_when_password_changes_during_check() {
    let store = Arc::new(MemoryStore::new());
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let identity = Arc::new(
        IdentityManager::new(Arc::clone(&store), IdentityConfig::default()).with_hasher(
            Arc::new(GatedHasher {
                entered: entered_tx,
                release: Mutex::new(release_rx),
            }),
        ),
    );

    let link = identity
        .request_registration("alice@example.com", "pw")
        .await
        .unwrap();
    let access = identity.confirm_registration(&link).await.unwrap();
    let user_id = identity.validate_token(&access).await.unwrap();

    let login = tokio::spawn({
        let identity = Arc::clone(&identity);
        async move { identity.login("alice@example.com", "pw").await }
    });
    tokio::task::spawn_blocking(move || entered_rx.recv())
        .await
        .unwrap()
        .unwrap();

    identity
        .update_profile(
            user_id,
            ProfileUpdate {
                password: Some("changed".into()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .unwrap();

    release_tx.send(()).unwrap();
    let err = login.await.unwrap().unwrap_err();
    assert!(matches!(err, IdentityError::InvalidCredentials));
}

// =========================================================================
// Real hashing
// =========================================================================

#[tokio::test]
async fn test_full_lifecycle_with_argon2() {
    let store = Arc::new(MemoryStore::new());
    let hasher = Argon2Hasher::with_params(Params::new(256, 1, 1, None).unwrap());
    let identity = IdentityManager::new(Arc::clone(&store), IdentityConfig::default())
        .with_hasher(Arc::new(hasher));

    let link = identity
        .request_registration("carol@example.com", "correct horse")
        .await
        .unwrap();
    let access = identity.confirm_registration(&link).await.unwrap();
    let user_id = identity.validate_token(&access).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let stored = tx.user_by_id(user_id).await.unwrap().unwrap();
    assert!(stored.password_hash.starts_with("$argon2id$"));
    drop(tx);

    assert!(matches!(
        identity.login("carol@example.com", "wrong").await,
        Err(IdentityError::InvalidCredentials)
    ));
    assert!(identity.login("carol@example.com", "correct horse").await.is_ok());
}

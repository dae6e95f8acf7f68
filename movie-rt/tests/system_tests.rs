//! Actor System Integration Tests
//!
//! Extension identity and once-only creation, idempotent remoting
//! enablement, shutdown failing pending asks, and configuration layering
//! as seen through a running system.

#![allow(clippy::unwrap_used, clippy::panic)]

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use movie_rt::config::ConfigValue;
use movie_rt::extension::{Extension, ExtensionId};
use movie_rt::prelude::*;

#[derive(Debug, Clone, serde::Serialize)]
struct Noop;

impl Message for Noop {
    const MESSAGE_TYPE: &'static str = "system_tests_noop";
}

// ============================================================================
// TEST GROUP 1: Extensions
// ============================================================================

struct CounterExtension {
    instance: usize,
}

impl Extension for CounterExtension {}

struct CounterExtensionId {
    created: Arc<AtomicUsize>,
}

#[async_trait]
impl ExtensionId for CounterExtensionId {
    type Ext = CounterExtension;

    async fn create(&self, _system: SystemRef) -> RtResult<Arc<CounterExtension>> {
        // a slow create makes the per-id serialization observable
        tokio::time::sleep(Duration::from_millis(50)).await;
        let instance = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CounterExtension { instance }))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_extension_identity_under_concurrency() {
    let system = ActorSystem::new("ext-identity", Behavior::<Noop>::ignore(), Config::empty())
        .unwrap();
    let created = Arc::new(AtomicUsize::new(0));
    let id = CounterExtensionId {
        created: Arc::clone(&created),
    };

    let (a, b) = tokio::join!(system.extension(&id), system.extension(&id));
    let a = a.unwrap();
    let b = b.unwrap();

    // same instance, created exactly once
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(a.instance, 0);

    // later calls still return it
    let c = system.extension(&id).await.unwrap();
    assert!(Arc::ptr_eq(&a, &c));

    system.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_enable_remoting_is_idempotent() {
    let system = ActorSystem::new("remoting-idem", Behavior::<Noop>::ignore(), Config::empty())
        .unwrap();

    let first = system.enable_remoting("127.0.0.1", 0).await.unwrap();
    let port = first.local_port();
    let second = system.enable_remoting("127.0.0.1", 0).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.local_port(), port);

    // the system address reflects the bound endpoint
    let address = system.address();
    assert!(address.is_remote());
    assert_eq!(address.endpoint().unwrap().port, port);

    system.shutdown().await.unwrap();
}

// ============================================================================
// TEST GROUP 2: Shutdown semantics
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_fails_pending_asks() {
    // The main behavior never replies, so the ask is outstanding when
    // shutdown runs.
    let system = ActorSystem::new("shutdown-asks", Behavior::<Noop>::ignore(), Config::empty())
        .unwrap();

    let pending = system.ask::<String>(Noop, Duration::from_secs(30));
    system.shutdown().await.unwrap();

    let result = pending.await_result(Some(Duration::from_secs(1))).await;
    assert!(matches!(result, Err(RuntimeError::Shutdown)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_is_not_reentrant() {
    let system = ActorSystem::new("shutdown-twice", Behavior::<Noop>::ignore(), Config::empty())
        .unwrap();

    system.shutdown().await.unwrap();
    assert!(matches!(
        system.shutdown().await,
        Err(RuntimeError::Shutdown)
    ));
}

// ============================================================================
// TEST GROUP 3: Configuration layering
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_config_layering_through_system() {
    // defaults <- file <- environment
    let file = Config::from_toml_str(
        r#"
        name = "layered"

        [remoting]
        port = 8000
        "#,
    )
    .unwrap();
    let env = vec![("MOVIE_REMOTING_PORT".to_string(), "9001".to_string())];
    let effective = file
        .with_fallback(&Config::runtime_defaults())
        .with_env_overrides_from("MOVIE_", env);

    let system = ActorSystem::new("", Behavior::<Noop>::ignore(), effective).unwrap();

    // name came from the file layer
    assert_eq!(system.name(), "layered");
    // environment wins over the file
    assert_eq!(system.config().get_int("remoting.port").unwrap(), 9001);
    // untouched remoting fields come from the defaults
    assert_eq!(
        system.config().get_string("remoting.host").unwrap(),
        "127.0.0.1"
    );
    assert!(!system.config().get_bool("remoting.enabled").unwrap());

    system.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_configured_mailbox_capacity_drops_overflow() {
    // A tiny user lane plus a blocked actor: the overflow is dropped,
    // never backpressured onto the sender.
    let config = Config::empty().with_value("system.mailbox-capacity", ConfigValue::Int(4));
    let gate = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&gate);

    let behavior = Behavior::receive(move |_ctx, _msg: Noop| {
        seen.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        Ok(Transition::Same)
    });
    let system = ActorSystem::new("tiny-mailbox", behavior, config).unwrap();

    for _ in 0..64 {
        system.tell(Noop);
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    // far fewer than 64 processed: the rest were dropped, and telling
    // never blocked this task
    assert!(gate.load(Ordering::SeqCst) <= 16);

    system.shutdown().await.unwrap();
}

// ============================================================================
// TEST GROUP 4: Lookup errors
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_actor_for_unknown_path_fails() {
    let system = ActorSystem::new("lookup", Behavior::<Noop>::ignore(), Config::empty()).unwrap();

    assert!(matches!(
        system.actor_for::<Noop>("/user/ghost"),
        Err(RuntimeError::BadPath(_))
    ));
    // remote URI without remoting enabled
    assert!(matches!(
        system.actor_for::<Noop>("movie.tcp://elsewhere@127.0.0.1:9/user/x"),
        Err(RuntimeError::BadConfig(_))
    ));

    system.shutdown().await.unwrap();
}

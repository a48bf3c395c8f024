#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dyndispatch::demo::{demo_registry, demo_services, PhotoStore};
use dyndispatch::dispatcher::{DispatchError, DispatchRequest, Dispatcher, ServiceRegistry};
use dyndispatch::RetryPolicy;

#[tokio::test]
async fn retries_until_success() {
    let policy = RetryPolicy::new(5, Duration::from_millis(1));
    let calls = AtomicU32::new(0);
    let result: Result<u32, String> = policy
        .run(|attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(format!("attempt {attempt} failed"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
    assert_eq!(result, Ok(3));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn final_error_is_returned_unchanged() {
    let policy = RetryPolicy::new(2, Duration::from_millis(1));
    let result: Result<(), String> = policy
        .run(|attempt| async move { Err(format!("attempt {attempt} failed")) })
        .await;
    assert_eq!(result, Err("attempt 2 failed".to_string()));
}

#[tokio::test]
async fn sleeps_between_attempts_only() {
    let policy = RetryPolicy::new(3, Duration::from_millis(20));
    let started = Instant::now();
    let result: Result<(), &str> = policy.run(|_| async { Err("nope") }).await;
    assert!(result.is_err());
    assert!(started.elapsed() >= Duration::from_millis(40));
}

#[tokio::test]
async fn wraps_programmatic_invoke() {
    let registry = Arc::new(demo_registry("App.Controllers").unwrap());
    let empty = Dispatcher::new(registry.clone(), Arc::new(ServiceRegistry::new()));
    let full = Dispatcher::new(registry, Arc::new(demo_services()));
    let request = DispatchRequest::new("AccountController", "photo", "42");

    // First attempt has no photo store registered; later attempts do.
    let (empty, full, request) = (&empty, &full, &request);
    let policy = RetryPolicy::new(3, Duration::from_millis(1));
    let bytes = policy
        .run(move |attempt| {
            let dispatcher = if attempt == 1 { empty } else { full };
            dispatcher.invoke::<Vec<u8>>(request)
        })
        .await
        .unwrap();
    assert_eq!(bytes, dyndispatch::demo::placeholder_jpeg(42));

    let err = RetryPolicy::new(2, Duration::ZERO)
        .run(move |_| empty.invoke::<Vec<u8>>(request))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::ActivationFault { .. }));
    assert!(err.to_string().contains(std::any::type_name::<PhotoStore>()));
}

//! Failure routing through the `Recovery` middleware.
//!
//! Each test wires a downstream handler and up to two recovery handlers,
//! then checks which of them ran and what came back.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use rebound::middleware::{BoxedMiddleware, HandlerSlot, Middleware, Next, Recovery};
use rebound::{BoxFuture, Category, Error, Failure, Outcome, Request, Response, StatusCode};

fn request() -> Request {
    Request::from(
        http::Request::builder()
            .uri("/orders/7")
            .header("x-request-id", "req-1")
            .body(Bytes::new())
            .unwrap(),
    )
}

/// A downstream handler that always raises `failure`.
fn raising(failure: Failure) -> Next {
    Next::endpoint(move |_req: Request| {
        let failure = failure.clone();
        async move { Err::<Response, _>(failure) }
    })
}

/// A downstream handler that always answers `201 created`.
fn succeeding() -> Next {
    Next::endpoint(|_req: Request| async {
        Response::builder().status(StatusCode::CREATED).text("created")
    })
}

/// A recovery handler that counts its calls and remembers the last request.
#[derive(Clone, Default)]
struct Probe {
    calls: Arc<AtomicUsize>,
    seen: Arc<parking_lot::Mutex<Option<Request>>>,
}

impl Probe {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn seen(&self) -> Request {
        self.seen.lock().clone().expect("probe was not invoked")
    }

    fn slot(&self) -> HandlerSlot {
        HandlerSlot::middleware(self.clone())
    }
}

impl Middleware for Probe {
    fn process(&self, req: Request, _next: Next) -> BoxFuture<'_, Outcome> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let body = format!("probe:{}", req.error().map(Failure::message).unwrap_or_default());
            *self.seen.lock() = Some(req);
            Ok(Response::builder().status(StatusCode::SERVICE_UNAVAILABLE).text(body))
        })
    }
}

#[tokio::test]
async fn success_passes_through_untouched() {
    let recoverable = Probe::default();
    let fatal = Probe::default();
    let recovery = Recovery::new(recoverable.slot(), fatal.slot()).unwrap();

    let res = recovery.process(request(), succeeding()).await.unwrap();

    assert_eq!(res.status_code(), StatusCode::CREATED);
    assert_eq!(res.body(), b"created");
    assert_eq!(recoverable.calls() + fatal.calls(), 0);
    assert!(recovery.last_failure().is_none());
}

#[tokio::test]
async fn recoverable_failure_goes_to_recoverable_handler() {
    let recoverable = Probe::default();
    let fatal = Probe::default();
    let recovery = Recovery::new(recoverable.slot(), fatal.slot()).unwrap();
    let failure = Failure::recoverable("bad input");

    let res = recovery.process(request(), raising(failure.clone())).await.unwrap();

    assert_eq!(res.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.body(), b"probe:bad input");
    assert_eq!((recoverable.calls(), fatal.calls()), (1, 0));
    assert!(recovery.last_failure().unwrap().ptr_eq(&failure));

    let seen = recoverable.seen();
    assert!(seen.error().unwrap().ptr_eq(&failure));
    assert_eq!(seen.path(), "/orders/7");
    assert_eq!(seen.header("x-request-id"), Some("req-1"));
}

#[tokio::test]
async fn fatal_failure_goes_to_fatal_handler_only() {
    let recoverable = Probe::default();
    let fatal = Probe::default();
    let recovery = Recovery::new(recoverable.slot(), fatal.slot()).unwrap();
    let failure = Failure::fatal("null deref");

    let res = recovery.process(request(), raising(failure.clone())).await.unwrap();

    assert_eq!(res.body(), b"probe:null deref");
    assert_eq!((recoverable.calls(), fatal.calls()), (0, 1));
    assert!(fatal.seen().error().unwrap().ptr_eq(&failure));
    assert_eq!(recovery.last_failure().unwrap().category(), Category::Fatal);
}

#[tokio::test]
async fn unconfigured_slot_re_raises_the_same_failure() {
    let fatal = Probe::default();
    let recovery = Recovery::new(HandlerSlot::Empty, fatal.slot()).unwrap();
    let failure = Failure::recoverable("bad input");

    let err = recovery.process(request(), raising(failure.clone())).await.unwrap_err();

    assert!(err.ptr_eq(&failure));
    assert_eq!(err.category(), Category::Recoverable);
    assert_eq!(fatal.calls(), 0);
    assert!(recovery.last_failure().is_none());
}

#[tokio::test]
async fn re_raise_leaves_previous_last_failure_alone() {
    let recovery = Recovery::new(Probe::default().slot(), HandlerSlot::Empty).unwrap();
    let first = Failure::recoverable("first");

    recovery.process(request(), raising(first.clone())).await.unwrap();
    recovery.process(request(), raising(Failure::fatal("second"))).await.unwrap_err();

    assert!(recovery.last_failure().unwrap().ptr_eq(&first));
}

#[tokio::test]
async fn unclassified_failures_are_never_intercepted() {
    let recoverable = Probe::default();
    let fatal = Probe::default();
    let recovery = Recovery::new(recoverable.slot(), fatal.slot()).unwrap();
    let failure = Failure::unclassified("connection reset");

    let err = recovery.process(request(), raising(failure.clone())).await.unwrap_err();

    assert!(err.ptr_eq(&failure));
    assert_eq!(recoverable.calls() + fatal.calls(), 0);
    assert!(recovery.last_failure().is_none());
}

#[tokio::test]
async fn sub_handler_failures_propagate_unmodified() {
    let replacement = Failure::fatal("template missing");
    let raised = replacement.clone();
    let recovery = Recovery::new(
        HandlerSlot::callable(move |_req: Request, _next: Next| {
            let raised = raised.clone();
            async move { Err::<Response, _>(raised) }
        }),
        Probe::default().slot(),
    )
    .unwrap();

    let err = recovery
        .process(request(), raising(Failure::recoverable("bad input")))
        .await
        .unwrap_err();

    // The fatal slot is not consulted for a failure raised by a recovery handler.
    assert!(err.ptr_eq(&replacement));
}

#[tokio::test]
async fn callable_and_middleware_slots_behave_alike() {
    let as_middleware = Recovery::new(Probe::default().slot(), HandlerSlot::Empty).unwrap();
    let as_callable = Recovery::new(
        HandlerSlot::callable(|req: Request, _next: Next| async move {
            let body = format!("probe:{}", req.error().map(Failure::message).unwrap_or_default());
            Response::builder().status(StatusCode::SERVICE_UNAVAILABLE).text(body)
        }),
        HandlerSlot::Empty,
    )
    .unwrap();

    for failure in [Failure::recoverable("bad input"), Failure::fatal("null deref")] {
        let a = as_middleware.process(request(), raising(failure.clone())).await;
        let b = as_callable.process(request(), raising(failure.clone())).await;
        match (a, b) {
            (Ok(a), Ok(b)) => assert_eq!(a, b),
            (Err(a), Err(b)) => assert!(a.ptr_eq(&b)),
            (a, b) => panic!("outcomes differ: {a:?} vs {b:?}"),
        }
    }
}

#[tokio::test]
async fn recovery_handler_can_retry_downstream() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let flaky = Next::endpoint(move |_req: Request| {
        let attempt = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt == 0 {
                Err(Failure::recoverable("cold cache"))
            } else {
                Ok(Response::text("warm"))
            }
        }
    });
    let recovery = Recovery::new(
        HandlerSlot::callable(|req: Request, next: Next| async move { next.handle(req).await }),
        HandlerSlot::Empty,
    )
    .unwrap();

    let res = recovery.process(request(), flaky).await.unwrap();

    assert_eq!(res.body(), b"warm");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn setters_replace_slots_between_dispatches() {
    let mut recovery = Recovery::default();
    let failure = Failure::fatal("null deref");

    recovery.process(request(), raising(failure.clone())).await.unwrap_err();

    let fatal = Probe::default();
    recovery.set_fatal_handler(fatal.slot()).unwrap();
    recovery.process(request(), raising(failure.clone())).await.unwrap();
    assert_eq!(fatal.calls(), 1);

    recovery.set_fatal_handler(HandlerSlot::Empty).unwrap();
    let err = recovery.process(request(), raising(failure.clone())).await.unwrap_err();
    assert!(err.ptr_eq(&failure));
}

#[test]
fn invalid_configuration_is_rejected_up_front() {
    let err = Recovery::new(HandlerSlot::dynamic("handler name"), HandlerSlot::Empty).err();
    assert!(matches!(err, Some(Error::InvalidConfiguration { .. })));

    let err = Recovery::new(HandlerSlot::Empty, HandlerSlot::dynamic(vec![1, 2, 3])).err();
    assert!(matches!(
        err,
        Some(Error::InvalidConfiguration { actual, .. }) if actual.contains("Vec<i32>")
    ));

    let mut recovery = Recovery::default();
    assert!(recovery.set_recoverable_handler(HandlerSlot::dynamic(0_u8)).is_err());
}

#[tokio::test]
async fn dynamic_middleware_is_accepted() {
    let probe = Probe::default();
    let boxed: BoxedMiddleware = Arc::new(probe.clone());
    let recovery = Recovery::new(HandlerSlot::dynamic(boxed), HandlerSlot::Empty).unwrap();

    recovery
        .process(request(), raising(Failure::recoverable("bad input")))
        .await
        .unwrap();

    assert_eq!(probe.calls(), 1);
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_no_handler_re_raises() {
    let recovery = Recovery::new(HandlerSlot::Empty, HandlerSlot::Empty).unwrap();
    let failure = Failure::recoverable("E");

    let err = recovery.process(request(), raising(failure.clone())).await.unwrap_err();

    assert!(err.ptr_eq(&failure));
}

#[tokio::test]
async fn scenario_callable_formats_the_failure() {
    let recovery = Recovery::new(
        HandlerSlot::callable(|req: Request, _next: Next| async move {
            let message = req.error().map(Failure::message).unwrap_or_default();
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .text(format!("handled:{message}"))
        }),
        HandlerSlot::Empty,
    )
    .unwrap();

    let res = recovery
        .process(request(), raising(Failure::recoverable("bad input")))
        .await
        .unwrap();

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body(), b"handled:bad input");
    assert_eq!(recovery.last_failure().unwrap().message(), "bad input");
}

#[tokio::test]
async fn concurrent_requests_each_see_their_own_failure() {
    let recovery = Arc::new(
        Recovery::new(
            HandlerSlot::callable(|req: Request, _next: Next| async move {
                tokio::task::yield_now().await;
                Response::text(req.error().map(Failure::message).unwrap_or_default())
            }),
            HandlerSlot::Empty,
        )
        .unwrap(),
    );

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let recovery = Arc::clone(&recovery);
            tokio::spawn(async move {
                let message = format!("failure {i}");
                let res = recovery
                    .process(request(), raising(Failure::recoverable(message.clone())))
                    .await
                    .unwrap();
                (message, res)
            })
        })
        .collect();

    for task in tasks {
        let (message, res) = task.await.unwrap();
        assert_eq!(res.body(), message.as_bytes());
    }
    assert!(recovery.last_failure().unwrap().message().starts_with("failure "));
}

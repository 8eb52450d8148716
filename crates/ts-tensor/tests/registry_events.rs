//! Registry replacement and change-event semantics.
//!
//! The active-backend registry is process-wide state, so everything that
//! mutates it lives in a single test function with a fixed sequence.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ts_tensor::{
    set_backend, subscribe, tensorlib, unsubscribe, DenseBackend, EventKind, LinalgBackend,
    ParallelBackend, Precision, SimdBackend,
};

#[test]
fn test_set_backend_change_detection_and_dispatch() {
    // The registry initializes to the dense 64-bit engine.
    assert_eq!(tensorlib().name(), "dense");
    assert_eq!(tensorlib().precision(), Precision::B64);

    let count = Arc::new(AtomicUsize::new(0));
    let count_handle = Arc::clone(&count);
    let subscription =
        subscribe(EventKind::TensorlibChanged, move || {
            count_handle.fetch_add(1, Ordering::SeqCst);
        });

    // Re-setting an identical (name, precision) publishes nothing.
    set_backend(Arc::new(DenseBackend::new(Precision::B64)));
    assert_eq!(count.load(Ordering::SeqCst), 0);

    // A name change fires exactly one event.
    set_backend(Arc::new(SimdBackend::new(Precision::B64)));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(tensorlib().name(), "simd");

    // A precision change alone fires too.
    set_backend(Arc::new(SimdBackend::new(Precision::B32)));
    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert_eq!(tensorlib().precision(), Precision::B32);

    // Identical again: nothing.
    set_backend(Arc::new(SimdBackend::new(Precision::B32)));
    assert_eq!(count.load(Ordering::SeqCst), 2);

    // Listeners run synchronously in registration order.
    let order = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&order);
    let second = Arc::clone(&order);
    let sub_a = subscribe(EventKind::TensorlibChanged, move || {
        first.lock().unwrap().push("first");
    });
    let sub_b = subscribe(EventKind::TensorlibChanged, move || {
        second.lock().unwrap().push("second");
    });

    set_backend(Arc::new(ParallelBackend::new(Precision::B64)));
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);

    // Unsubscribing stops delivery.
    assert!(unsubscribe(sub_a));
    assert!(!unsubscribe(sub_a));
    set_backend(Arc::new(LinalgBackend::new(Precision::B64)));
    assert_eq!(count.load(Ordering::SeqCst), 4);
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "second"]);

    assert!(unsubscribe(sub_b));
    assert!(unsubscribe(subscription));

    // Restore the default for any later reader.
    set_backend(Arc::new(DenseBackend::new(Precision::B64)));
    assert_eq!(tensorlib().name(), "dense");
}

#[test]
fn test_tensorlib_is_usable_without_explicit_setup() {
    use ts_tensor::{DType, TensorValue};
    let tb = tensorlib();
    let t = tb.astensor(&TensorValue::from(vec![1.0, 2.0]), DType::Float).unwrap();
    assert_eq!(t.shape(), &[2]);
}

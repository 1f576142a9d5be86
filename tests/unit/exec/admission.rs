use super::*;

#[test]
fn permits_are_bounded_and_released_on_drop() {
    let gate = AdmissionGate::new(2);
    let a = gate.try_acquire().unwrap();
    let b = gate.try_acquire().unwrap();
    assert_eq!(gate.in_flight(), 2);
    assert!(matches!(
        gate.try_acquire(),
        Err(NewsreelError::ResourceExhausted(_))
    ));
    drop(a);
    assert_eq!(gate.in_flight(), 1);
    let _c = gate.try_acquire().unwrap();
    drop(b);
    assert_eq!(gate.in_flight(), 1);
}

#[test]
fn clones_share_the_counter() {
    let gate = AdmissionGate::new(1);
    let other = gate.clone();
    let _p = gate.try_acquire().unwrap();
    assert!(other.try_acquire().is_err());
    assert_eq!(other.limit(), 1);
}

#[test]
fn concurrent_acquires_never_exceed_limit() {
    let gate = AdmissionGate::new(3);
    let granted = std::sync::atomic::AtomicUsize::new(0);
    std::thread::scope(|s| {
        for _ in 0..16 {
            s.spawn(|| {
                if let Ok(_permit) = gate.try_acquire() {
                    granted.fetch_add(1, Ordering::SeqCst);
                    assert!(gate.in_flight() <= 3);
                    std::thread::sleep(std::time::Duration::from_millis(5));
                }
            });
        }
    });
    assert!(granted.load(Ordering::SeqCst) >= 1);
    assert_eq!(gate.in_flight(), 0);
}

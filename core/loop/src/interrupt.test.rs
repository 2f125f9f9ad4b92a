use super::*;
use pretty_assertions::assert_eq;

#[test]
fn fires_only_when_armed() {
    let interrupts = InterruptManager::new();
    assert!(!interrupts.fire());
    assert!(!interrupts.check());

    interrupts.arm();
    assert!(interrupts.fire());
    assert!(interrupts.check());
}

#[test]
fn fires_exactly_once_per_arming() {
    let interrupts = InterruptManager::new();
    interrupts.arm();
    assert!(interrupts.fire());
    assert!(!interrupts.fire());
    // check keeps reporting fired until cleared.
    assert!(interrupts.check());
    interrupts.clear();
    assert!(!interrupts.check());
    assert!(interrupts.fire());
}

#[test]
fn disarm_blocks_firing() {
    let interrupts = InterruptManager::new();
    interrupts.arm();
    interrupts.disarm();
    assert!(!interrupts.fire());
}

#[test]
fn firing_cancels_the_current_token() {
    let interrupts = InterruptManager::new();
    interrupts.arm();
    let token = interrupts.current_token();
    assert!(!token.is_cancelled());
    interrupts.fire();
    assert!(token.is_cancelled());

    // clear installs a fresh token for the next turn.
    interrupts.clear();
    assert!(!interrupts.current_token().is_cancelled());
}

#[tokio::test]
async fn wait_returns_true_when_fired() {
    let interrupts = std::sync::Arc::new(InterruptManager::new());
    interrupts.arm();

    let waiter = std::sync::Arc::clone(&interrupts);
    let handle = tokio::spawn(async move { waiter.wait(Some(Duration::from_secs(5))).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    interrupts.fire();
    assert!(handle.await.unwrap());
}

#[tokio::test]
async fn wait_times_out_when_nothing_fires() {
    let interrupts = InterruptManager::new();
    interrupts.arm();
    let fired = interrupts.wait(Some(Duration::from_millis(30))).await;
    assert!(!fired);
}

#[tokio::test]
async fn wait_returns_immediately_after_the_fact() {
    let interrupts = InterruptManager::new();
    interrupts.arm();
    interrupts.fire();
    assert!(interrupts.wait(Some(Duration::from_millis(1))).await);
}

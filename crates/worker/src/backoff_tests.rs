// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn delays_double_up_to_cap() {
    let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(350), 5);
    assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
    assert_eq!(backoff.next_delay(), Some(Duration::from_millis(200)));
    assert_eq!(backoff.next_delay(), Some(Duration::from_millis(350)));
    assert_eq!(backoff.next_delay(), Some(Duration::from_millis(350)));
}

#[test]
fn budget_is_bounded() {
    let mut backoff = Backoff::new(Duration::from_millis(10), Duration::from_secs(1), 2);
    assert!(backoff.next_delay().is_some());
    assert!(backoff.next_delay().is_some());
    assert_eq!(backoff.next_delay(), None);
    assert_eq!(backoff.next_delay(), None);
}

#[test]
fn reset_restores_the_budget() {
    let mut backoff = Backoff::new(Duration::from_millis(10), Duration::from_secs(1), 1);
    assert!(backoff.next_delay().is_some());
    assert_eq!(backoff.next_delay(), None);
    backoff.reset();
    assert_eq!(backoff.next_delay(), Some(Duration::from_millis(10)));
}

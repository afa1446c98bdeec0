/// Asserts that a slice of [`Notification`](crate::Notification)s holds one matching `pattern`.
///
/// ```ignore
/// let notifications = receiver.drain();
/// assert_notified!(notifications, Notification::BatchFailed(ScannerError::Fetch { .. }));
/// ```
#[macro_export]
macro_rules! assert_notified {
    ($notifications: expr, $pattern: pat $(if $guard: expr)?) => {{
        let notifications: &[$crate::Notification] = &$notifications;
        assert!(
            notifications.iter().any(|n| matches!(n, $pattern $(if $guard)?)),
            "Expected a notification matching `{}`, got {:#?}",
            stringify!($pattern),
            notifications
        );
    }};
}

/// Asserts that no notification in the slice matches `pattern`.
#[macro_export]
macro_rules! assert_not_notified {
    ($notifications: expr, $pattern: pat $(if $guard: expr)?) => {{
        let notifications: &[$crate::Notification] = &$notifications;
        if let Some(found) = notifications.iter().find(|n| matches!(n, $pattern $(if $guard)?)) {
            panic!("Unexpected notification matching `{}`: {found:?}", stringify!($pattern));
        }
    }};
}

/// Asserts the block numbers of a record list, in order.
#[macro_export]
macro_rules! assert_record_blocks {
    ($records: expr, [$($block: expr),* $(,)?]) => {{
        let blocks: Vec<u64> = $records.iter().map(|record| record.block_number).collect();
        let expected: Vec<u64> = vec![$($block),*];
        assert_eq!(blocks, expected, "Record blocks mismatch");
    }};
}

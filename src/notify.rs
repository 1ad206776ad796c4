// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Async-safe multi-observer notification.
//!
//! A [`Notifier`] is an owned object, constructed by the caller; there is
//! no process-wide channel. Observers register and deregister explicitly.
//! Each emission runs every observer in its own task: one observer
//! panicking or returning an error is logged and never prevents the
//! others from running, nor that observer from running on the next
//! emission.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Future returned by an observer.
pub type ObserverFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

type Observer<T> = Arc<dyn Fn(T) -> ObserverFuture + Send + Sync>;

/// Handle identifying a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// An emission channel with independently registered observers.
pub struct Notifier<T> {
    observers: Mutex<HashMap<u64, Observer<T>>>,
    next_id: Mutex<u64>,
}

impl<T: Clone + Send + 'static> Default for Notifier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Notifier<T> {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(HashMap::new()),
            next_id: Mutex::new(0),
        }
    }

    /// Register an observer. Returns a handle for [`unsubscribe`].
    ///
    /// [`unsubscribe`]: Notifier::unsubscribe
    pub fn subscribe<F, Fut>(&self, observer: F) -> Subscription
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let id = {
            let mut next = self.next_id.lock().expect("notifier id lock poisoned");
            let id = *next;
            *next += 1;
            id
        };

        let boxed: Observer<T> = Arc::new(move |value| Box::pin(observer(value)) as ObserverFuture);
        self.observers
            .lock()
            .expect("notifier observer lock poisoned")
            .insert(id, boxed);

        Subscription(id)
    }

    /// Deregister an observer. Returns false if it was already gone.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.observers
            .lock()
            .expect("notifier observer lock poisoned")
            .remove(&subscription.0)
            .is_some()
    }

    /// Number of currently registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .expect("notifier observer lock poisoned")
            .len()
    }

    /// Emit a value to every registered observer.
    ///
    /// Observers run concurrently in spawned tasks and are all joined
    /// before this returns. Failures are logged, not propagated.
    pub async fn emit(&self, value: T) {
        let observers: Vec<(u64, Observer<T>)> = {
            let guard = self.observers.lock().expect("notifier observer lock poisoned");
            guard.iter().map(|(id, obs)| (*id, Arc::clone(obs))).collect()
        };

        let mut handles = Vec::with_capacity(observers.len());
        for (id, observer) in observers {
            let value = value.clone();
            // Invoke inside the task so a panicking observer is isolated.
            handles.push((id, tokio::spawn(async move { observer(value).await })));
        }

        for (id, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(reason)) => {
                    tracing::warn!(observer = id, reason = %reason, "Observer rejected emission");
                }
                Err(join_err) => {
                    tracing::warn!(observer = id, error = %join_err, "Observer panicked during emission");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn all_observers_receive_emission() {
        let notifier = Notifier::new();
        let count_a = Arc::new(AtomicU32::new(0));
        let count_b = Arc::new(AtomicU32::new(0));

        let a = Arc::clone(&count_a);
        notifier.subscribe(move |v: u32| {
            let a = Arc::clone(&a);
            async move {
                a.fetch_add(v, Ordering::SeqCst);
                Ok(())
            }
        });

        let b = Arc::clone(&count_b);
        notifier.subscribe(move |v: u32| {
            let b = Arc::clone(&b);
            async move {
                b.fetch_add(v, Ordering::SeqCst);
                Ok(())
            }
        });

        notifier.emit(5).await;

        assert_eq!(count_a.load(Ordering::SeqCst), 5);
        assert_eq!(count_b.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn failing_observer_does_not_block_others() {
        let notifier = Notifier::new();
        let ok_count = Arc::new(AtomicU32::new(0));

        notifier.subscribe(|_: u32| async { Err("observer error".to_string()) });

        let ok = Arc::clone(&ok_count);
        notifier.subscribe(move |_| {
            let ok = Arc::clone(&ok);
            async move {
                ok.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        notifier.emit(1).await;
        assert_eq!(ok_count.load(Ordering::SeqCst), 1);

        // The failing observer stays registered and the channel keeps working.
        notifier.emit(1).await;
        assert_eq!(ok_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn panicking_observer_is_isolated() {
        let notifier = Notifier::new();
        let ok_count = Arc::new(AtomicU32::new(0));

        notifier.subscribe(|_: u32| async { panic!("observer panic") });

        let ok = Arc::clone(&ok_count);
        notifier.subscribe(move |_| {
            let ok = Arc::clone(&ok);
            async move {
                ok.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        notifier.emit(7).await;
        assert_eq!(ok_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribe_removes_observer() {
        let notifier = Notifier::new();
        let count = Arc::new(AtomicU32::new(0));

        let c = Arc::clone(&count);
        let sub = notifier.subscribe(move |_: u32| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        notifier.emit(1).await;
        assert!(notifier.unsubscribe(sub));
        assert!(!notifier.unsubscribe(sub));
        notifier.emit(1).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.observer_count(), 0);
    }
}

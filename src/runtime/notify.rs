use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    active: AtomicBool,
    callback: Arc<dyn Fn() + Send + Sync>,
}

/// One-shot multicast notification fired when a view or pop-up is torn down.
///
/// `broadcast` walks a snapshot of the subscriber list without holding the
/// lock, so callbacks may subscribe, unsubscribe or even broadcast again.
/// Each subscriber fires at most once: a subscriber removed or already
/// notified mid-dispatch is skipped, one added mid-dispatch is not notified.
/// The list is cleared once dispatch finishes.
#[derive(Default)]
pub struct DestroyNotifier {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
}

impl DestroyNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscriber = Arc::new(Subscriber {
            id,
            active: AtomicBool::new(true),
            callback: Arc::new(callback),
        });
        if let Ok(mut guard) = self.subscribers.lock() {
            guard.push(subscriber);
        }
        id
    }

    /// Returns whether the subscription was still registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Ok(mut guard) = self.subscribers.lock() else {
            return false;
        };
        match guard.iter().position(|subscriber| subscriber.id == id) {
            Some(idx) => {
                let removed = guard.remove(idx);
                removed.active.store(false, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscribers
            .lock()
            .map(|guard| guard.iter().any(|subscriber| subscriber.id == id))
            .unwrap_or(false)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Invokes every live subscriber once, then clears the list. Returns the
    /// number of callbacks run.
    ///
    /// Subscribers registered while the broadcast is dispatching are not
    /// called and are discarded with the rest of the list. Subscribe again
    /// after `broadcast` returns to hear a later one.
    pub fn broadcast(&self) -> usize {
        let snapshot: Vec<Arc<Subscriber>> = match self.subscribers.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => return 0,
        };

        let mut delivered = 0;
        for subscriber in &snapshot {
            if !subscriber.active.swap(false, Ordering::SeqCst) {
                continue;
            }
            (subscriber.callback)();
            delivered += 1;
        }

        if let Ok(mut guard) = self.subscribers.lock() {
            for subscriber in guard.drain(..) {
                subscriber.active.store(false, Ordering::SeqCst);
            }
        }
        delivered
    }
}

impl fmt::Debug for DestroyNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestroyNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = hits.clone();
        (hits, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn broadcast_reaches_every_subscriber_once() {
        let notifier = DestroyNotifier::new();
        let (a, on_a) = counter();
        let (b, on_b) = counter();
        notifier.subscribe(on_a);
        notifier.subscribe(on_b);

        assert_eq!(notifier.broadcast(), 2);
        assert_eq!(notifier.broadcast(), 0);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn unsubscribed_callback_is_not_invoked() {
        let notifier = DestroyNotifier::new();
        let (hits, on_hit) = counter();
        let id = notifier.subscribe(on_hit);
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.broadcast();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn removal_during_dispatch_skips_pending_subscriber() {
        let notifier = Arc::new(DestroyNotifier::new());
        let (later, on_later) = counter();
        let victim = Arc::new(Mutex::new(None::<SubscriptionId>));

        let remover = notifier.clone();
        let target = victim.clone();
        notifier.subscribe(move || {
            if let Some(id) = *target.lock().unwrap() {
                remover.unsubscribe(id);
            }
        });
        let id = notifier.subscribe(on_later);
        *victim.lock().unwrap() = Some(id);

        assert_eq!(notifier.broadcast(), 1);
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn subscriber_added_during_dispatch_is_not_notified() {
        let notifier = Arc::new(DestroyNotifier::new());
        let (late, on_late) = counter();
        let on_late = Arc::new(on_late);
        let inner = notifier.clone();
        notifier.subscribe(move || {
            let on_late = on_late.clone();
            inner.subscribe(move || on_late());
        });

        assert_eq!(notifier.broadcast(), 1);
        assert_eq!(late.load(Ordering::SeqCst), 0);
        assert_eq!(notifier.subscriber_count(), 0);

        assert_eq!(notifier.broadcast(), 0);
        assert_eq!(late.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn reentrant_broadcast_delivers_each_subscriber_once() {
        let notifier = Arc::new(DestroyNotifier::new());
        let (hits, on_hit) = counter();
        let inner = notifier.clone();
        notifier.subscribe(move || {
            inner.broadcast();
        });
        notifier.subscribe(on_hit);

        notifier.broadcast();
        // The nested pass already fired the second subscriber.
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

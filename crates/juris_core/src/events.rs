//! crates/juris_core/src/events.rs
//!
//! Publish/subscribe channel for auth state changes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::domain::{AuthEvent, Session};

/// A callback interested in auth state changes.
pub type AuthListener = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

#[derive(Default)]
struct ChannelState {
    next_id: u64,
    current: Option<Session>,
    listeners: HashMap<u64, AuthListener>,
}

fn lock(state: &Mutex<ChannelState>) -> MutexGuard<'_, ChannelState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Tracks the active session and fans every change out to the subscribers.
///
/// Listeners run outside the internal lock, so a listener may subscribe or
/// unsubscribe from inside its own callback.
#[derive(Clone, Default)]
pub struct AuthChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl AuthChannel {
    pub fn new(initial: Option<Session>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChannelState {
                current: initial,
                ..ChannelState::default()
            })),
        }
    }

    pub fn current(&self) -> Option<Session> {
        lock(&self.state).current.clone()
    }

    /// Registers `listener` and immediately calls it with the current state.
    pub fn subscribe(&self, listener: AuthListener) -> Subscription {
        let (id, initial) = {
            let mut state = lock(&self.state);
            let id = state.next_id;
            state.next_id += 1;
            state.listeners.insert(id, listener.clone());
            (id, AuthEvent::from_state(state.current.clone()))
        };

        listener(&initial);

        Subscription {
            id,
            channel: Arc::downgrade(&self.state),
        }
    }

    /// Records the new state and notifies every subscriber.
    pub fn publish(&self, event: AuthEvent) {
        let listeners: Vec<AuthListener> = {
            let mut state = lock(&self.state);
            state.current = event.session.clone();
            state.listeners.values().cloned().collect()
        };

        for listener in listeners {
            listener(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }
}

/// Token returned by [`AuthChannel::subscribe`]. The listener stays
/// registered until `unsubscribe` is called.
#[must_use = "dropping the token keeps the listener registered forever"]
pub struct Subscription {
    id: u64,
    channel: Weak<Mutex<ChannelState>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(self) {
        if let Some(state) = self.channel.upgrade() {
            lock(&state).listeners.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AuthEventKind, SessionUser};
    use uuid::Uuid;

    fn session() -> Session {
        Session {
            user: SessionUser {
                id: Uuid::new_v4(),
                email: "ana@x.com".to_string(),
            },
            access_token: "token".to_string(),
            expires_in: 3600,
        }
    }

    fn recorder() -> (AuthListener, Arc<Mutex<Vec<AuthEventKind>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: AuthListener = Arc::new(move |event: &AuthEvent| {
            sink.lock().unwrap().push(event.kind);
        });
        (listener, seen)
    }

    #[test]
    fn subscriber_receives_current_state_immediately() {
        let channel = AuthChannel::new(Some(session()));
        let (listener, seen) = recorder();

        let _subscription = channel.subscribe(listener);

        assert_eq!(*seen.lock().unwrap(), vec![AuthEventKind::SignedIn]);
    }

    #[test]
    fn every_subscriber_sees_published_events() {
        let channel = AuthChannel::new(None);
        let (first, first_seen) = recorder();
        let (second, second_seen) = recorder();
        let _a = channel.subscribe(first);
        let _b = channel.subscribe(second);

        let active = session();
        channel.publish(AuthEvent::signed_in(active.clone()));
        channel.publish(AuthEvent::signed_out());

        let expected = vec![
            AuthEventKind::SignedOut,
            AuthEventKind::SignedIn,
            AuthEventKind::SignedOut,
        ];
        assert_eq!(*first_seen.lock().unwrap(), expected);
        assert_eq!(*second_seen.lock().unwrap(), expected);
        assert!(channel.current().is_none());
    }

    #[test]
    fn unsubscribed_listener_is_not_called_again() {
        let channel = AuthChannel::new(None);
        let (listener, seen) = recorder();
        let subscription = channel.subscribe(listener);
        assert_eq!(channel.subscriber_count(), 1);

        subscription.unsubscribe();
        channel.publish(AuthEvent::signed_in(session()));

        assert_eq!(channel.subscriber_count(), 0);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in identity every task collection is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A current session, passed explicitly to whatever needs the user scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    /// Bearer token for the hosted backend; absent for offline identities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// An identity for local mode, keyed by the lowercased e-mail address
    pub fn offline(email: &str) -> Self {
        let email = email.trim().to_lowercase();
        Session {
            user: User {
                id: email.clone(),
                email: Some(email),
            },
            access_token: None,
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Name shown to the user: e-mail if known, else the id
    pub fn display_name(&self) -> &str {
        self.user.email.as_deref().unwrap_or(&self.user.id)
    }
}

/// Sign-in state change delivered to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Session),
    SignedOut,
}

/// Handle returned by [`SessionHub::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(usize);

type Observer = Box<dyn FnMut(&SessionEvent)>;

/// Holds the current session and notifies subscribers when it changes.
#[derive(Default)]
pub struct SessionHub {
    current: Option<Session>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_id: usize,
}

impl SessionHub {
    pub fn new(current: Option<Session>) -> Self {
        SessionHub {
            current,
            observers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&SessionEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.observers.retain(|(oid, _)| *oid != id);
    }

    pub fn sign_in(&mut self, session: Session) {
        self.current = Some(session.clone());
        self.notify(&SessionEvent::SignedIn(session));
    }

    /// Clears the session. Observers are only notified if one was present.
    pub fn sign_out(&mut self) {
        if self.current.take().is_some() {
            self.notify(&SessionEvent::SignedOut);
        }
    }

    fn notify(&mut self, event: &SessionEvent) {
        for (_, observer) in &mut self.observers {
            observer(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_offline_session_lowercases_email() {
        let s = Session::offline("  Me@Example.COM ");
        assert_eq!(s.user_id(), "me@example.com");
        assert_eq!(s.display_name(), "me@example.com");
        assert!(s.access_token.is_none());
    }

    #[test]
    fn test_hub_notifies_subscribers() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut hub = SessionHub::new(None);
        let sink = Rc::clone(&seen);
        hub.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        let session = Session::offline("a@b.c");
        hub.sign_in(session.clone());
        hub.sign_out();
        // Second sign-out is a no-op
        hub.sign_out();

        assert_eq!(
            *seen.borrow(),
            vec![SessionEvent::SignedIn(session), SessionEvent::SignedOut]
        );
        assert!(hub.current().is_none());
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let count = Rc::new(RefCell::new(0));
        let mut hub = SessionHub::default();
        let c = Rc::clone(&count);
        let id = hub.subscribe(move |_| *c.borrow_mut() += 1);
        hub.sign_in(Session::offline("a@b.c"));
        hub.unsubscribe(id);
        hub.sign_out();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let mut s = Session::offline("a@b.c");
        assert!(!s.is_expired(now));
        s.expires_at = Some(now - chrono::Duration::seconds(1));
        assert!(s.is_expired(now));
    }
}

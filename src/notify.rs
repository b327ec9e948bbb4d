//! Process-wide "settings did change" broadcast.
//!
//! Everything runs on the UI thread, so listeners live in a thread-local
//! registry and are invoked synchronously by [`post_settings_changed`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::trace;

type Listener = Rc<dyn Fn()>;

thread_local! {
    static LISTENERS: RefCell<Vec<(usize, Listener)>> = RefCell::new(Vec::new());
    static NEXT_ID: Cell<usize> = const { Cell::new(1) };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Subscription(usize);

pub fn subscribe(listener: impl Fn() + 'static) -> Subscription {
    let id = NEXT_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    });
    LISTENERS.with(|l| l.borrow_mut().push((id, Rc::new(listener))));
    Subscription(id)
}

pub fn unsubscribe(subscription: Subscription) {
    LISTENERS.with(|l| l.borrow_mut().retain(|(id, _)| *id != subscription.0));
}

pub fn post_settings_changed() {
    // Snapshot first so a listener may subscribe or unsubscribe re-entrantly.
    let listeners: Vec<Listener> =
        LISTENERS.with(|l| l.borrow().iter().map(|(_, f)| f.clone()).collect());
    trace!(listeners = listeners.len(), "settings changed");
    for listener in listeners {
        listener();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listener_hears_each_post() {
        let a = Rc::new(Cell::new(0));
        let b = Rc::new(Cell::new(0));
        let sa = {
            let a = a.clone();
            subscribe(move || a.set(a.get() + 1))
        };
        let sb = {
            let b = b.clone();
            subscribe(move || b.set(b.get() + 1))
        };

        post_settings_changed();
        post_settings_changed();
        assert_eq!((a.get(), b.get()), (2, 2));

        unsubscribe(sa);
        post_settings_changed();
        assert_eq!((a.get(), b.get()), (2, 3));
        unsubscribe(sb);
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let hits = Rc::new(Cell::new(0));
        let slot: Rc<Cell<Option<Subscription>>> = Rc::new(Cell::new(None));
        let sub = {
            let hits = hits.clone();
            let slot = slot.clone();
            subscribe(move || {
                hits.set(hits.get() + 1);
                if let Some(me) = slot.get() {
                    unsubscribe(me);
                }
            })
        };
        slot.set(Some(sub));

        post_settings_changed();
        post_settings_changed();
        assert_eq!(hits.get(), 1);
    }
}

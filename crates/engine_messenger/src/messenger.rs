//! Listener registry and synchronous dispatch.
//!
//! A [`Messenger<C>`] stores handlers of the shape `Fn(&mut C, &M)`, one
//! ordered channel per message type `M`. The context `C` is the object that
//! owns the messenger; [`Messaging::dispatch`] snapshots the channel and then
//! hands every handler `&mut C`, so handlers are free to mutate the context
//! (including the messenger itself) without invalidating the dispatch.
//!
//! ## Ordering
//!
//! Listeners run in ascending priority. Equal priorities run in registration
//! order. A listener registered at [`i32::MIN`] therefore runs before every
//! listener registered later at any priority.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

/// Shared handler type for message `M` delivered within context `C`.
pub type Handler<C, M> = Rc<dyn Fn(&mut C, &M)>;

/// Handle identifying one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

struct Slot {
    id: ListenerId,
    priority: i32,
    /// A boxed `Handler<C, M>` for the channel's message type.
    handler: Box<dyn Any>,
}

/// Registry of listeners for a context type `C`.
pub struct Messenger<C: 'static> {
    channels: HashMap<TypeId, Vec<Slot>>,
    owners: HashMap<ListenerId, TypeId>,
    next_id: u64,
    _context: std::marker::PhantomData<fn(&mut C)>,
}

impl<C: 'static> Messenger<C> {
    /// Create an empty messenger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
            owners: HashMap::new(),
            next_id: 1,
            _context: std::marker::PhantomData,
        }
    }

    /// Register `handler` for messages of type `M` at `priority`.
    ///
    /// The handler is placed after every existing listener whose priority is
    /// less than or equal to `priority`.
    pub fn add_listener<M: 'static>(
        &mut self,
        priority: i32,
        handler: impl Fn(&mut C, &M) + 'static,
    ) -> ListenerId {
        let handler: Handler<C, M> = Rc::new(handler);
        self.add_handler(priority, handler)
    }

    /// Register an already shared handler. See [`Messenger::add_listener`].
    pub fn add_handler<M: 'static>(&mut self, priority: i32, handler: Handler<C, M>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;

        let type_id = TypeId::of::<M>();
        let channel = self.channels.entry(type_id).or_default();
        let index = channel.partition_point(|slot| slot.priority <= priority);
        channel.insert(
            index,
            Slot {
                id,
                priority,
                handler: Box::new(handler),
            },
        );
        self.owners.insert(id, type_id);

        trace!(
            listener = id.0,
            priority,
            message = std::any::type_name::<M>(),
            "listener added"
        );
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let Some(type_id) = self.owners.remove(&id) else {
            return false;
        };
        if let Some(channel) = self.channels.get_mut(&type_id) {
            channel.retain(|slot| slot.id != id);
            if channel.is_empty() {
                self.channels.remove(&type_id);
            }
        }
        trace!(listener = id.0, "listener removed");
        true
    }

    /// Returns `true` if `id` is currently registered.
    #[must_use]
    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.owners.contains_key(&id)
    }

    /// Returns the number of listeners registered for message type `M`.
    #[must_use]
    pub fn listener_count<M: 'static>(&self) -> usize {
        self.channels
            .get(&TypeId::of::<M>())
            .map_or(0, Vec::len)
    }

    /// Returns the total number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Returns `true` if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Remove every listener.
    pub fn clear(&mut self) {
        self.channels.clear();
        self.owners.clear();
    }

    /// Copy the current channel for `M`, in delivery order.
    #[must_use]
    pub fn snapshot<M: 'static>(&self) -> Vec<(ListenerId, Handler<C, M>)> {
        let Some(channel) = self.channels.get(&TypeId::of::<M>()) else {
            return Vec::new();
        };
        channel
            .iter()
            .filter_map(|slot| {
                slot.handler
                    .downcast_ref::<Handler<C, M>>()
                    .map(|handler| (slot.id, Rc::clone(handler)))
            })
            .collect()
    }
}

impl<C: 'static> Default for Messenger<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> std::fmt::Debug for Messenger<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messenger")
            .field("channels", &self.channels.len())
            .field("listeners", &self.owners.len())
            .finish()
    }
}

/// A context that owns a [`Messenger`] over itself.
pub trait Messaging: Sized + 'static {
    /// The messenger holding this context's listeners.
    fn messenger(&self) -> &Messenger<Self>;

    /// Mutable access to the messenger.
    fn messenger_mut(&mut self) -> &mut Messenger<Self>;

    /// Deliver `message` to every listener of `M`.
    ///
    /// The channel is snapshotted first. A listener removed by an earlier
    /// handler during this dispatch is skipped; a listener added during this
    /// dispatch first sees the next message.
    fn dispatch<M: 'static>(&mut self, message: &M) {
        let listeners = self.messenger().snapshot::<M>();
        for (id, handler) in listeners {
            if !self.messenger().has_listener(id) {
                continue;
            }
            handler(self, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Context {
        messenger: Messenger<Context>,
        log: Vec<String>,
        extra: Option<ListenerId>,
    }

    impl Messaging for Context {
        fn messenger(&self) -> &Messenger<Self> {
            &self.messenger
        }

        fn messenger_mut(&mut self) -> &mut Messenger<Self> {
            &mut self.messenger
        }
    }

    struct Ping(u32);
    struct Pong;

    #[test]
    fn test_priority_order_with_stable_ties() {
        let mut ctx = Context::default();
        ctx.messenger.add_listener(5, |c: &mut Context, _: &Ping| c.log.push("p5".into()));
        ctx.messenger.add_listener(1, |c: &mut Context, _: &Ping| c.log.push("p1a".into()));
        ctx.messenger.add_listener(1, |c: &mut Context, _: &Ping| c.log.push("p1b".into()));
        ctx.messenger.add_listener(i32::MIN, |c: &mut Context, _: &Ping| c.log.push("min".into()));

        ctx.dispatch(&Ping(0));

        assert_eq!(ctx.log, vec!["min", "p1a", "p1b", "p5"]);
    }

    #[test]
    fn test_channels_are_separated_by_type() {
        let mut ctx = Context::default();
        ctx.messenger.add_listener(0, |c: &mut Context, m: &Ping| c.log.push(format!("ping {}", m.0)));
        ctx.messenger.add_listener(0, |c: &mut Context, _: &Pong| c.log.push("pong".into()));

        ctx.dispatch(&Ping(7));

        assert_eq!(ctx.log, vec!["ping 7"]);
        assert_eq!(ctx.messenger.listener_count::<Ping>(), 1);
        assert_eq!(ctx.messenger.listener_count::<Pong>(), 1);
    }

    #[test]
    fn test_remove_listener() {
        let mut ctx = Context::default();
        let id = ctx.messenger.add_listener(0, |c: &mut Context, _: &Ping| c.log.push("x".into()));

        assert!(ctx.messenger.remove_listener(id));
        assert!(!ctx.messenger.remove_listener(id));
        assert!(ctx.messenger.is_empty());

        ctx.dispatch(&Ping(0));
        assert!(ctx.log.is_empty());
    }

    #[test]
    fn test_listener_removed_mid_dispatch_is_skipped() {
        let mut ctx = Context::default();
        ctx.messenger.add_listener(0, |c: &mut Context, _: &Ping| {
            c.log.push("first".into());
            if let Some(id) = c.extra.take() {
                c.messenger.remove_listener(id);
            }
        });
        let second = ctx
            .messenger
            .add_listener(1, |c: &mut Context, _: &Ping| c.log.push("second".into()));
        ctx.extra = Some(second);

        ctx.dispatch(&Ping(0));

        assert_eq!(ctx.log, vec!["first"]);
    }

    #[test]
    fn test_listener_added_mid_dispatch_waits_for_next_message() {
        let mut ctx = Context::default();
        ctx.messenger.add_listener(0, |c: &mut Context, _: &Ping| {
            c.log.push("outer".into());
            if c.extra.is_none() {
                let id = c
                    .messenger
                    .add_listener(1, |c: &mut Context, _: &Ping| c.log.push("inner".into()));
                c.extra = Some(id);
            }
        });

        ctx.dispatch(&Ping(0));
        assert_eq!(ctx.log, vec!["outer"]);

        ctx.dispatch(&Ping(1));
        assert_eq!(ctx.log, vec!["outer", "outer", "inner"]);
    }

    #[test]
    fn test_nested_dispatch() {
        let mut ctx = Context::default();
        ctx.messenger.add_listener(0, |c: &mut Context, m: &Ping| {
            c.log.push(format!("ping {}", m.0));
            c.dispatch(&Pong);
        });
        ctx.messenger.add_listener(0, |c: &mut Context, _: &Pong| c.log.push("pong".into()));

        ctx.dispatch(&Ping(3));

        assert_eq!(ctx.log, vec!["ping 3", "pong"]);
    }
}

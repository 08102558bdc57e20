//! In-process FIFO event dispatcher.
//!
//! Handlers are registered per [`EventKind`] and run in registration order.
//! Each handler gets the mutable run context `C` plus the [`EventQueue`], so it
//! can enqueue follow-up events; those are drained in the same `drain` call.

use std::collections::{HashMap, VecDeque};

use super::event::{Event, EventKind};

/// Handler signature: mutable context, the event being dispatched, and the
/// queue to push follow-up events onto.
pub type Handler<C> = Box<dyn FnMut(&mut C, &Event, &mut EventQueue)>;

#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: impl Into<Event>) {
        self.events.push_back(event.into());
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

pub struct EventDispatcher<C> {
    queue: EventQueue,
    handlers: HashMap<EventKind, Vec<Handler<C>>>,
}

impl<C> EventDispatcher<C> {
    pub fn new() -> Self {
        EventDispatcher {
            queue: EventQueue::new(),
            handlers: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, kind: EventKind, handler: F)
    where
        F: FnMut(&mut C, &Event, &mut EventQueue) + 'static,
    {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    pub fn enqueue(&mut self, event: impl Into<Event>) {
        self.queue.push(event);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Handle queued events until the queue is empty, including any enqueued
    /// while draining. Returns the number of events handled.
    ///
    /// A handler that unconditionally re-enqueues its own trigger kind never
    /// lets this return.
    pub fn drain(&mut self, ctx: &mut C) -> usize {
        let mut handled = 0;
        while let Some(event) = self.queue.pop() {
            if let Some(handlers) = self.handlers.get_mut(&event.kind()) {
                for handler in handlers.iter_mut() {
                    handler(ctx, &event, &mut self.queue);
                }
            }
            handled += 1;
        }
        handled
    }
}

impl<C> Default for EventDispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

//! Hook channels
//!
//! A [`Channel`] holds the handlers subscribed to one lifecycle [`Stage`].
//! Emission visits handlers in subscription order and stops at the first
//! handler that returns `Some`; that value is handed back to the emitter.
//! `None` from every handler means nobody had an opinion.
//!
//! Handlers subscribed with [`Channel::subscribe_once`] fire at most once.
//! Emission only needs `&self`, so a channel can be shared between threads
//! and a handler may emit on the same channel again (the array validator
//! re-checks every element through the full chain).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Lifecycle stage a channel belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Schema keywords are folded into the check model
    Compile,
    /// Live values are checked against a rule set
    Check,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Compile => f.write_str("compile"),
            Stage::Check => f.write_str("check"),
        }
    }
}

struct Entry<H: ?Sized> {
    handler: Box<H>,
    once: bool,
    spent: AtomicBool,
}

impl<H: ?Sized> Entry<H> {
    fn is_live(&self) -> bool {
        !(self.once && self.spent.load(Ordering::Acquire))
    }
}

/// Ordered set of handlers for one stage
pub struct Channel<H: ?Sized> {
    stage: Stage,
    entries: Vec<Entry<H>>,
}

impl<H: ?Sized> Channel<H> {
    /// Create an empty channel
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            entries: Vec::new(),
        }
    }

    /// Stage this channel serves
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Append a handler that stays subscribed
    pub fn subscribe(&mut self, handler: Box<H>) {
        self.push(handler, false);
    }

    /// Append a handler that is dropped after it fires once
    pub fn subscribe_once(&mut self, handler: Box<H>) {
        self.push(handler, true);
    }

    fn push(&mut self, handler: Box<H>, once: bool) {
        self.entries.retain(Entry::is_live);
        self.entries.push(Entry {
            handler,
            once,
            spent: AtomicBool::new(false),
        });
    }

    /// Number of handlers that can still fire
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_live()).count()
    }

    /// Whether no handler can fire any more
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke handlers in order until one returns `Some`.
    pub fn emit<R>(&self, mut invoke: impl FnMut(&H) -> Option<R>) -> Option<R> {
        for entry in &self.entries {
            // swap claims the one-shot entry before it runs
            if entry.once && entry.spent.swap(true, Ordering::AcqRel) {
                continue;
            }
            if let Some(result) = invoke(&*entry.handler) {
                return Some(result);
            }
        }
        None
    }
}

impl<H: ?Sized> fmt::Debug for Channel<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("stage", &self.stage)
            .field("handlers", &self.len())
            .finish()
    }
}

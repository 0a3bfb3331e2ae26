use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use parking_lot::Mutex;

struct CanvasShared {
    size: Mutex<(u32, u32)>,
    subscribers: Mutex<HashMap<u64, UnboundedSender<(u32, u32)>>>,
    next_key: AtomicU64,
}

/// The drawable area a renderer presents to.
///
/// The windowing layer calls [`Canvas::resize`]; interested parties hold a
/// [`ResizeSubscription`], which unregisters itself when dropped.
#[derive(Clone)]
pub struct Canvas {
    shared: Arc<CanvasShared>,
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("size", &self.size())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            shared: Arc::new(CanvasShared {
                size: Mutex::new((width, height)),
                subscribers: Mutex::new(HashMap::new()),
                next_key: AtomicU64::new(0),
            }),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        *self.shared.size.lock()
    }

    pub fn aspect(&self) -> f32 {
        let (width, height) = self.size();
        width as f32 / height.max(1) as f32
    }

    /// Record a new size and notify every live subscriber.
    pub fn resize(&self, width: u32, height: u32) {
        *self.shared.size.lock() = (width, height);
        self.shared
            .subscribers
            .lock()
            .retain(|_, tx| tx.unbounded_send((width, height)).is_ok());
    }

    pub fn subscribe(&self) -> ResizeSubscription {
        let key = self.shared.next_key.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = unbounded();
        self.shared.subscribers.lock().insert(key, tx);
        ResizeSubscription {
            key,
            canvas: Arc::downgrade(&self.shared),
            events: rx,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().len()
    }
}

/// A registered interest in canvas resizes.
pub struct ResizeSubscription {
    key: u64,
    canvas: Weak<CanvasShared>,
    events: UnboundedReceiver<(u32, u32)>,
}

impl ResizeSubscription {
    /// Drain pending notifications, returning only the most recent size.
    pub fn latest(&mut self) -> Option<(u32, u32)> {
        let mut latest = None;
        while let Ok(Some(size)) = self.events.try_next() {
            latest = Some(size);
        }
        latest
    }
}

impl Drop for ResizeSubscription {
    fn drop(&mut self) {
        if let Some(canvas) = self.canvas.upgrade() {
            canvas.subscribers.lock().remove(&self.key);
        }
    }
}

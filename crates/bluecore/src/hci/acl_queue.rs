//! Bounded bidirectional ACL data queue
//!
//! The queue joins upper-stack producers/consumers to the HAL send/receive
//! path. The upper end is handed to the stack; the lower end is drained and
//! fed from the dispatcher handler. Each direction is bounded by the
//! configured depth, so upper producers see backpressure when the engine
//! falls behind.

use crate::error::HciError;
use crate::hci::handler::Handler;
use crate::hci::packet::AclPacket;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, Weak};

pub(crate) type DrainHook = Arc<dyn Fn() + Send + Sync>;

struct Side {
    packets: VecDeque<AclPacket>,
    closed: bool,
}

impl Side {
    fn new() -> Self {
        Self {
            packets: VecDeque::new(),
            closed: false,
        }
    }
}

struct Shared {
    depth: usize,
    /// Stack to controller
    outbound: Mutex<Side>,
    outbound_space: Condvar,
    /// Controller to stack
    inbound: Mutex<Side>,
    inbound_ready: Condvar,
    /// Invoked after an outbound enqueue; posts the engine drain task
    outbound_drain: Mutex<Option<DrainHook>>,
    /// Invoked after an inbound dequeue frees space
    inbound_refill: Mutex<Option<DrainHook>>,
}

impl Shared {
    fn notify_outbound_drain(&self) {
        let hook = self.outbound_drain.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn notify_inbound_refill(&self) {
        let hook = self.inbound_refill.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

/// Lower end of the ACL queue, owned by the HCI layer
#[derive(Clone)]
pub(crate) struct AclQueue {
    shared: Arc<Shared>,
}

impl AclQueue {
    pub fn new(depth: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                depth,
                outbound: Mutex::new(Side::new()),
                outbound_space: Condvar::new(),
                inbound: Mutex::new(Side::new()),
                inbound_ready: Condvar::new(),
                outbound_drain: Mutex::new(None),
                inbound_refill: Mutex::new(None),
            }),
        }
    }

    /// Handle given to the upper stack
    pub fn up_end(&self) -> AclQueueUpEnd {
        AclQueueUpEnd {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn register_outbound_drain(&self, hook: DrainHook) {
        *self.shared.outbound_drain.lock().unwrap() = Some(hook);
    }

    pub fn unregister_outbound_drain(&self) {
        *self.shared.outbound_drain.lock().unwrap() = None;
    }

    fn set_inbound_refill(&self, hook: DrainHook) {
        *self.shared.inbound_refill.lock().unwrap() = Some(hook);
    }

    fn clear_inbound_refill(&self) {
        *self.shared.inbound_refill.lock().unwrap() = None;
    }

    /// Take one outbound packet for transmission. Runs on the handler.
    pub fn dequeue_outbound(&self) -> Option<AclPacket> {
        let mut side = self.shared.outbound.lock().unwrap();
        let packet = side.packets.pop_front();
        if packet.is_some() {
            self.shared.outbound_space.notify_one();
        }
        packet
    }

    /// Offer one inbound packet to the stack-facing side. Runs on the
    /// handler. Returns the packet when the side is full.
    fn enqueue_inbound(&self, packet: AclPacket) -> Result<(), AclPacket> {
        let mut side = self.shared.inbound.lock().unwrap();
        if side.closed {
            // Teardown in progress, nobody will read it
            return Ok(());
        }
        if side.packets.len() >= self.shared.depth {
            return Err(packet);
        }
        side.packets.push_back(packet);
        self.shared.inbound_ready.notify_one();
        Ok(())
    }

    /// Close both directions, waking all blocked upper-end callers
    pub fn close(&self) {
        self.shared.outbound.lock().unwrap().closed = true;
        self.shared.outbound_space.notify_all();
        self.shared.inbound.lock().unwrap().closed = true;
        self.shared.inbound_ready.notify_all();
        self.clear_inbound_refill();
    }
}

/// Upper end of the ACL queue, exposed to stack consumers and producers
#[derive(Clone)]
pub struct AclQueueUpEnd {
    shared: Arc<Shared>,
}

impl AclQueueUpEnd {
    /// Enqueue an outbound ACL packet, blocking while the queue is full
    pub fn send(&self, packet: AclPacket) -> Result<(), HciError> {
        let mut side = self.shared.outbound.lock().unwrap();
        while side.packets.len() >= self.shared.depth && !side.closed {
            side = self.shared.outbound_space.wait(side).unwrap();
        }
        if side.closed {
            return Err(HciError::Stopped);
        }
        side.packets.push_back(packet);
        drop(side);
        self.shared.notify_outbound_drain();
        Ok(())
    }

    /// Enqueue an outbound ACL packet, failing fast when the queue is full
    pub fn try_send(&self, packet: AclPacket) -> Result<(), HciError> {
        let mut side = self.shared.outbound.lock().unwrap();
        if side.closed {
            return Err(HciError::Stopped);
        }
        if side.packets.len() >= self.shared.depth {
            return Err(HciError::QueueFull);
        }
        side.packets.push_back(packet);
        drop(side);
        self.shared.notify_outbound_drain();
        Ok(())
    }

    /// Wait for the next inbound ACL packet. Returns `None` once the layer
    /// is stopped and the queue drained.
    pub fn receive(&self) -> Option<AclPacket> {
        let mut side = self.shared.inbound.lock().unwrap();
        loop {
            if let Some(packet) = side.packets.pop_front() {
                drop(side);
                self.shared.notify_inbound_refill();
                return Some(packet);
            }
            if side.closed {
                return None;
            }
            side = self.shared.inbound_ready.wait(side).unwrap();
        }
    }

    /// Take the next inbound ACL packet without blocking
    pub fn try_receive(&self) -> Option<AclPacket> {
        let mut side = self.shared.inbound.lock().unwrap();
        let packet = side.packets.pop_front();
        drop(side);
        if packet.is_some() {
            self.shared.notify_inbound_refill();
        }
        packet
    }
}

struct Pending {
    packets: VecDeque<AclPacket>,
    drain_posted: bool,
}

/// Coalesces inbound ACL posts from the HAL thread onto the handler
///
/// The HAL thread never touches the queue directly: packets land here, and
/// at most one drain task is pending on the handler at a time. Packets that
/// do not fit the bounded inbound side stay buffered until a consumer frees
/// space, which re-posts the drain through the refill hook.
pub(crate) struct EnqueueBuffer {
    pending: Mutex<Pending>,
    queue: AclQueue,
    handler: Handler,
    weak_self: Weak<EnqueueBuffer>,
}

impl EnqueueBuffer {
    pub fn new(queue: AclQueue, handler: Handler) -> Arc<Self> {
        let buffer = Arc::new_cyclic(|weak| Self {
            pending: Mutex::new(Pending {
                packets: VecDeque::new(),
                drain_posted: false,
            }),
            queue: queue.clone(),
            handler,
            weak_self: weak.clone(),
        });

        let weak = Arc::downgrade(&buffer);
        queue.set_inbound_refill(Arc::new(move || {
            if let Some(buffer) = weak.upgrade() {
                buffer.schedule_drain();
            }
        }));

        buffer
    }

    /// Called from the HAL thread
    pub fn enqueue(&self, packet: AclPacket) {
        let mut pending = self.pending.lock().unwrap();
        pending.packets.push_back(packet);
        self.schedule_drain_locked(&mut pending);
    }

    fn schedule_drain(&self) {
        let mut pending = self.pending.lock().unwrap();
        self.schedule_drain_locked(&mut pending);
    }

    fn schedule_drain_locked(&self, pending: &mut Pending) {
        if pending.drain_posted || pending.packets.is_empty() {
            return;
        }
        let Some(buffer) = self.weak_self.upgrade() else {
            return;
        };
        pending.drain_posted = true;
        self.handler.post(move || buffer.drain());
    }

    // Runs on the handler thread
    fn drain(&self) {
        let mut pending = self.pending.lock().unwrap();
        pending.drain_posted = false;
        while let Some(packet) = pending.packets.pop_front() {
            if let Err(packet) = self.queue.enqueue_inbound(packet) {
                // Inbound side full; the refill hook re-posts us
                pending.packets.push_front(packet);
                break;
            }
        }
    }

    /// Drop buffered packets on teardown
    pub fn clear(&self) {
        self.pending.lock().unwrap().packets.clear();
    }
}

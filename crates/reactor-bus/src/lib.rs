// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic-routed pub/sub. `signal.id` is the topic: `publish` looks up the
//! subscriber list for that id and enqueues a copy into each subscriber's
//! inbox via the caller's [`EmitSink`].
//!
//! The topic table is a fixed-size linear scan (the same array-of-slots
//! shape `lib/fixedmap` uses), but unlike `FixedMap::insert` it never
//! panics on a full table — `subscribe` returns `NoMemory`, matching the
//! rest of this engine's no-panic-on-capacity contract. The table is
//! guarded by a [`critical_section::Mutex`], the same primitive
//! `reactor-core`'s inbox uses, so `publish` is safe to call from an ISR.

#![cfg_attr(not(test), no_std)]

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;
use reactor_abi::{DispatchError, Signal};
use reactor_core::EmitSink;

#[derive(Copy, Clone)]
struct Topic<const SUBS: usize> {
    id: Option<u16>,
    subscribers: [Option<u16>; SUBS],
}

impl<const SUBS: usize> Topic<SUBS> {
    const EMPTY: Self = Self {
        id: None,
        subscribers: [None; SUBS],
    };

    fn subscriber_count(&self) -> usize {
        self.subscribers.iter().filter(|s| s.is_some()).count()
    }
}

/// Publish/deliver statistics, tracked independently of the topic table so
/// they can be read without taking its lock.
#[derive(Default)]
pub struct BusStats {
    pub published: AtomicU32,
    pub delivered: AtomicU32,
    pub dropped: AtomicU32,
    pub no_subscribers: AtomicU32,
}

impl BusStats {
    const fn new() -> Self {
        Self {
            published: AtomicU32::new(0),
            delivered: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            no_subscribers: AtomicU32::new(0),
        }
    }

    pub fn published(&self) -> u32 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u32 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn no_subscribers(&self) -> u32 {
        self.no_subscribers.load(Ordering::Relaxed)
    }
}

/// A fixed-capacity topic table: up to `TOPICS` distinct topic ids, each
/// with up to `SUBS` subscribing entity ids.
pub struct TopicBus<const TOPICS: usize = 8, const SUBS: usize = 8, const PAYLOAD: usize = 4> {
    topics: Mutex<RefCell<[Topic<SUBS>; TOPICS]>>,
    stats: BusStats,
}

impl<const TOPICS: usize, const SUBS: usize, const PAYLOAD: usize> TopicBus<TOPICS, SUBS, PAYLOAD> {
    pub const fn new() -> Self {
        Self {
            topics: Mutex::new(RefCell::new([Topic::EMPTY; TOPICS])),
            stats: BusStats::new(),
        }
    }

    pub fn stats(&self) -> &BusStats {
        &self.stats
    }

    /// Adds `entity_id` to `topic_id`'s subscriber list, creating the topic
    /// if it doesn't exist yet. Idempotent: subscribing twice succeeds
    /// without adding a second entry. `NoMemory` if the topic table is full
    /// (new topic) or the topic's subscriber list is full (existing topic).
    pub fn subscribe(&self, entity_id: u16, topic_id: u16) -> Result<(), DispatchError> {
        critical_section::with(|cs| {
            let mut topics = self.topics.borrow(cs).borrow_mut();
            let slot = match topics.iter().position(|t| t.id == Some(topic_id)) {
                Some(i) => i,
                None => {
                    let free = topics
                        .iter()
                        .position(|t| t.id.is_none())
                        .ok_or(DispatchError::NoMemory)?;
                    topics[free] = Topic {
                        id: Some(topic_id),
                        subscribers: [None; SUBS],
                    };
                    free
                }
            };
            let topic = &mut topics[slot];
            if topic.subscribers.contains(&Some(entity_id)) {
                return Ok(());
            }
            let free = topic
                .subscribers
                .iter()
                .position(|s| s.is_none())
                .ok_or(DispatchError::NoMemory)?;
            topic.subscribers[free] = Some(entity_id);
            // Keep subscribers sorted ascending so `publish` delivers in id
            // order regardless of subscription order.
            let mut i = free;
            while i > 0 {
                let (a, b) = (topic.subscribers[i - 1], topic.subscribers[i]);
                match (a, b) {
                    (Some(a), Some(b)) if a > b => {
                        topic.subscribers.swap(i - 1, i);
                        i -= 1;
                    }
                    _ => break,
                }
            }
            Ok(())
        })
    }

    /// Removes `entity_id` from `topic_id`'s subscriber list. `NotFound` if
    /// it wasn't subscribed (or the topic doesn't exist). Reclaims the
    /// topic entry once its subscriber count reaches zero.
    pub fn unsubscribe(&self, entity_id: u16, topic_id: u16) -> Result<(), DispatchError> {
        critical_section::with(|cs| {
            let mut topics = self.topics.borrow(cs).borrow_mut();
            let slot = topics
                .iter()
                .position(|t| t.id == Some(topic_id))
                .ok_or(DispatchError::NotFound)?;
            let topic = &mut topics[slot];
            let pos = topic
                .subscribers
                .iter()
                .position(|s| *s == Some(entity_id))
                .ok_or(DispatchError::NotFound)?;
            topic.subscribers[pos] = None;
            if topic.subscriber_count() == 0 {
                topics[slot] = Topic::EMPTY;
            }
            Ok(())
        })
    }

    /// Uses `signal.id` as the topic, enqueuing a copy into each
    /// subscriber's inbox via `emit_sink`, in ascending subscriber-id order.
    /// Returns the count actually delivered; a full inbox at any subscriber
    /// is counted as a drop and does not abort the remaining deliveries.
    /// With no subscribers (including no such topic), returns 0 and bumps
    /// the no-subscribers counter instead of the delivered one.
    pub fn publish(
        &self,
        signal: Signal<PAYLOAD>,
        emit_sink: &dyn EmitSink<PAYLOAD>,
    ) -> u32 {
        self.stats.published.fetch_add(1, Ordering::Relaxed);

        let subscribers: [Option<u16>; SUBS] = critical_section::with(|cs| {
            let topics = self.topics.borrow(cs).borrow();
            topics
                .iter()
                .find(|t| t.id == Some(signal.id))
                .map(|t| t.subscribers)
                .unwrap_or([None; SUBS])
        });

        if subscribers.iter().all(Option::is_none) {
            self.stats.no_subscribers.fetch_add(1, Ordering::Relaxed);
            return 0;
        }

        let mut delivered = 0u32;
        for id in subscribers.into_iter().flatten() {
            if emit_sink.emit(id, signal).is_ok() {
                delivered += 1;
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
            } else {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        delivered
    }
}

impl<const TOPICS: usize, const SUBS: usize, const PAYLOAD: usize> Default
    for TopicBus<TOPICS, SUBS, PAYLOAD>
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell as StdRefCell;
    use reactor_abi::Signal;

    struct RecordingSink(StdRefCell<std::vec::Vec<(u16, Signal<4>)>>);
    impl EmitSink<4> for RecordingSink {
        fn emit(&self, target: u16, signal: Signal<4>) -> Result<(), DispatchError> {
            self.0.borrow_mut().push((target, signal));
            Ok(())
        }
    }

    struct RefusingSink(u16);
    impl EmitSink<4> for RefusingSink {
        fn emit(&self, target: u16, _signal: Signal<4>) -> Result<(), DispatchError> {
            if target == self.0 {
                Err(DispatchError::QueueFull)
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn subscribe_is_idempotent() {
        let bus: TopicBus<4, 4, 4> = TopicBus::new();
        bus.subscribe(1, 0x500).unwrap();
        bus.subscribe(1, 0x500).unwrap();
        let sink = RecordingSink(StdRefCell::new(std::vec::Vec::new()));
        let delivered = bus.publish(Signal::new(0x500, 0), &sink);
        assert_eq!(delivered, 1);
    }

    #[test]
    fn publish_delivers_in_ascending_subscriber_id_order() {
        let bus: TopicBus<4, 4, 4> = TopicBus::new();
        bus.subscribe(3, 0x500).unwrap();
        bus.subscribe(1, 0x500).unwrap();
        bus.subscribe(2, 0x500).unwrap();

        let sink = RecordingSink(StdRefCell::new(std::vec::Vec::new()));
        let delivered = bus.publish(Signal::new(0x500, 0), &sink);

        assert_eq!(delivered, 3);
        let seen: std::vec::Vec<u16> = sink.0.borrow().iter().map(|(id, _)| *id).collect();
        assert_eq!(seen, std::vec![1, 2, 3]);
    }

    #[test]
    fn publish_with_no_subscribers_counts_and_returns_zero() {
        let bus: TopicBus<4, 4, 4> = TopicBus::new();
        let sink = RecordingSink(StdRefCell::new(std::vec::Vec::new()));
        let delivered = bus.publish(Signal::new(0x999, 0), &sink);
        assert_eq!(delivered, 0);
        assert_eq!(bus.stats().no_subscribers(), 1);
    }

    #[test]
    fn publish_counts_drops_without_aborting_remaining_deliveries() {
        let bus: TopicBus<4, 4, 4> = TopicBus::new();
        bus.subscribe(1, 0x500).unwrap();
        bus.subscribe(2, 0x500).unwrap();
        let sink = RefusingSink(1);

        let delivered = bus.publish(Signal::new(0x500, 0), &sink);

        assert_eq!(delivered, 1);
        assert_eq!(bus.stats().delivered(), 1);
        assert_eq!(bus.stats().dropped(), 1);
    }

    #[test]
    fn unsubscribe_then_publish_skips_entity_and_reclaims_empty_topic() {
        let bus: TopicBus<4, 4, 4> = TopicBus::new();
        bus.subscribe(1, 0x500).unwrap();
        bus.unsubscribe(1, 0x500).unwrap();

        assert_eq!(
            bus.unsubscribe(1, 0x500),
            Err(DispatchError::NotFound)
        );

        let sink = RecordingSink(StdRefCell::new(std::vec::Vec::new()));
        let delivered = bus.publish(Signal::new(0x500, 0), &sink);
        assert_eq!(delivered, 0);
        assert_eq!(bus.stats().no_subscribers(), 1);
    }

    #[test]
    fn subscribe_beyond_subscriber_capacity_fails() {
        let bus: TopicBus<4, 1, 4> = TopicBus::new();
        bus.subscribe(1, 0x500).unwrap();
        assert_eq!(
            bus.subscribe(2, 0x500),
            Err(DispatchError::NoMemory)
        );
    }

    #[test]
    fn subscribe_beyond_topic_table_capacity_fails() {
        let bus: TopicBus<1, 4, 4> = TopicBus::new();
        bus.subscribe(1, 0x500).unwrap();
        assert_eq!(
            bus.subscribe(1, 0x501),
            Err(DispatchError::NoMemory)
        );
    }
}

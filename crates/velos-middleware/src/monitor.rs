//! [`TopicMonitor`] – liveness, frequency and validity of the topics a cycle
//! depends on.
//!
//! A topic is judged on three independent axes:
//!
//! * **alive**: a message arrived within ten nominal periods.
//! * **freq_ok**: the average inter-arrival time over a short window stays
//!   within 80-120 % of nominal. Never-received topics are not `freq_ok`.
//! * **valid**: the most recent message was flagged valid by its producer.
//!
//! Time is passed in explicitly so that the checks are deterministic under
//! test and replay.

use std::collections::{HashSet, VecDeque};

use crate::bus::{MessageBus, TopicReceiver};
use crate::message::{Message, Payload, Topic};

const NANOS_PER_SEC: f64 = 1e9;
/// Alive when the last arrival is younger than this many nominal periods.
const ALIVE_PERIODS: f64 = 10.0;
const MIN_FREQ_RATIO: f64 = 0.8;
const MAX_FREQ_RATIO: f64 = 1.2;
/// Seconds of inter-arrival history used for the frequency check.
const FREQ_WINDOW_SECS: f64 = 5.0;
const MAX_FREQ_SAMPLES: usize = 100;

// ────────────────────────────────────────────────────────────────────────────
// Per-topic slot
// ────────────────────────────────────────────────────────────────────────────

struct TopicSlot {
    receiver: TopicReceiver,
    latest: Option<Message>,
    updated: bool,
    recv_frame: u64,
    recv_time_ns: Option<u64>,
    intervals_ns: VecDeque<u64>,
    alive: bool,
    freq_ok: bool,
    valid: bool,
}

impl TopicSlot {
    fn new(receiver: TopicReceiver) -> Self {
        Self {
            receiver,
            latest: None,
            updated: false,
            recv_frame: 0,
            recv_time_ns: None,
            intervals_ns: VecDeque::new(),
            alive: false,
            freq_ok: false,
            valid: true,
        }
    }

    fn window_len(freq: f64) -> usize {
        ((FREQ_WINDOW_SECS * freq) as usize).clamp(2, MAX_FREQ_SAMPLES)
    }

    fn ingest(&mut self, messages: Vec<Message>, frame: u64, now_ns: u64) {
        let freq = f64::from(self.receiver.topic().expected_frequency());
        self.updated = !messages.is_empty();
        for message in messages {
            if let Some(prev) = self.recv_time_ns {
                self.intervals_ns.push_back(now_ns.saturating_sub(prev));
                if self.intervals_ns.len() > Self::window_len(freq) {
                    self.intervals_ns.pop_front();
                }
            }
            self.recv_time_ns = Some(now_ns);
            self.recv_frame = frame;
            self.valid = message.valid;
            self.latest = Some(message);
        }

        if freq <= 0.0 {
            self.alive = self.recv_time_ns.is_some();
            self.freq_ok = true;
            return;
        }

        let period_ns = NANOS_PER_SEC / freq;
        self.alive = match self.recv_time_ns {
            Some(at) => (now_ns.saturating_sub(at) as f64) < ALIVE_PERIODS * period_ns,
            None => false,
        };
        self.freq_ok = self.alive && self.average_in_band(freq);
    }

    fn average_in_band(&self, freq: f64) -> bool {
        if self.intervals_ns.is_empty() {
            return false;
        }
        let total: u64 = self.intervals_ns.iter().sum();
        let mean_ns = total as f64 / self.intervals_ns.len() as f64;
        if mean_ns <= 0.0 {
            // A burst of same-instant arrivals says nothing about the rate.
            return true;
        }
        let avg_freq = NANOS_PER_SEC / mean_ns;
        avg_freq > freq * MIN_FREQ_RATIO && avg_freq < freq * MAX_FREQ_RATIO
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TopicMonitor
// ────────────────────────────────────────────────────────────────────────────

/// Drains a fixed set of topics once per cycle and tracks their health.
///
/// # Example
///
/// ```
/// use velos_middleware::{MessageBus, Payload, Topic, TopicMonitor};
/// use velos_types::DeviceState;
///
/// let bus = MessageBus::default();
/// let mut monitor = TopicMonitor::new(&bus, &[Topic::DeviceState]);
///
/// bus.publish_payload(Topic::DeviceState, Payload::DeviceState(DeviceState::default()), true, 0);
/// monitor.update(0);
///
/// assert!(monitor.alive(Topic::DeviceState));
/// assert!(monitor.latest(Topic::DeviceState).is_some());
/// ```
pub struct TopicMonitor {
    frame: u64,
    slots: Vec<TopicSlot>,
    ignore_alive: HashSet<Topic>,
    ignore_freq: HashSet<Topic>,
    ignore_valid: HashSet<Topic>,
}

impl TopicMonitor {
    /// Subscribe to every topic in `topics`.
    pub fn new(bus: &MessageBus, topics: &[Topic]) -> Self {
        let mut unique: Vec<Topic> = topics.to_vec();
        unique.sort();
        unique.dedup();
        Self {
            frame: 0,
            slots: unique.into_iter().map(|t| TopicSlot::new(bus.subscribe(t))).collect(),
            ignore_alive: HashSet::new(),
            ignore_freq: HashSet::new(),
            ignore_valid: HashSet::new(),
        }
    }

    /// Exclude `topics` from [`TopicMonitor::all_alive`].
    pub fn ignore_alive(mut self, topics: &[Topic]) -> Self {
        self.ignore_alive.extend(topics.iter().copied());
        self
    }

    /// Exclude `topics` from [`TopicMonitor::all_freq_ok`].
    pub fn ignore_freq(mut self, topics: &[Topic]) -> Self {
        self.ignore_freq.extend(topics.iter().copied());
        self
    }

    /// Exclude `topics` from [`TopicMonitor::all_valid`].
    pub fn ignore_valid(mut self, topics: &[Topic]) -> Self {
        self.ignore_valid.extend(topics.iter().copied());
        self
    }

    /// Drain every subscribed topic and recompute all predicates.
    pub fn update(&mut self, now_ns: u64) {
        self.frame += 1;
        for slot in &mut self.slots {
            let messages = slot.receiver.drain();
            slot.ingest(messages, self.frame, now_ns);
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn topics(&self) -> impl Iterator<Item = Topic> + '_ {
        self.slots.iter().map(|s| s.receiver.topic())
    }

    fn slot(&self, topic: Topic) -> Option<&TopicSlot> {
        self.slots.iter().find(|s| s.receiver.topic() == topic)
    }

    pub fn latest(&self, topic: Topic) -> Option<&Payload> {
        self.slot(topic).and_then(|s| s.latest.as_ref()).map(|m| &m.payload)
    }

    /// A message arrived during the most recent [`TopicMonitor::update`].
    pub fn updated(&self, topic: Topic) -> bool {
        self.slot(topic).is_some_and(|s| s.updated)
    }

    /// At least one message has ever arrived.
    pub fn seen(&self, topic: Topic) -> bool {
        self.slot(topic).is_some_and(|s| s.recv_time_ns.is_some())
    }

    pub fn recv_frame(&self, topic: Topic) -> u64 {
        self.slot(topic).map_or(0, |s| s.recv_frame)
    }

    pub fn alive(&self, topic: Topic) -> bool {
        self.slot(topic).is_some_and(|s| s.alive)
    }

    pub fn freq_ok(&self, topic: Topic) -> bool {
        self.slot(topic).is_some_and(|s| s.freq_ok)
    }

    pub fn valid(&self, topic: Topic) -> bool {
        self.slot(topic).is_some_and(|s| s.valid)
    }

    pub fn all_alive(&self) -> bool {
        self.not_alive().is_empty()
    }

    pub fn all_freq_ok(&self) -> bool {
        self.not_freq_ok().is_empty()
    }

    pub fn all_valid(&self) -> bool {
        self.invalid().is_empty()
    }

    pub fn all_checks(&self) -> bool {
        self.all_alive() && self.all_freq_ok() && self.all_valid()
    }

    pub fn not_alive(&self) -> Vec<Topic> {
        self.failing(&self.ignore_alive, |s| s.alive)
    }

    pub fn not_freq_ok(&self) -> Vec<Topic> {
        self.failing(&self.ignore_freq, |s| s.freq_ok)
    }

    pub fn invalid(&self) -> Vec<Topic> {
        self.failing(&self.ignore_valid, |s| s.valid)
    }

    fn failing(&self, ignored: &HashSet<Topic>, ok: impl Fn(&TopicSlot) -> bool) -> Vec<Topic> {
        self.slots
            .iter()
            .filter(|s| !ignored.contains(&s.receiver.topic()) && !ok(s))
            .map(|s| s.receiver.topic())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use velos_types::{DeviceState, PeripheralState};

    const MS: u64 = 1_000_000;

    fn publish_device(bus: &MessageBus, valid: bool) {
        bus.publish_payload(Topic::DeviceState, Payload::DeviceState(DeviceState::default()), valid, 0);
    }

    #[test]
    fn never_received_is_neither_alive_nor_freq_ok() {
        let bus = MessageBus::default();
        let mut monitor = TopicMonitor::new(&bus, &[Topic::DeviceState]);
        monitor.update(0);

        assert!(!monitor.seen(Topic::DeviceState));
        assert!(!monitor.alive(Topic::DeviceState));
        assert!(!monitor.freq_ok(Topic::DeviceState));
        assert_eq!(monitor.not_alive(), vec![Topic::DeviceState]);
    }

    #[test]
    fn nominal_rate_passes_all_checks() {
        let bus = MessageBus::default();
        let mut monitor = TopicMonitor::new(&bus, &[Topic::DeviceState]);

        // 2 Hz nominal: one message every 500 ms.
        for i in 0..10 {
            publish_device(&bus, true);
            monitor.update(i * 500 * MS);
        }

        assert!(monitor.alive(Topic::DeviceState));
        assert!(monitor.freq_ok(Topic::DeviceState));
        assert!(monitor.all_checks());
        assert_eq!(monitor.frame(), 10);
        assert_eq!(monitor.recv_frame(Topic::DeviceState), 10);
    }

    #[test]
    fn slow_topic_is_alive_but_not_freq_ok() {
        let bus = MessageBus::default();
        let mut monitor = TopicMonitor::new(&bus, &[Topic::DeviceState]);

        // 1 Hz against a 2 Hz nominal rate.
        for i in 0..6 {
            publish_device(&bus, true);
            monitor.update(i * 1000 * MS);
        }

        assert!(monitor.alive(Topic::DeviceState));
        assert!(!monitor.freq_ok(Topic::DeviceState));
        assert_eq!(monitor.not_freq_ok(), vec![Topic::DeviceState]);
    }

    #[test]
    fn silence_makes_topic_dead() {
        let bus = MessageBus::default();
        let mut monitor = TopicMonitor::new(&bus, &[Topic::DeviceState]);
        publish_device(&bus, true);
        monitor.update(0);
        assert!(monitor.alive(Topic::DeviceState));

        // Ten periods of a 2 Hz topic is five seconds.
        monitor.update(5_000 * MS);
        assert!(!monitor.alive(Topic::DeviceState));
        assert!(!monitor.updated(Topic::DeviceState));
    }

    #[test]
    fn invalid_flag_and_ignore_lists() {
        let bus = MessageBus::default();
        let mut monitor = TopicMonitor::new(&bus, &[Topic::DeviceState, Topic::PeripheralState])
            .ignore_alive(&[Topic::PeripheralState])
            .ignore_freq(&[Topic::PeripheralState]);

        publish_device(&bus, false);
        monitor.update(0);

        assert!(!monitor.valid(Topic::DeviceState));
        assert_eq!(monitor.invalid(), vec![Topic::DeviceState]);
        assert!(monitor.not_alive().is_empty());
        assert!(monitor.latest(Topic::PeripheralState).is_none());

        bus.publish_payload(
            Topic::PeripheralState,
            Payload::PeripheralState(PeripheralState::default()),
            true,
            0,
        );
        monitor.update(10 * MS);
        assert!(monitor.updated(Topic::PeripheralState));
    }
}

//! Simulated vehicle and device feed for running without hardware.
//!
//! Publishes the testbench car's bus traffic at 100 Hz and a healthy sample
//! of every monitored input at its nominal rate, so the cycle initializes
//! and accepts engagement.

use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;
use velos_hal::mock::{cruise_frame, speed_frame};
use velos_middleware::{MessageBus, Payload, Topic};
use velos_types::{
    CalibrationReport, CalibrationStatus, DeviceState, PeripheralState, SafetyModel, SafetyUnitState,
};

/// Base rate of the feed; every other topic is a divisor of it.
const FEED_HZ: u64 = 100;

/// Cycles between two samples of `topic`, or `None` when it is not fed.
fn period_cycles(topic: Topic) -> Option<u64> {
    let hz = match topic {
        Topic::Can => FEED_HZ,
        Topic::ModelV2
        | Topic::RadarState
        | Topic::LongitudinalPlan
        | Topic::LivePose
        | Topic::DriverMonitoring => 20,
        Topic::PandaStates => 10,
        Topic::LiveCalibration => 4,
        Topic::DeviceState | Topic::PeripheralState | Topic::ManagerState => 2,
        _ => return None,
    };
    Some(FEED_HZ / hz)
}

fn sample(topic: Topic) -> Option<Payload> {
    let payload = match topic {
        Topic::Can => Payload::Can(vec![speed_frame(0.0), cruise_frame(true, false)]),
        Topic::ModelV2 => Payload::Upstream(json!({
            "meta": { "laneChangeState": "off", "laneChangeDirection": "none", "autoLaneChangeTimer": 0.0 }
        })),
        Topic::LongitudinalPlan => Payload::Upstream(json!({ "fcw": false, "hasLead": false, "speeds": [0.0] })),
        Topic::RadarState => Payload::Upstream(json!({ "radarErrors": [] })),
        Topic::LivePose | Topic::DriverMonitoring => Payload::Upstream(json!({})),
        Topic::PandaStates => Payload::PandaStates(vec![SafetyUnitState {
            safety_model: SafetyModel::AllOutput,
            controls_allowed: true,
            ..SafetyUnitState::default()
        }]),
        Topic::LiveCalibration => Payload::LiveCalibration(CalibrationReport {
            status: CalibrationStatus::Calibrated,
            percent: 100,
        }),
        Topic::DeviceState => Payload::DeviceState(DeviceState {
            free_space_percent: 80.0,
            memory_usage_percent: 40,
            sound_available: true,
            ..DeviceState::default()
        }),
        Topic::PeripheralState => Payload::PeripheralState(PeripheralState {
            fan_speed_rpm: 2000,
            voltage_mv: 12_000,
            ..PeripheralState::default()
        }),
        Topic::ManagerState => Payload::ManagerState(Vec::new()),
        _ => return None,
    };
    Some(payload)
}

/// Publish one feed cycle. Returns the number of topics written.
fn publish_cycle(bus: &MessageBus, cycle: u64, mono_time: u64) -> usize {
    let mut written = 0;
    for topic in Topic::ALL {
        let due = period_cycles(topic).is_some_and(|every| cycle % every == 0);
        if let (true, Some(payload)) = (due, sample(topic)) {
            bus.publish_payload(topic, payload, true, mono_time);
            written += 1;
        }
    }
    written
}

/// Start the feed on the current runtime. Abort the handle to stop it.
pub fn spawn_feeder(bus: MessageBus) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = Instant::now();
        let mut ticker = tokio::time::interval(Duration::from_millis(1000 / FEED_HZ));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(rate_hz = FEED_HZ, "simulated feed started");
        let mut cycle = 0u64;
        loop {
            ticker.tick().await;
            let mono_time = start.elapsed().as_nanos() as u64;
            publish_cycle(&bus, cycle, mono_time);
            cycle += 1;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_cycle_feeds_every_topic() {
        let bus = MessageBus::default();
        assert_eq!(publish_cycle(&bus, 0, 0), 11);
    }

    #[test]
    fn slow_topics_wait_for_their_turn() {
        let bus = MessageBus::default();
        let mut device = bus.subscribe(Topic::DeviceState);
        let mut can = bus.subscribe(Topic::Can);
        for cycle in 0..100 {
            publish_cycle(&bus, cycle, cycle * 10_000_000);
        }
        assert_eq!(device.drain().len(), 2);
        assert_eq!(can.drain().len(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn feeder_publishes_until_aborted() {
        let bus = MessageBus::default();
        let mut panda = bus.subscribe(Topic::PandaStates);
        let feeder = spawn_feeder(bus.clone());
        tokio::time::sleep(Duration::from_millis(205)).await;
        feeder.abort();
        let samples = panda.drain();
        assert!(samples.len() >= 2, "got {}", samples.len());
        assert!(matches!(samples[0].payload, Payload::PandaStates(_)));
    }
}

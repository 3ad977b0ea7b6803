//! Per-node engine loop (C4) and value-change engine facade (C5),
//! `spec.md` §4.3–§4.4.
//!
//! Each [`ValueNode`] gets its own cooperative task racing a stop signal
//! against both the outbound channel send and the inter-tick wait
//! (Design Notes §9: "two suspension points inside a select-style
//! construct"). [`ValueChangeEngine::start`] spawns one such task per node
//! into a [`tokio::task::JoinSet`]; the returned [`EngineHandle`] is consumed
//! by [`EngineHandle::stop`], which signals, drains every task, and lets the
//! channel close naturally once every task's sender clone has dropped.

use std::time::Duration as StdDuration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::value_computer::make_value_computer;
use crate::waveform::{Waveform, WaveformPointValue};

/// Default capacity of the bounded outbound event channel. Small on purpose
/// (`spec.md` §5): the channel exerts backpressure on the engine loops
/// rather than buffering unboundedly.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Identity, label, and waveform of a single leaf in the namespace tree.
#[derive(Debug, Clone)]
pub struct ValueNode {
    pub id: Uuid,
    pub label: String,
    pub waveform: Waveform,
}

/// A single value-change event, produced at tick time and consumed by the
/// event sink (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct NodeValueChange {
    pub node_id: Uuid,
    pub value: WaveformPointValue,
}

/// Owns the set of spawned engine loops for one `Start`/`Stop` lifetime.
/// There is no `Start`/`Stop` state machine to enforce at runtime
/// (`spec.md` §4.4) because [`ValueChangeEngine::start`] returns a fresh
/// handle and [`EngineHandle::stop`] consumes it — Rust's ownership model
/// makes "call Start twice" or "call Stop before Start" unrepresentable
/// rather than merely documented as a contract violation (see
/// `DESIGN.md`).
pub struct EngineHandle {
    stop_tx: watch::Sender<bool>,
    tasks: JoinSet<()>,
}

impl EngineHandle {
    /// Signals cancellation and waits for every engine loop to acknowledge
    /// and release its resources before returning (`spec.md` §4.4). After
    /// this returns, no further events are emitted and the event channel
    /// closes once the caller drops its `Receiver` side reads complete.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        while self.tasks.join_next().await.is_some() {}
    }

    /// Number of engine loops currently running.
    pub fn running_count(&self) -> usize {
        self.tasks.len()
    }
}

pub struct ValueChangeEngine;

impl ValueChangeEngine {
    /// Spawns one engine loop per node that admits a [`crate::value_computer::ValueComputer`]
    /// and has a non-zero tick frequency (`spec.md` §4.3: "tick_frequency of
    /// zero is rejected at factory time"); other nodes are skipped with a
    /// warning and do not prevent the rest of the engine from starting.
    pub fn start(
        nodes: Vec<ValueNode>,
        channel_capacity: usize,
    ) -> (EngineHandle, mpsc::Receiver<NodeValueChange>) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (sink_tx, sink_rx) = mpsc::channel(channel_capacity.max(1));
        let mut tasks = JoinSet::new();

        for node in nodes {
            if node.waveform.tick_frequency_ms == 0 {
                tracing::warn!(node_id = %node.id, label = %node.label, "zero tick frequency, refusing to start loop");
                continue;
            }
            let computer = match make_value_computer(&node.waveform) {
                Some(c) => c,
                None => {
                    tracing::warn!(node_id = %node.id, label = %node.label, "no value computer for waveform, refusing to start loop");
                    continue;
                }
            };
            let tx = sink_tx.clone();
            let rx = stop_rx.clone();
            tasks.spawn(run_engine_loop(node, computer, tx, rx));
        }
        drop(sink_tx);

        (EngineHandle { stop_tx, tasks }, sink_rx)
    }
}

async fn run_engine_loop(
    node: ValueNode,
    computer: Box<dyn crate::value_computer::ValueComputer>,
    sink_tx: mpsc::Sender<NodeValueChange>,
    mut stop_rx: watch::Receiver<bool>,
) {
    tracing::debug!(node_id = %node.id, label = %node.label, "starting engine loop");

    if node.waveform.duration_ms == 0 {
        // Idle loop: nothing to tick, just wait for cancellation.
        let _ = stop_rx.changed().await;
        tracing::debug!(node_id = %node.id, label = %node.label, "engine loop done");
        return;
    }

    let tick_frequency_ms = node.waveform.tick_frequency_ms as u64;
    let tick_count = node.waveform.tick_count();
    let has_partial_final_tick = node.waveform.has_partial_final_tick();
    let remaining_ms = node.waveform.duration_ms - tick_count * tick_frequency_ms;

    loop {
        for i in 0..tick_count {
            let t = i * tick_frequency_ms;
            let value = computer.value_at(t);

            tokio::select! {
                biased;
                _ = stop_rx.changed() => {
                    tracing::debug!(node_id = %node.id, label = %node.label, "engine loop done");
                    return;
                }
                send_result = sink_tx.send(NodeValueChange { node_id: node.id, value }) => {
                    if send_result.is_err() {
                        tracing::debug!(node_id = %node.id, "attempted to push value change but event channel was closed");
                    }
                }
            }

            tokio::select! {
                biased;
                _ = stop_rx.changed() => {
                    tracing::debug!(node_id = %node.id, label = %node.label, "engine loop done");
                    return;
                }
                _ = tokio::time::sleep(StdDuration::from_millis(tick_frequency_ms)) => {}
            }
        }

        // When the cycle length isn't an exact multiple of the tick
        // frequency, one more tick fires at `tick_count * tick_frequency_ms`
        // before the remainder wait — mirroring `DelaySchedule`'s and
        // `StepComputer`'s `0..=tick_count` grid, so a waveform whose last
        // declared transition lands on that final regular multiple (e.g.
        // duration 1700 / frequency 137) is still sampled and emitted.
        if has_partial_final_tick {
            let t = tick_count * tick_frequency_ms;
            let value = computer.value_at(t);

            tokio::select! {
                biased;
                _ = stop_rx.changed() => {
                    tracing::debug!(node_id = %node.id, label = %node.label, "engine loop done");
                    return;
                }
                send_result = sink_tx.send(NodeValueChange { node_id: node.id, value }) => {
                    if send_result.is_err() {
                        tracing::debug!(node_id = %node.id, "attempted to push value change but event channel was closed");
                    }
                }
            }
        }

        tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                tracing::debug!(node_id = %node.id, label = %node.label, "engine loop done");
                return;
            }
            _ = tokio::time::sleep(StdDuration::from_millis(remaining_ms)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::{Smoothing, TransitionPoint, WaveformKind};
    use std::time::Duration;

    fn node(id: Uuid, duration_ms: u64, tick_frequency_ms: u32) -> ValueNode {
        ValueNode {
            id,
            label: "n".into(),
            waveform: Waveform::new(
                duration_ms,
                tick_frequency_ms,
                WaveformKind::NumericValues,
                vec![TransitionPoint {
                    tick: 0,
                    value: WaveformPointValue::Numeric(1.0),
                }],
                Some(Smoothing::Step),
            )
            .unwrap(),
        }
    }

    #[tokio::test]
    async fn emits_one_event_per_tick_and_stops_cleanly() {
        let id = Uuid::new_v4();
        let (handle, mut rx) = ValueChangeEngine::start(vec![node(id, 200, 50)], 16);

        let mut received = 0;
        // 4 ticks per cycle; collect at least one full cycle quickly.
        for _ in 0..4 {
            let change = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("timed out waiting for event")
                .expect("channel closed early");
            assert_eq!(change.node_id, id);
            received += 1;
        }
        assert_eq!(received, 4);

        handle.stop().await;
        // After stop, the channel must close: recv returns None once drained.
        while rx.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn skips_zero_tick_frequency_nodes() {
        let (handle, _rx) = ValueChangeEngine::start(vec![node(Uuid::new_v4(), 1000, 0)], 16);
        assert_eq!(handle.running_count(), 0);
        handle.stop().await;
    }

    #[tokio::test]
    async fn idle_loop_for_zero_duration_waits_for_cancellation() {
        let (handle, mut rx) = ValueChangeEngine::start(vec![node(Uuid::new_v4(), 0, 100)], 16);
        // No events should arrive promptly.
        let res = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(res.is_err(), "idle loop must not emit events");
        handle.stop().await;
    }

    #[tokio::test]
    async fn emits_extra_tick_when_duration_is_not_an_exact_multiple() {
        // spec.md §8 S2: duration 1700, tick_frequency 137 -> tick_count 12,
        // remainder 56ms. One cycle must emit 13 events (ticks 0..=12*137),
        // not 12 — the final regular multiple (1644) must not be dropped.
        let id = Uuid::new_v4();
        let (handle, mut rx) = ValueChangeEngine::start(vec![node(id, 1700, 137)], 32);

        let mut received = 0;
        for _ in 0..13 {
            let change = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("timed out waiting for event")
                .expect("channel closed early");
            assert_eq!(change.node_id, id);
            received += 1;
        }
        assert_eq!(received, 13);

        handle.stop().await;
        while rx.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn inter_emission_delta_matches_tick_frequency_within_tolerance() {
        // spec.md §8 testable property 6: the measured delta between
        // consecutive emissions for one node is tick_frequency ± 3ms on an
        // otherwise idle host.
        const TICK_FREQUENCY_MS: u32 = 50;
        const TOLERANCE_MS: i64 = 3;

        let id = Uuid::new_v4();
        let (handle, mut rx) = ValueChangeEngine::start(vec![node(id, 1000, TICK_FREQUENCY_MS)], 32);

        let mut last = tokio::time::Instant::now();
        for i in 0..10 {
            let _ = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("timed out waiting for event")
                .expect("channel closed early");
            let now = tokio::time::Instant::now();
            if i > 0 {
                let delta_ms = now.duration_since(last).as_millis() as i64;
                assert!(
                    (delta_ms - TICK_FREQUENCY_MS as i64).abs() <= TOLERANCE_MS,
                    "delta {delta_ms}ms outside {TICK_FREQUENCY_MS}ms +/- {TOLERANCE_MS}ms"
                );
            }
            last = now;
        }

        handle.stop().await;
        while rx.recv().await.is_some() {}
    }
}

//! A value-change engine that drives synthetic waveform values for a
//! configurable tree of simulated OPC UA data points.
//!
//! The engine (`engine`) ticks each namespace leaf (`structure`) according to
//! its waveform (`waveform`) via a pluggable value computer
//! (`value_computer`), emitting events to an event sink (`sink`). A
//! supervisor (`supervisor`) rebuilds the running engine whenever a new
//! structure tree arrives, whether read from a project file (`project`) at
//! startup or pushed live over the control channel (`control`).

pub mod config;
pub mod control;
pub mod delay_schedule;
pub mod engine;
pub mod logging;
pub mod project;
pub mod sink;
pub mod structure;
pub mod supervisor;
pub mod value_computer;
pub mod waveform;

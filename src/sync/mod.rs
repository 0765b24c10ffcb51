//! Clock synchronization between sender and receiver

pub mod clock_drift;

pub use clock_drift::ClockDriftCorrector;

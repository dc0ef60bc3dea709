// Randomized invariant harness for the conductor engine.

pub mod simulator;

pub use simulator::*;

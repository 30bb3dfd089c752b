// =============================================================================
// Signals Module
// =============================================================================
//
// Per-cycle classification of one instrument from its indicator snapshot.

pub mod classifier;

pub use classifier::classify;

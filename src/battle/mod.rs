pub mod action_stack;
pub mod ai;
pub mod calculators;
pub mod conditions;
pub mod engine;
pub mod log;
pub mod random;
pub mod reactions;
pub mod rescue;
pub mod state;
pub mod stats;
pub mod targeting;
pub mod turn_orchestrator;

#[cfg(test)]
mod tests;

// In: src/lib.rs

//! Party Battle Engine
//!
//! A deterministic turn-based battle simulator for two parties of combatants.
//! Every random draw flows through one seeded stream, so the same inputs always
//! produce the same battle log.

// --- MODULE DECLARATIONS ---
pub mod actor;
pub mod battle;
pub mod effects;
pub mod errors;
pub mod scenario;

// --- PUBLIC API RE-EXPORTS ---

// --- From the `schema` crate ---
// Reference tables and the enums they are keyed by.
pub use schema::{
    Attribute, BattleDefinitions, BuffStat, BuffTemplate, DamageType, EnemySkillDefinition,
    EnemySkillEffect, FormationRow, RowProfile, SpellDefinition, SpellEffect, SpellSchool,
    SpellTarget, StatusDefinition,
};

// --- From this crate's modules (`src/`) ---

// Core battle engine entry points and state.
pub use battle::log::{ActionKind, ActionLogEntry, BattleLog, Effect, EffectKind};
pub use battle::random::BattleRandom;
pub use battle::state::{BattleOutcome, BattleState};
pub use battle::turn_orchestrator::{run_battle, BattleReport};

// Combatant model and compiled skill effects.
pub use actor::{Actor, ActorRef, BaseAttributes, CombatSnapshot, Side};
pub use effects::{SkillCompiler, SkillEffects};
pub use scenario::{BattleConfig, Scenario, TURN_CAP};

// Crate-specific error and result types.
pub use errors::{
    BattleEngineError, BattleResult, ScenarioError, SetupError, SetupResult, SkillCompileError,
};

/// Build and resolve a battle from its parts with a fresh seeded stream.
pub fn simulate(
    players: Vec<Actor>,
    enemies: Vec<Actor>,
    definitions: BattleDefinitions,
    seed: u64,
    config: BattleConfig,
) -> SetupResult<BattleReport> {
    let state = BattleState::new(players, enemies, definitions, BattleRandom::seeded(seed), config)?;
    Ok(run_battle(state))
}

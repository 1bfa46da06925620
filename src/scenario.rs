use crate::actor::Actor;
use crate::battle::random::BattleRandom;
use crate::battle::state::BattleState;
use crate::errors::{ScenarioError, SetupError, SetupResult};
use schema::BattleDefinitions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hard ceiling on the number of turns a battle may run.
pub const TURN_CAP: u32 = 20;

/// Engine tuning knobs. Every field has a default matching the stock rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    pub max_turns: u32,
    /// Deepest reaction chain allowed to re-arm further counters.
    pub max_reaction_depth: u32,
    pub min_hit_chance: f64,
    pub max_hit_chance: f64,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            max_turns: TURN_CAP,
            max_reaction_depth: 3,
            min_hit_chance: 0.05,
            max_hit_chance: 1.0,
        }
    }
}

impl BattleConfig {
    pub fn validate(&self) -> SetupResult<()> {
        if self.max_turns == 0 || self.max_turns > TURN_CAP {
            return Err(SetupError::InvalidTurnCap(self.max_turns));
        }
        Ok(())
    }
}

/// A complete, self-contained battle description loaded from RON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub seed: u64,
    #[serde(default)]
    pub config: BattleConfig,
    pub players: Vec<Actor>,
    pub enemies: Vec<Actor>,
    #[serde(default)]
    pub definitions: BattleDefinitions,
}

impl Scenario {
    pub fn from_ron_str(text: &str) -> Result<Self, ScenarioError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    /// Build the battle, optionally overriding the stored seed.
    pub fn into_state(self, seed: Option<u64>) -> SetupResult<BattleState> {
        let rng = BattleRandom::seeded(seed.unwrap_or(self.seed));
        BattleState::new(
            self.players,
            self.enemies,
            self.definitions,
            rng,
            self.config,
        )
    }
}

use crate::actor::{ActionRates, Actor, AppliedStatus, CombatSnapshot, Side};
use crate::battle::log::{ActionKind, ActionLogEntry, BattleLog};
use crate::battle::random::BattleRandom;
use crate::battle::state::BattleState;
use crate::errors::SetupResult;
use crate::scenario::BattleConfig;
use schema::BattleDefinitions;

/// A builder for creating test combatants with common defaults.
///
/// Luck defaults to 60, which pins every stat variance draw to exactly 1.0,
/// so damage numbers in tests do not depend on the stream.
///
/// # Example
/// ```ignore
/// let knight = TestActorBuilder::new(1, Side::Player)
///     .with_attack(300)
///     .with_agility(50)
///     .build();
/// ```
pub struct TestActorBuilder {
    actor: Actor,
}

impl TestActorBuilder {
    /// Creates a builder for a 100 HP combatant that always attacks.
    pub fn new(id: u32, side: Side) -> Self {
        let mut actor = Actor::new(
            id,
            "Tester",
            side,
            0,
            CombatSnapshot {
                max_hp: 100,
                physical_attack: 10,
                hit_rate: 50,
                attack_count: 1,
                ..Default::default()
            },
        );
        actor.attributes.luck = 60;
        actor.attributes.agility = 10;
        Self { actor }
    }

    pub fn with_slot(mut self, slot: u8) -> Self {
        self.actor.slot = slot;
        self
    }

    /// Sets max HP and starts the combatant at full health.
    pub fn with_max_hp(mut self, max_hp: u32) -> Self {
        self.actor.snapshot.max_hp = max_hp;
        self.actor.current_hp = max_hp;
        self
    }

    pub fn with_attack(mut self, attack: u32) -> Self {
        self.actor.snapshot.physical_attack = attack;
        self
    }

    pub fn with_defense(mut self, defense: u32) -> Self {
        self.actor.snapshot.physical_defense = defense;
        self
    }

    pub fn with_agility(mut self, agility: i32) -> Self {
        self.actor.attributes.agility = agility;
        self
    }

    /// The combatant never picks an action other than defending.
    pub fn passive(mut self) -> Self {
        self.actor.action_rates = ActionRates {
            attack: 0.0,
            ..ActionRates::default()
        };
        self
    }

    pub fn with_status(mut self, status_id: u8, remaining_turns: u8) -> Self {
        self.actor.statuses.push(AppliedStatus {
            status_id,
            remaining_turns,
        });
        self
    }

    /// Mutate anything the builder has no shortcut for.
    pub fn with(mut self, f: impl FnOnce(&mut Actor)) -> Self {
        f(&mut self.actor);
        self
    }

    pub fn build(self) -> Actor {
        self.actor
    }
}

/// Creates a battle with a fixed mid-range stream and default tables.
pub fn create_test_battle(players: Vec<Actor>, enemies: Vec<Actor>) -> BattleState {
    battle_with(players, enemies, BattleDefinitions::new(), BattleConfig::default())
}

/// Creates a battle with the given tables and config, drawing 0.5 forever.
pub fn battle_with(
    players: Vec<Actor>,
    enemies: Vec<Actor>,
    definitions: BattleDefinitions,
    config: BattleConfig,
) -> BattleState {
    assert_ok(BattleState::new(players, enemies, definitions, predictable_rng(), config))
}

/// A config that stops the battle after `turns` turns.
pub fn turns(turns: u32) -> BattleConfig {
    BattleConfig {
        max_turns: turns,
        ..BattleConfig::default()
    }
}

/// A stream that returns 0.5 on every draw.
pub fn predictable_rng() -> BattleRandom {
    BattleRandom::fixed(0.5)
}

/// Helper function to assert that a setup Result is Ok and return the value.
pub fn assert_ok<T>(result: SetupResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("Expected Ok but got error: {}", err),
    }
}

/// Declared kinds of every entry, in log order.
pub fn entry_kinds(log: &BattleLog) -> Vec<(u32, ActionKind)> {
    log.entries
        .iter()
        .map(|e| (e.actor_id, e.declaration.kind))
        .collect()
}

pub fn entries_by(log: &BattleLog, actor_id: u32) -> Vec<&ActionLogEntry> {
    log.entries.iter().filter(|e| e.actor_id == actor_id).collect()
}

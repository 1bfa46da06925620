use crate::effects::{SkillEffects, TypedCharges};
use schema::{Attribute, BuffStat, FormationRow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Player,
    Enemy,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Player => Side::Enemy,
            Side::Enemy => Side::Player,
        }
    }
}

/// Arena handle for a combatant: which roster, and the index inside it.
///
/// Handles are resolved against the live roster on every use, so a handle to
/// an actor that has since fallen is still valid to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorRef {
    pub side: Side,
    pub index: usize,
}

impl ActorRef {
    pub fn new(side: Side, index: usize) -> Self {
        Self { side, index }
    }

    pub fn player(index: usize) -> Self {
        Self::new(Side::Player, index)
    }

    pub fn enemy(index: usize) -> Self {
        Self::new(Side::Enemy, index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BaseAttributes {
    pub strength: i32,
    pub wisdom: i32,
    pub spirit: i32,
    pub vitality: i32,
    pub agility: i32,
    pub luck: i32,
}

impl BaseAttributes {
    pub fn get(&self, attribute: Attribute) -> i32 {
        match attribute {
            Attribute::Strength => self.strength,
            Attribute::Wisdom => self.wisdom,
            Attribute::Spirit => self.spirit,
            Attribute::Vitality => self.vitality,
            Attribute::Agility => self.agility,
            Attribute::Luck => self.luck,
        }
    }
}

/// Derived combat numbers, computed before the battle and fixed for its duration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatSnapshot {
    pub max_hp: u32,
    pub physical_attack: u32,
    pub magical_attack: u32,
    pub physical_defense: u32,
    pub magical_defense: u32,
    pub hit_rate: u32,
    pub evasion_rate: u32,
    /// Percent chance of a critical hit.
    pub critical_rate: f64,
    pub attack_count: u8,
    pub magical_healing: u32,
    pub bonus_damage: u32,
    pub breath_damage: u32,
}

/// Weights fed into the action lottery. 100 or more always fires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionRates {
    pub attack: f64,
    pub priest_magic: f64,
    pub mage_magic: f64,
    pub breath: f64,
}

impl Default for ActionRates {
    fn default() -> Self {
        Self {
            attack: 100.0,
            priest_magic: 0.0,
            mage_magic: 0.0,
            breath: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedBuff {
    pub stat: BuffStat,
    pub multiplier: f64,
    pub remaining_turns: u8,
    #[serde(default)]
    pub action_delta: i8,
    /// Spell or trigger that produced the buff, for the log.
    #[serde(default)]
    pub source_id: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedStatus {
    pub status_id: u8,
    pub remaining_turns: u8,
}

/// Per-battle bookkeeping that the rules read and write.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleCounters {
    pub rescues_used: u8,
    /// The actor performed a rescue and gives up its next action this turn.
    pub rescue_pending: bool,
    pub resurrection_triggers: BTreeMap<u16, u8>,
    /// Percent of effective defense lost to accumulated hits, 0..=50.
    pub degradation: f64,
    pub vitalized: bool,
    pub sacrifice: bool,
    pub martial: bool,
    pub reaction_uses: BTreeMap<u16, u8>,
    pub enemy_skill_uses: BTreeMap<u16, u8>,
}

/// A combatant, player or enemy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    /// Composite log id: party slot for players, `(slot+1)*1000 + group` for enemies.
    pub id: u32,
    pub name: String,
    pub side: Side,
    /// Formation slot 0..=5, two per row.
    pub slot: u8,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub race: u8,
    #[serde(default)]
    pub attributes: BaseAttributes,
    pub snapshot: CombatSnapshot,
    pub current_hp: u32,
    #[serde(default)]
    pub effects: SkillEffects,
    /// Learned skill ids, the input a skill compiler rebuilds `effects` from.
    #[serde(default)]
    pub skill_ids: Vec<u16>,
    #[serde(default)]
    pub action_rates: ActionRates,
    /// Known spells and their remaining charges.
    #[serde(default)]
    pub spells: BTreeMap<u16, u8>,
    /// Enemy special skills, tried in this order.
    #[serde(default)]
    pub enemy_skills: Vec<u16>,
    #[serde(default)]
    pub buffs: Vec<TimedBuff>,
    #[serde(default)]
    pub statuses: Vec<AppliedStatus>,
    #[serde(default)]
    pub barriers: TypedCharges,
    #[serde(default)]
    pub guards: TypedCharges,
    #[serde(default)]
    pub defending: bool,
    #[serde(default)]
    pub withdrawn: bool,
    #[serde(default)]
    pub counters: BattleCounters,
}

fn default_level() -> u32 {
    1
}

impl Actor {
    pub fn new(id: u32, name: &str, side: Side, slot: u8, snapshot: CombatSnapshot) -> Self {
        let current_hp = snapshot.max_hp;
        Self {
            id,
            name: name.to_string(),
            side,
            slot,
            level: default_level(),
            race: 0,
            attributes: BaseAttributes::default(),
            snapshot,
            current_hp,
            effects: SkillEffects::default(),
            skill_ids: Vec::new(),
            action_rates: ActionRates::default(),
            spells: BTreeMap::new(),
            enemy_skills: Vec::new(),
            buffs: Vec::new(),
            statuses: Vec::new(),
            barriers: TypedCharges::default(),
            guards: TypedCharges::default(),
            defending: false,
            withdrawn: false,
            counters: BattleCounters::default(),
        }
    }

    /// Composite id for an enemy placed in `slot` from master group `group`.
    pub fn enemy_id(slot: u8, group: u32) -> u32 {
        (slot as u32 + 1) * 1000 + group
    }

    pub fn is_alive(&self) -> bool {
        self.current_hp > 0
    }

    /// Alive and still on the field.
    pub fn is_active(&self) -> bool {
        self.is_alive() && !self.withdrawn
    }

    pub fn row(&self) -> FormationRow {
        FormationRow::from_slot(self.slot)
    }

    pub fn hp_percent(&self) -> f64 {
        if self.snapshot.max_hp == 0 {
            return 0.0;
        }
        self.current_hp as f64 * 100.0 / self.snapshot.max_hp as f64
    }

    /// Apply damage, clamping at zero. Returns true if this blow defeated the actor.
    pub fn take_damage(&mut self, amount: u32) -> bool {
        let was_alive = self.is_alive();
        self.current_hp = self.current_hp.saturating_sub(amount);
        was_alive && !self.is_alive()
    }

    /// Restore HP up to the maximum. Returns the amount actually restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let before = self.current_hp;
        self.current_hp = self
            .current_hp
            .saturating_add(amount)
            .min(self.snapshot.max_hp);
        self.current_hp - before
    }

    pub fn has_status(&self, status_id: u8) -> bool {
        self.statuses.iter().any(|s| s.status_id == status_id)
    }

    /// Product of every active buff on the given stat.
    pub fn buff_multiplier(&self, stat: BuffStat) -> f64 {
        self.buffs
            .iter()
            .filter(|b| b.stat == stat)
            .map(|b| b.multiplier)
            .product()
    }

    pub fn buff_action_delta(&self) -> i32 {
        self.buffs.iter().map(|b| b.action_delta as i32).sum()
    }

    pub fn spell_charges(&self, spell_id: u16) -> u8 {
        self.spells.get(&spell_id).copied().unwrap_or(0)
    }

    /// Spend one charge of a spell. Returns false if none remain.
    pub fn consume_spell_charge(&mut self, spell_id: u16) -> bool {
        match self.spells.get_mut(&spell_id) {
            Some(charges) if *charges > 0 => {
                *charges -= 1;
                true
            }
            _ => false,
        }
    }

    /// Load externally compiled charge counters onto a freshly built actor.
    pub fn arm_starting_charges(&mut self) {
        self.barriers = self.effects.combat.starting_barriers;
        self.guards = self.effects.combat.guard_charges;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fighter() -> Actor {
        Actor::new(
            1,
            "Fighter",
            Side::Player,
            0,
            CombatSnapshot {
                max_hp: 40,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_enemy_composite_ids() {
        assert_eq!(Actor::enemy_id(0, 3), 1003);
        assert_eq!(Actor::enemy_id(4, 12), 5012);
    }

    #[test]
    fn test_hp_stays_in_bounds() {
        let mut actor = fighter();
        assert!(!actor.take_damage(10));
        assert_eq!(actor.current_hp, 30);
        assert_eq!(actor.heal(100), 10);
        assert_eq!(actor.current_hp, 40);
        assert!(actor.take_damage(1000));
        assert_eq!(actor.current_hp, 0);
        // A second blow on a fallen actor is not a new defeat.
        assert!(!actor.take_damage(5));
    }

    #[test]
    fn test_buff_multipliers_compose() {
        let mut actor = fighter();
        assert_eq!(actor.buff_multiplier(BuffStat::PhysicalAttack), 1.0);
        for multiplier in [1.5, 2.0] {
            actor.buffs.push(TimedBuff {
                stat: BuffStat::PhysicalAttack,
                multiplier,
                remaining_turns: 2,
                action_delta: 0,
                source_id: None,
            });
        }
        assert_eq!(actor.buff_multiplier(BuffStat::PhysicalAttack), 3.0);
        assert_eq!(actor.buff_multiplier(BuffStat::Agility), 1.0);
    }

    #[test]
    fn test_spell_charges_run_out() {
        let mut actor = fighter();
        actor.spells.insert(10, 1);
        assert!(actor.consume_spell_charge(10));
        assert!(!actor.consume_spell_charge(10));
        assert!(!actor.consume_spell_charge(11));
    }
}

//! The aggregate modifier table each combatant brings into battle.
//!
//! Learned skills, equipment and titles are compiled into a `SkillEffects`
//! value outside the engine. The engine only reads it, except when a
//! "vitalize" revival asks a [`SkillCompiler`] for a replacement.

use crate::errors::SkillCompileError;
use crate::actor::BaseAttributes;
use schema::{Attribute, BuffTemplate, DamageType, RowProfile, SpellSchool};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn one() -> f64 {
    1.0
}

fn half() -> f64 {
    0.5
}

/// One multiplier per damage type, neutral at 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TypedMultipliers {
    #[serde(default = "one")]
    pub physical: f64,
    #[serde(default = "one")]
    pub magical: f64,
    #[serde(default = "one")]
    pub breath: f64,
}

impl Default for TypedMultipliers {
    fn default() -> Self {
        Self {
            physical: 1.0,
            magical: 1.0,
            breath: 1.0,
        }
    }
}

impl TypedMultipliers {
    pub fn get(&self, damage_type: DamageType) -> f64 {
        match damage_type {
            DamageType::Physical => self.physical,
            DamageType::Magical => self.magical,
            DamageType::Breath => self.breath,
        }
    }
}

/// One charge count per damage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypedCharges {
    #[serde(default)]
    pub physical: u32,
    #[serde(default)]
    pub magical: u32,
    #[serde(default)]
    pub breath: u32,
}

impl TypedCharges {
    pub fn get(&self, damage_type: DamageType) -> u32 {
        match damage_type {
            DamageType::Physical => self.physical,
            DamageType::Magical => self.magical,
            DamageType::Breath => self.breath,
        }
    }

    pub fn get_mut(&mut self, damage_type: DamageType) -> &mut u32 {
        match damage_type {
            DamageType::Physical => &mut self.physical,
            DamageType::Magical => &mut self.magical,
            DamageType::Breath => &mut self.breath,
        }
    }

    /// Spend one charge of the given type. Returns false when none remain.
    pub fn consume(&mut self, damage_type: DamageType) -> bool {
        let charges = self.get_mut(damage_type);
        if *charges == 0 {
            return false;
        }
        *charges -= 1;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HpThresholdModifier {
    /// Applies while the attacker's HP percent is at or below this value.
    pub hp_below_percent: f64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchoolMultipliers {
    #[serde(default = "one")]
    pub priest: f64,
    #[serde(default = "one")]
    pub mage: f64,
}

impl Default for SchoolMultipliers {
    fn default() -> Self {
        Self {
            priest: 1.0,
            mage: 1.0,
        }
    }
}

impl SchoolMultipliers {
    pub fn get(&self, school: SpellSchool) -> f64 {
        match school {
            SpellSchool::Priest => self.priest,
            SpellSchool::Mage => self.mage,
        }
    }
}

/// Modifiers that feed the damage, critical and healing formulas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageModifiers {
    pub dealt: TypedMultipliers,
    pub taken: TypedMultipliers,
    /// Dealt multiplier keyed by the defender's race id.
    pub race_dealt: BTreeMap<u8, f64>,
    pub hp_threshold_dealt: Vec<HpThresholdModifier>,
    /// Zero means "use the engine default".
    pub critical_multiplier: f64,
    pub critical_bonus_percent: f64,
    pub critical_taken: f64,
    /// Innate resistance to critical hits, multiplies the critical bonus.
    pub critical_resistance: f64,
    /// Innate resistance multiplier per damage type.
    pub resistance: TypedMultipliers,
    pub spell_resistance: BTreeMap<u16, f64>,
    pub magic_nullify_percent: f64,
    pub magic_critical: bool,
    pub cumulative_hit_bonus_percent: f64,
    pub absorb_percent: f64,
    pub healing_dealt: f64,
    pub healing_received: f64,
    pub spell_power: SchoolMultipliers,
    pub level_difference_scaling: bool,
    pub martial_multiplier: f64,
}

impl Default for DamageModifiers {
    fn default() -> Self {
        Self {
            dealt: TypedMultipliers::default(),
            taken: TypedMultipliers::default(),
            race_dealt: BTreeMap::new(),
            hp_threshold_dealt: Vec::new(),
            critical_multiplier: 0.0,
            critical_bonus_percent: 0.0,
            critical_taken: 1.0,
            critical_resistance: 1.0,
            resistance: TypedMultipliers::default(),
            spell_resistance: BTreeMap::new(),
            magic_nullify_percent: 0.0,
            magic_critical: false,
            cumulative_hit_bonus_percent: 0.0,
            absorb_percent: 0.0,
            healing_dealt: 1.0,
            healing_received: 1.0,
            spell_power: SchoolMultipliers::default(),
            level_difference_scaling: false,
            martial_multiplier: 1.0,
        }
    }
}

/// A special attack rolled once before the first turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreEmptiveAttack {
    pub id: u16,
    pub chance: f64,
    #[serde(default = "one")]
    pub attack_count_multiplier: f64,
    #[serde(default = "one")]
    pub damage_multiplier: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtraActionTrigger {
    Always,
    BattleStartOnly,
    AfterTurn(u32),
}

/// A skill-granted chance to act again right after a successful action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraActionGrant {
    pub chance: f64,
    pub trigger: ExtraActionTrigger,
    /// Last turn on which the grant can fire.
    #[serde(default)]
    pub until_turn: Option<u32>,
}

impl ExtraActionGrant {
    pub fn is_active(&self, turn: u32) -> bool {
        let triggered = match self.trigger {
            ExtraActionTrigger::Always => true,
            ExtraActionTrigger::BattleStartOnly => turn <= 1,
            ExtraActionTrigger::AfterTurn(after) => turn > after,
        };
        triggered && self.until_turn.map_or(true, |limit| turn <= limit)
    }
}

/// Conditions that can arm a reaction. Matched exhaustively against
/// [`crate::battle::reactions::ReactionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReactionTrigger {
    SelfDamagedPhysical,
    SelfDamagedMagical,
    SelfDamagedAny,
    SelfEvaded,
    AllyDamagedPhysical,
    AllyDefeated,
    SelfKilledEnemy,
    SelfCastOffensiveSpell,
    AllyCastOffensiveSpell,
    AttackedWithoutKill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReactionMode {
    Physical,
    Spell(u16),
    Breath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReactionTarget {
    #[default]
    TriggeringActor,
    RandomOpponent,
}

/// A counter, retaliation or follow-up granted by a skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionSkill {
    pub id: u16,
    pub trigger: ReactionTrigger,
    #[serde(default)]
    pub base_chance: f64,
    /// Adds `attribute * chance_scale` percent to the base chance.
    #[serde(default)]
    pub chance_attribute: Option<Attribute>,
    #[serde(default)]
    pub chance_scale: f64,
    pub mode: ReactionMode,
    #[serde(default)]
    pub target: ReactionTarget,
    #[serde(default = "one")]
    pub attack_count_multiplier: f64,
    #[serde(default = "one")]
    pub critical_rate_multiplier: f64,
    #[serde(default = "one")]
    pub accuracy_multiplier: f64,
    #[serde(default = "one")]
    pub damage_multiplier: f64,
    #[serde(default)]
    pub uses_per_battle: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusInfliction {
    pub status_id: u8,
    pub chance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForcedRetreat {
    pub from_turn: u32,
    pub chance: f64,
}

/// A buff that switches on at the start of a given turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffTrigger {
    pub turn: u32,
    pub buff: BuffTemplate,
    #[serde(default)]
    pub party_wide: bool,
}

/// Modifiers for turn order, action choice, reactions and the like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatModifiers {
    pub row_profile: RowProfile,
    pub row_aptitude: bool,
    pub order_multiplier: f64,
    pub order_shuffle: bool,
    pub first_strike: bool,
    pub next_turn_extra_actions: i8,
    pub hit_multiplier: f64,
    pub evasion_limit_percent: Option<f64>,
    pub dodge_cap_percent: Option<f64>,
    pub pre_emptive: Vec<PreEmptiveAttack>,
    pub berserk_percent: f64,
    pub vampiric_impulse_percent: f64,
    pub extra_actions: Vec<ExtraActionGrant>,
    pub reactions: Vec<ReactionSkill>,
    pub proc_multiplier: f64,
    pub reaction_evasion_multiplier: f64,
    pub cover_percent: f64,
    pub targeting_weight: f64,
    pub sacrifice_interval: Option<u32>,
    /// Physical hits take the martial multiplier on every n-th turn.
    pub martial_interval: Option<u32>,
    pub forced_retreat: Option<ForcedRetreat>,
    /// Barrier charges loaded onto the actor when the battle is built.
    pub starting_barriers: TypedCharges,
    /// Guard charges loaded at build time; spent before barrier charges.
    pub guard_charges: TypedCharges,
    pub degradation_repair: f64,
    pub on_hit_statuses: Vec<StatusInfliction>,
    /// Multiplier on the chance of each status landing; 0 means immune.
    pub status_resistance: BTreeMap<u8, f64>,
    pub regeneration_percent: f64,
    pub buff_triggers: Vec<BuffTrigger>,
}

impl Default for CombatModifiers {
    fn default() -> Self {
        Self {
            row_profile: RowProfile::Near,
            row_aptitude: false,
            order_multiplier: 1.0,
            order_shuffle: false,
            first_strike: false,
            next_turn_extra_actions: 0,
            hit_multiplier: 1.0,
            evasion_limit_percent: None,
            dodge_cap_percent: None,
            pre_emptive: Vec::new(),
            berserk_percent: 0.0,
            vampiric_impulse_percent: 0.0,
            extra_actions: Vec::new(),
            reactions: Vec::new(),
            proc_multiplier: 1.0,
            reaction_evasion_multiplier: 1.0,
            cover_percent: 0.0,
            targeting_weight: 1.0,
            sacrifice_interval: None,
            martial_interval: None,
            forced_retreat: None,
            starting_barriers: TypedCharges::default(),
            guard_charges: TypedCharges::default(),
            degradation_repair: half(),
            on_hit_statuses: Vec::new(),
            status_resistance: BTreeMap::new(),
            regeneration_percent: 0.0,
            buff_triggers: Vec::new(),
        }
    }
}

/// Ability to revive a fallen ally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescueCapability {
    pub per_turn: u8,
    #[serde(default)]
    pub guaranteed: bool,
    #[serde(default)]
    pub base_chance: f64,
    /// Percent of chance added per point of the rescuer's healing score.
    #[serde(default)]
    pub healing_scale: f64,
    /// Healing spell whose charge is spent to decide the restored HP.
    #[serde(default)]
    pub heal_spell: Option<u16>,
    /// Fraction of max HP restored when no heal spell is spent.
    #[serde(default = "half")]
    pub hp_fraction: f64,
}

/// Rewrites the reviver's skill set the first time it revives.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Vitalize {
    #[serde(default)]
    pub add: Vec<u16>,
    #[serde(default)]
    pub remove: Vec<u16>,
}

/// A passive chance to stand back up after being defeated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResurrectionSkill {
    pub id: u16,
    pub chance: f64,
    pub max_triggers: u8,
    /// Fraction of max HP restored.
    pub hp_fraction: f64,
    #[serde(default)]
    pub vitalize: Option<Vitalize>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RevivalModifiers {
    pub rescue: Option<RescueCapability>,
    pub resurrections: Vec<ResurrectionSkill>,
}

/// Everything learned skills, equipment and titles contribute to one combatant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillEffects {
    pub damage: DamageModifiers,
    pub combat: CombatModifiers,
    pub revival: RevivalModifiers,
}

/// Collaborator that turns a skill-id set into an aggregate modifier table.
///
/// Only invoked mid-battle by a vitalize revival.
pub trait SkillCompiler {
    fn compile(
        &self,
        attributes: &BaseAttributes,
        skill_ids: &[u16],
    ) -> Result<SkillEffects, SkillCompileError>;
}

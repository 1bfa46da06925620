use crate::{BuffStat, SpellSchool};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A status effect as authored in the design data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDefinition {
    pub id: u8,
    pub name: String,
    /// Turns the status lasts once applied.
    pub duration: u8,
    /// The bearer skips its turns while this is active (sleep, paralysis, petrify).
    #[serde(default)]
    pub locks_action: bool,
    /// The bearer attacks a random combatant instead of choosing.
    #[serde(default)]
    pub confuses: bool,
    /// Percent of max HP lost at end of turn.
    #[serde(default)]
    pub tick_damage_percent: f64,
    /// Change to the bearer's action slots per turn (negative for slow).
    #[serde(default)]
    pub action_delta: i8,
    /// Taking damage clears the status (sleep).
    #[serde(default)]
    pub wears_off_on_damage: bool,
    /// Percent chance per end of turn to recover early.
    #[serde(default)]
    pub recovery_chance: f64,
}

impl fmt::Display for StatusDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.name, self.id)
    }
}

/// A temporary stat multiplier, either granted by a spell or by a turn trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffTemplate {
    pub stat: BuffStat,
    pub multiplier: f64,
    pub duration: u8,
    #[serde(default)]
    pub action_delta: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellTarget {
    Single,
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpellEffect {
    Damage { power: f64, target: SpellTarget },
    Heal { power: f64, target: SpellTarget },
    Status { status_id: u8, chance: f64, target: SpellTarget },
    Buff { buff: BuffTemplate },
}

/// A priest or mage spell. Casting consumes one charge of the spell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellDefinition {
    pub id: u16,
    pub name: String,
    pub school: SpellSchool,
    pub effect: SpellEffect,
}

impl SpellDefinition {
    /// Whether the spell is aimed at the opposing side.
    pub fn is_offensive(&self) -> bool {
        matches!(
            self.effect,
            SpellEffect::Damage { .. } | SpellEffect::Status { .. }
        )
    }

    pub fn is_healing(&self) -> bool {
        matches!(self.effect, SpellEffect::Heal { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EnemySkillEffect {
    Physical { multiplier: f64, hits: u8 },
    Magical { power: f64 },
    Breath { power: f64 },
    Status { status_id: u8, chance: f64 },
    SelfHeal { percent: f64 },
    Buff { buff: BuffTemplate },
}

/// An enemy-only special action, tried before the normal action lottery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySkillDefinition {
    pub id: u16,
    pub name: String,
    /// Percent chance the skill is chosen when its preconditions hold.
    pub chance: f64,
    #[serde(default)]
    pub uses_per_battle: Option<u8>,
    /// Only usable while the user's HP percent is at or below this value.
    #[serde(default)]
    pub hp_below_percent: Option<f64>,
    #[serde(default)]
    pub target_all: bool,
    pub effect: EnemySkillEffect,
}

impl EnemySkillDefinition {
    pub fn is_offensive(&self) -> bool {
        !matches!(
            self.effect,
            EnemySkillEffect::SelfHeal { .. } | EnemySkillEffect::Buff { .. }
        )
    }
}

/// Read-only reference tables consulted during a battle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattleDefinitions {
    #[serde(default)]
    pub statuses: BTreeMap<u8, StatusDefinition>,
    #[serde(default)]
    pub spells: BTreeMap<u16, SpellDefinition>,
    #[serde(default)]
    pub enemy_skills: BTreeMap<u16, EnemySkillDefinition>,
}

impl BattleDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: StatusDefinition) -> Self {
        self.statuses.insert(status.id, status);
        self
    }

    pub fn with_spell(mut self, spell: SpellDefinition) -> Self {
        self.spells.insert(spell.id, spell);
        self
    }

    pub fn with_enemy_skill(mut self, skill: EnemySkillDefinition) -> Self {
        self.enemy_skills.insert(skill.id, skill);
        self
    }

    pub fn status(&self, id: u8) -> Option<&StatusDefinition> {
        self.statuses.get(&id)
    }

    pub fn spell(&self, id: u16) -> Option<&SpellDefinition> {
        self.spells.get(&id)
    }

    pub fn enemy_skill(&self, id: u16) -> Option<&EnemySkillDefinition> {
        self.enemy_skills.get(&id)
    }

    /// Encode the tables into the compact binary form shipped with builds.
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleep() -> StatusDefinition {
        StatusDefinition {
            id: 3,
            name: "Sleep".to_string(),
            duration: 2,
            locks_action: true,
            confuses: false,
            tick_damage_percent: 0.0,
            action_delta: 0,
            wears_off_on_damage: true,
            recovery_chance: 25.0,
        }
    }

    #[test]
    fn test_lookup_by_id() {
        let defs = BattleDefinitions::new().with_status(sleep());
        assert_eq!(defs.status(3).map(|s| s.name.as_str()), Some("Sleep"));
        assert!(defs.status(4).is_none());
        assert!(defs.spell(1).is_none());
    }

    #[test]
    fn test_binary_tables_survive_encoding() {
        let defs = BattleDefinitions::new()
            .with_status(sleep())
            .with_spell(SpellDefinition {
                id: 10,
                name: "Fire Bolt".to_string(),
                school: SpellSchool::Mage,
                effect: SpellEffect::Damage {
                    power: 1.2,
                    target: SpellTarget::Single,
                },
            });
        let bytes = defs.to_bytes().expect("definitions should encode");
        let decoded = BattleDefinitions::from_bytes(&bytes).expect("definitions should decode");
        assert_eq!(decoded, defs);
    }

    #[test]
    fn test_status_flags_default_when_omitted_from_ron() {
        let text = r#"(id: 7, name: "Poison", duration: 3, tick_damage_percent: 5.0)"#;
        let parsed: StatusDefinition = ron::from_str(text).expect("status should parse");
        assert!(!parsed.locks_action);
        assert_eq!(parsed.tick_damage_percent, 5.0);
        assert_eq!(parsed.recovery_chance, 0.0);
    }

    #[test]
    fn test_offensive_classification() {
        let heal = SpellDefinition {
            id: 1,
            name: "Cure".to_string(),
            school: SpellSchool::Priest,
            effect: SpellEffect::Heal {
                power: 1.0,
                target: SpellTarget::Single,
            },
        };
        assert!(!heal.is_offensive());
        assert!(heal.is_healing());

        let breath = EnemySkillDefinition {
            id: 21,
            name: "Flame Breath".to_string(),
            chance: 30.0,
            uses_per_battle: None,
            hp_below_percent: None,
            target_all: true,
            effect: EnemySkillEffect::Breath { power: 1.5 },
        };
        assert!(breath.is_offensive());
    }
}

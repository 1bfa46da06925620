//! The structured battle record handed to replay and analytics consumers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What an acting unit declared for its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    EnemyAppear,
    PreEmptive,
    PhysicalAttack,
    PriestMagic,
    MageMagic,
    Breath,
    EnemySpecial,
    Defend,
    Reaction,
    StatusLocked,
    Withdraw,
    Sacrifice,
    BuffTrigger,
    EndOfTurn,
    Victory,
    Defeat,
    Retreat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    PhysicalDamage,
    MagicalDamage,
    BreathDamage,
    Miss,
    Critical,
    Nullified,
    Heal,
    Absorb,
    Covered,
    Defeated,
    Revived,
    Vitalized,
    Rescued,
    StatusApplied,
    StatusResisted,
    StatusDamage,
    StatusRecovered,
    StatusExpired,
    ActionLocked,
    BarrierConsumed,
    GuardConsumed,
    Defending,
    BuffApplied,
    BuffExpired,
    Regenerated,
    Withdrew,
    SacrificeMarked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub kind: ActionKind,
    pub skill_id: Option<u16>,
    pub extra: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub kind: EffectKind,
    pub target: Option<u32>,
    pub value: Option<i64>,
    pub status_id: Option<u8>,
    pub extra: Option<String>,
}

impl Effect {
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            target: None,
            value: None,
            status_id: None,
            extra: None,
        }
    }

    pub fn on(mut self, target: u32) -> Self {
        self.target = Some(target);
        self
    }

    pub fn value(mut self, value: impl Into<i64>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn status(mut self, status_id: u8) -> Self {
        self.status_id = Some(status_id);
        self
    }

    pub fn extra(mut self, tag: &str) -> Self {
        self.extra = Some(tag.to_string());
        self
    }
}

/// One acting unit's turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub actor_id: u32,
    pub turn: u32,
    pub declaration: Declaration,
    pub effects: Vec<Effect>,
}

impl ActionLogEntry {
    pub fn count(&self, kind: EffectKind) -> usize {
        self.effects.iter().filter(|e| e.kind == kind).count()
    }
}

/// Accumulates effects for an entry while an action resolves.
#[derive(Debug, Clone)]
pub struct ActionEntryBuilder {
    entry: ActionLogEntry,
}

impl ActionEntryBuilder {
    pub fn new(actor_id: u32, turn: u32, kind: ActionKind) -> Self {
        Self {
            entry: ActionLogEntry {
                actor_id,
                turn,
                declaration: Declaration {
                    kind,
                    skill_id: None,
                    extra: None,
                },
                effects: Vec::new(),
            },
        }
    }

    pub fn skill(mut self, skill_id: u16) -> Self {
        self.entry.declaration.skill_id = Some(skill_id);
        self
    }

    pub fn set_tag(&mut self, tag: &str) {
        self.entry.declaration.extra = Some(tag.to_string());
    }

    /// Overwrite the declared kind once the resolving category is known.
    pub fn declare(&mut self, kind: ActionKind, skill_id: Option<u16>) {
        self.entry.declaration.kind = kind;
        self.entry.declaration.skill_id = skill_id;
    }

    pub fn push(&mut self, effect: Effect) {
        self.entry.effects.push(effect);
    }

    pub fn is_empty(&self) -> bool {
        self.entry.effects.is_empty()
    }

    pub fn build(self) -> ActionLogEntry {
        self.entry
    }
}

/// The sole externally visible record of a battle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BattleLog {
    /// Starting HP keyed by composite actor id.
    pub initial_hp: BTreeMap<u32, u32>,
    pub entries: Vec<ActionLogEntry>,
    pub total_turns: u32,
}

impl BattleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ActionLogEntry) {
        self.entries.push(entry);
    }

    /// Canonical byte form. Two runs are identical iff these bytes are.
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn effects(&self) -> impl Iterator<Item = &Effect> {
        self.entries.iter().flat_map(|e| e.effects.iter())
    }

    pub fn count_effects(&self, kind: EffectKind) -> usize {
        self.effects().filter(|e| e.kind == kind).count()
    }

    pub fn entries_of(&self, kind: ActionKind) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries
            .iter()
            .filter(move |e| e.declaration.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builder_collects_effects_in_order() {
        let mut builder = ActionEntryBuilder::new(1, 3, ActionKind::PhysicalAttack);
        builder.set_tag("berserk");
        builder.push(Effect::new(EffectKind::PhysicalDamage).on(1001).value(42));
        builder.push(Effect::new(EffectKind::Defeated).on(1001));
        let entry = builder.build();

        assert_eq!(entry.declaration.extra.as_deref(), Some("berserk"));
        assert_eq!(
            entry.effects.iter().map(|e| e.kind).collect::<Vec<_>>(),
            vec![EffectKind::PhysicalDamage, EffectKind::Defeated]
        );
        assert_eq!(entry.effects[0].value, Some(42));
        assert_eq!(entry.count(EffectKind::PhysicalDamage), 1);
    }

    #[test]
    fn test_log_bytes_change_with_content() {
        let mut log = BattleLog::new();
        log.initial_hp.insert(1, 30);
        let before = log.to_bytes().expect("log should encode");
        log.push(ActionEntryBuilder::new(1, 1, ActionKind::Defend).build());
        let after = log.to_bytes().expect("log should encode");
        assert_ne!(before, after);
        let decoded: BattleLog = postcard::from_bytes(&after).expect("log should decode");
        assert_eq!(decoded, log);
    }
}

//! Action selection: enemy specials, then the rate lottery.

use crate::actor::{Actor, ActorRef, Side};
use crate::battle::state::BattleState;
use schema::{EnemySkillDefinition, EnemySkillEffect, SpellEffect, SpellSchool};
use tracing::debug;

/// HP percent below which a wounded ally makes a heal spell the first pick.
const HEAL_THRESHOLD_PERCENT: f64 = 50.0;

/// A category of action the executor can attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    Breath,
    PriestMagic(u16),
    MageMagic(u16),
    Attack,
    EnemySpecial(u16),
    Defend,
}

/// Whether an enemy special's preconditions hold for `user` right now.
pub fn special_ready(state: &BattleState, user: &Actor, skill: &EnemySkillDefinition) -> bool {
    let used = user.counters.enemy_skill_uses.get(&skill.id).copied().unwrap_or(0);
    if skill.uses_per_battle.is_some_and(|limit| used >= limit) {
        return false;
    }
    if skill
        .hp_below_percent
        .is_some_and(|threshold| user.hp_percent() > threshold)
    {
        return false;
    }
    match skill.effect {
        EnemySkillEffect::SelfHeal { .. } => user.current_hp < user.snapshot.max_hp,
        EnemySkillEffect::Buff { .. } => true,
        _ => !state.active(user.side.opponent()).is_empty(),
    }
}

/// Best castable spell of a school: a heal when an ally is badly hurt, then
/// the first offensive spell, then a buff the caster does not already carry.
pub fn spell_for(state: &BattleState, caster: ActorRef, school: SpellSchool) -> Option<u16> {
    let actor = state.actor(caster)?;
    let ally_in_danger = state
        .active(caster.side)
        .iter()
        .filter_map(|r| state.actor(*r))
        .any(|a| a.hp_percent() < HEAL_THRESHOLD_PERCENT);
    let opponents_standing = !state.active(caster.side.opponent()).is_empty();

    let mut offensive = None;
    let mut buff = None;
    for (&id, &charges) in &actor.spells {
        if charges == 0 {
            continue;
        }
        let Some(spell) = state.definitions.spell(id) else { continue };
        if spell.school != school {
            continue;
        }
        match &spell.effect {
            SpellEffect::Heal { .. } if ally_in_danger => return Some(id),
            SpellEffect::Damage { .. } | SpellEffect::Status { .. } if opponents_standing => {
                offensive.get_or_insert(id);
            }
            SpellEffect::Buff { buff: template }
                if !actor.buffs.iter().any(|b| b.stat == template.stat) =>
            {
                buff.get_or_insert(id);
            }
            _ => {}
        }
    }
    offensive.or(buff)
}

/// Lottery candidates in fixed priority order: breath, priest, mage, attack.
fn lottery_candidates(state: &BattleState, actor_ref: ActorRef) -> Vec<(ActionCategory, f64)> {
    let Some(actor) = state.actor(actor_ref) else { return Vec::new() };
    let rates = actor.action_rates;
    let opponents_standing = !state.active(actor_ref.side.opponent()).is_empty();
    let mut candidates = Vec::new();

    if rates.breath > 0.0 && actor.snapshot.breath_damage > 0 && opponents_standing {
        candidates.push((ActionCategory::Breath, rates.breath));
    }
    if rates.priest_magic > 0.0 {
        if let Some(id) = spell_for(state, actor_ref, SpellSchool::Priest) {
            candidates.push((ActionCategory::PriestMagic(id), rates.priest_magic));
        }
    }
    if rates.mage_magic > 0.0 {
        if let Some(id) = spell_for(state, actor_ref, SpellSchool::Mage) {
            candidates.push((ActionCategory::MageMagic(id), rates.mage_magic));
        }
    }
    if rates.attack > 0.0 && opponents_standing {
        candidates.push((ActionCategory::Attack, rates.attack));
    }
    candidates
}

/// Decide what an actor tries this action, in the order to attempt them.
///
/// The list always ends with `Defend`, which always resolves.
pub fn select_actions(state: &mut BattleState, actor_ref: ActorRef) -> Vec<ActionCategory> {
    let Some(actor) = state.snapshot(actor_ref) else { return vec![ActionCategory::Defend] };

    // 1. Enemy specials, first passing skill wins.
    if actor_ref.side == Side::Enemy {
        for &skill_id in &actor.enemy_skills {
            let Some(skill) = state.definitions.enemy_skill(skill_id) else { continue };
            if !special_ready(state, &actor, skill) {
                continue;
            }
            let chance = skill.chance;
            if state.rng.percent_chance(chance) {
                debug!(actor = actor.id, skill = skill_id, "enemy special selected");
                return vec![ActionCategory::EnemySpecial(skill_id), ActionCategory::Defend];
            }
        }
    }

    // 2. Rate lottery. The first hit plus everything after it become the plan.
    let candidates = lottery_candidates(state, actor_ref);
    for (position, (category, weight)) in candidates.iter().enumerate() {
        let fires = *weight >= 100.0 || state.rng.roll_percent() as f64 <= *weight;
        if fires {
            let mut plan: Vec<ActionCategory> =
                candidates[position..].iter().map(|(c, _)| *c).collect();
            plan.push(ActionCategory::Defend);
            debug!(actor = actor.id, ?category, "action selected");
            return plan;
        }
    }
    vec![ActionCategory::Defend]
}

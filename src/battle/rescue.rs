//! Revival of fallen combatants: the victim's own resurrection skills first,
//! then rescue attempts by standing allies.

use crate::actor::{Actor, ActorRef};
use crate::battle::calculators::healing_amount;
use crate::battle::conditions::action_lock;
use crate::battle::log::{ActionEntryBuilder, Effect, EffectKind};
use crate::battle::state::BattleState;
use crate::effects::{TypedCharges, Vitalize};
use schema::SpellEffect;
use tracing::{debug, warn};

/// Log a defeat and give the victim every chance to get back up.
///
/// Returns true if the victim is standing again.
pub fn handle_defeat(state: &mut BattleState, victim: ActorRef, entry: &mut ActionEntryBuilder) -> bool {
    let Some(actor) = state.actor(victim) else { return false };
    if actor.is_alive() {
        return true;
    }
    entry.push(Effect::new(EffectKind::Defeated).on(actor.id));
    debug!(?victim, "actor defeated");

    try_resurrection(state, victim, entry) || try_rescue(state, victim, entry)
}

fn restore(actor: &mut Actor, hp: u32) {
    actor.current_hp = hp.clamp(1, actor.snapshot.max_hp.max(1));
    actor.statuses.clear();
    actor.defending = false;
}

/// Roll the victim's own resurrection skills in order; the first success wins.
fn try_resurrection(state: &mut BattleState, victim: ActorRef, entry: &mut ActionEntryBuilder) -> bool {
    let Some(mut actor) = state.snapshot(victim) else { return false };
    let skills = actor.effects.revival.resurrections.clone();
    for skill in skills {
        let used = actor
            .counters
            .resurrection_triggers
            .get(&skill.id)
            .copied()
            .unwrap_or(0);
        if used >= skill.max_triggers {
            continue;
        }
        if !state.rng.percent_chance(skill.chance) {
            continue;
        }

        let hp = (actor.snapshot.max_hp as f64 * skill.hp_fraction).floor() as u32;
        restore(&mut actor, hp);
        actor.guards = TypedCharges::default();
        *actor.counters.resurrection_triggers.entry(skill.id).or_insert(0) += 1;
        entry.push(
            Effect::new(EffectKind::Revived)
                .on(actor.id)
                .value(actor.current_hp)
                .extra(&skill.id.to_string()),
        );
        debug!(?victim, skill = skill.id, hp = actor.current_hp, "resurrected");

        if let Some(vitalize) = &skill.vitalize {
            if !actor.counters.vitalized {
                apply_vitalize(state, &mut actor, vitalize, entry);
            }
        }
        state.store(victim, actor);
        return true;
    }
    false
}

/// Rewrite the actor's skill set once. A compiler failure keeps the old table.
fn apply_vitalize(
    state: &BattleState,
    actor: &mut Actor,
    vitalize: &Vitalize,
    entry: &mut ActionEntryBuilder,
) {
    actor.counters.vitalized = true;
    let mut skill_ids: Vec<u16> = actor
        .skill_ids
        .iter()
        .copied()
        .filter(|id| !vitalize.remove.contains(id))
        .collect();
    for id in &vitalize.add {
        if !skill_ids.contains(id) {
            skill_ids.push(*id);
        }
    }

    let Some(compiler) = state.compiler() else {
        warn!(actor = actor.id, "no skill compiler attached; vitalize keeps current effects");
        return;
    };
    match compiler.compile(&actor.attributes, &skill_ids) {
        Ok(effects) => {
            actor.effects = effects;
            actor.skill_ids = skill_ids;
            entry.push(Effect::new(EffectKind::Vitalized).on(actor.id));
        }
        Err(err) => {
            warn!(actor = actor.id, %err, "skill recompilation failed; keeping previous effects");
        }
    }
}

/// Standing allies in formation order try to pull the victim back up.
fn try_rescue(state: &mut BattleState, victim: ActorRef, entry: &mut ActionEntryBuilder) -> bool {
    let mut rescuers: Vec<ActorRef> = state
        .active(victim.side)
        .into_iter()
        .filter(|r| *r != victim)
        .collect();
    rescuers.sort_by_key(|r| (state.actor(*r).map_or(u8::MAX, |a| a.slot), r.index));

    for rescuer_ref in rescuers {
        let Some(mut rescuer) = state.snapshot(rescuer_ref) else { continue };
        let Some(capability) = rescuer.effects.revival.rescue.clone() else { continue };
        if rescuer.counters.rescues_used >= capability.per_turn
            || action_lock(&rescuer, &state.definitions).is_some()
        {
            continue;
        }
        let chance = if capability.guaranteed {
            100.0
        } else {
            capability.base_chance + capability.healing_scale * rescuer.snapshot.magical_healing as f64
        };
        if !state.rng.percent_chance(chance) {
            continue;
        }

        let Some(mut fallen) = state.snapshot(victim) else { return false };
        let mut hp = (fallen.snapshot.max_hp as f64 * capability.hp_fraction).floor() as u32;
        let heal_spell = capability
            .heal_spell
            .filter(|id| rescuer.spell_charges(*id) > 0)
            .and_then(|id| state.definitions.spell(id).cloned());
        if let Some(spell) = heal_spell {
            if let SpellEffect::Heal { power, .. } = spell.effect {
                rescuer.consume_spell_charge(spell.id);
                let variance = state.rng.stat_variance(rescuer.attributes.luck);
                hp = healing_amount(&rescuer, &fallen, power, spell.school, variance);
            }
        }
        restore(&mut fallen, hp);
        rescuer.counters.rescues_used += 1;
        rescuer.counters.rescue_pending = true;

        entry.push(
            Effect::new(EffectKind::Rescued)
                .on(fallen.id)
                .value(fallen.current_hp)
                .extra(&rescuer.id.to_string()),
        );
        debug!(rescuer = ?rescuer_ref, ?victim, hp = fallen.current_hp, "rescued");
        state.store(rescuer_ref, rescuer);
        state.store(victim, fallen);
        return true;
    }
    false
}

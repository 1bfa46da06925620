//! Execution of resolved actions: physical attacks, spells, breath, enemy
//! specials and defending. Every change to an actor goes through a local
//! copy that is written back before anything else can observe it.

use crate::actor::{ActorRef, TimedBuff};
use crate::battle::ai::{self, ActionCategory};
use crate::battle::calculators::{
    absorb, breath_damage, healing_amount, hit_chance, magical_damage, physical_damage, Absorption,
    PhysicalHit,
};
use crate::battle::conditions::{try_apply_status, wake_on_damage, StatusOutcome};
use crate::battle::log::{ActionEntryBuilder, ActionKind, Effect, EffectKind};
use crate::battle::reactions::{enqueue, ReactionEvent};
use crate::battle::rescue;
use crate::battle::state::BattleState;
use crate::battle::stats::{degrade, repair};
use crate::battle::targeting::{pick_heal_target, pick_offensive, resolve_cover};
use schema::{
    BuffTemplate, DamageType, EnemySkillEffect, SpellDefinition, SpellEffect, SpellSchool,
    SpellTarget,
};
use tracing::debug;

/// Scaling applied to a physical attack by whatever launched it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackProfile {
    pub attack_count_multiplier: f64,
    /// Fixed hit count, ignoring the attacker's own attack count.
    pub hit_count: Option<u8>,
    pub critical_rate_multiplier: f64,
    pub accuracy_multiplier: f64,
    pub damage_multiplier: f64,
    /// Heal the attacker by the damage dealt.
    pub drain: bool,
    pub allow_cover: bool,
}

impl Default for AttackProfile {
    fn default() -> Self {
        Self {
            attack_count_multiplier: 1.0,
            hit_count: None,
            critical_rate_multiplier: 1.0,
            accuracy_multiplier: 1.0,
            damage_multiplier: 1.0,
            drain: false,
            allow_cover: true,
        }
    }
}

/// What a physical attack achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttackReport {
    pub hits_landed: u32,
    pub total_damage: u32,
    pub defeated: bool,
}

/// Result of pushing one blow into an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DamageApplied {
    amount: u32,
    defeated: bool,
}

/// Run the given action category. Returns false when it cannot resolve.
pub fn execute(
    state: &mut BattleState,
    actor: ActorRef,
    category: ActionCategory,
    depth: u32,
    entry: &mut ActionEntryBuilder,
) -> bool {
    match category {
        ActionCategory::Attack => {
            let Some(target) = pick_offensive(state, actor) else { return false };
            entry.declare(ActionKind::PhysicalAttack, None);
            physical_attack(state, actor, target, &AttackProfile::default(), depth, entry);
            true
        }
        ActionCategory::PriestMagic(spell_id) | ActionCategory::MageMagic(spell_id) => {
            cast_spell(state, actor, spell_id, depth, entry)
        }
        ActionCategory::Breath => {
            let targets = state.active(actor.side.opponent());
            if targets.is_empty() {
                return false;
            }
            entry.declare(ActionKind::Breath, None);
            breath_at(state, actor, &targets, 1.0, depth, entry);
            true
        }
        ActionCategory::EnemySpecial(skill_id) => enemy_special(state, actor, skill_id, depth, entry),
        ActionCategory::Defend => {
            defend(state, actor, entry);
            true
        }
    }
}

/// Resolve a multi-hit physical attack against one target.
pub fn physical_attack(
    state: &mut BattleState,
    attacker: ActorRef,
    target: ActorRef,
    profile: &AttackProfile,
    depth: u32,
    entry: &mut ActionEntryBuilder,
) -> AttackReport {
    let mut report = AttackReport::default();
    let Some(attacker_actor) = state.actor(attacker) else { return report };
    if !attacker_actor.is_active() {
        return report;
    }
    let hits = match profile.hit_count {
        Some(count) => count.max(1) as u32,
        None => {
            let base = attacker_actor.snapshot.attack_count.max(1) as f64;
            ((base * profile.attack_count_multiplier).round() as u32).max(1)
        }
    };

    // 1. A front-row ally may step in.
    let target = if profile.allow_cover && target.side != attacker.side {
        resolve_cover(state, target, entry)
    } else {
        target
    };

    // 2. Roll and resolve each hit.
    let mut misses = 0;
    for hit_index in 1..=hits {
        let (Some(att), Some(def)) = (state.snapshot(attacker), state.snapshot(target)) else {
            break;
        };
        if !att.is_alive() || !def.is_alive() {
            break;
        }
        let attacker_variance = state.rng.stat_variance(att.attributes.luck);
        let defender_variance = state.rng.stat_variance(def.attributes.luck);
        let chance = hit_chance(
            &att,
            &def,
            hit_index,
            profile.accuracy_multiplier,
            attacker_variance,
            defender_variance,
            &state.config,
        );
        if !state.rng.probability(chance) {
            entry.push(Effect::new(EffectKind::Miss).on(def.id).value(hit_index));
            misses += 1;
            continue;
        }

        let critical = state
            .rng
            .percent_chance(att.snapshot.critical_rate * profile.critical_rate_multiplier);
        if critical {
            entry.push(Effect::new(EffectKind::Critical).on(def.id));
        }
        let raw = physical_damage(
            &att,
            &def,
            &PhysicalHit {
                hit_index,
                critical,
                damage_multiplier: profile.damage_multiplier,
            },
        );
        let applied = apply_damage(state, target, raw, DamageType::Physical, entry);
        report.hits_landed += 1;
        report.total_damage += applied.amount;

        // 3. Riders on a landed hit.
        let absorb_percent = if profile.drain {
            100.0
        } else {
            att.effects.damage.absorb_percent
        };
        if absorb_percent > 0.0 {
            let amount = (applied.amount as f64 * absorb_percent / 100.0).floor() as u32;
            if amount > 0 {
                let restored = state.update(attacker, |a| a.heal(amount)).unwrap_or(0);
                if restored > 0 {
                    entry.push(Effect::new(EffectKind::Absorb).on(att.id).value(restored));
                }
            }
        }
        if applied.defeated {
            report.defeated = true;
            break;
        }
        for infliction in &att.effects.combat.on_hit_statuses {
            inflict_status(state, target, infliction.status_id, infliction.chance, entry);
        }
    }

    // 4. Raise events for the reaction queue.
    if report.hits_landed > 0 {
        enqueue(state, ReactionEvent::PhysicalDamage { attacker, defender: target }, depth);
    } else if misses > 0 {
        enqueue(state, ReactionEvent::Evaded { attacker, defender: target }, depth);
    }
    if report.defeated {
        settle_defeat(state, target, Some(attacker), depth, entry);
    } else if report.hits_landed > 0 {
        enqueue(state, ReactionEvent::AttackWithoutKill { attacker, defender: target }, depth);
    }
    report
}

/// Spend barrier or guard charges, apply the damage and log it.
fn apply_damage(
    state: &mut BattleState,
    target: ActorRef,
    raw: u32,
    damage_type: DamageType,
    entry: &mut ActionEntryBuilder,
) -> DamageApplied {
    let Some(mut defender) = state.snapshot(target) else {
        return DamageApplied {
            amount: 0,
            defeated: false,
        };
    };
    let (amount, absorption) = absorb(&mut defender, raw, damage_type);
    match absorption {
        Absorption::Guard => entry.push(
            Effect::new(EffectKind::GuardConsumed)
                .on(defender.id)
                .value(defender.guards.get(damage_type))
                .extra(&damage_type.to_string()),
        ),
        Absorption::Barrier => entry.push(
            Effect::new(EffectKind::BarrierConsumed)
                .on(defender.id)
                .value(defender.barriers.get(damage_type))
                .extra(&damage_type.to_string()),
        ),
        Absorption::Defending | Absorption::None => {}
    }

    let defeated = defender.take_damage(amount);
    let kind = match damage_type {
        DamageType::Physical => EffectKind::PhysicalDamage,
        DamageType::Magical => EffectKind::MagicalDamage,
        DamageType::Breath => EffectKind::BreathDamage,
    };
    entry.push(Effect::new(kind).on(defender.id).value(amount));

    if damage_type != DamageType::Breath {
        defender.counters.degradation = degrade(defender.counters.degradation);
    }
    if !defeated {
        for status_id in wake_on_damage(&mut defender, &state.definitions) {
            entry.push(
                Effect::new(EffectKind::StatusRecovered)
                    .on(defender.id)
                    .status(status_id)
                    .extra("damage"),
            );
        }
    }
    state.store(target, defender);
    DamageApplied { amount, defeated }
}

/// Run revival and rescue for a fallen actor. Returns true if it stays down.
pub fn settle_defeat(
    state: &mut BattleState,
    victim: ActorRef,
    killer: Option<ActorRef>,
    depth: u32,
    entry: &mut ActionEntryBuilder,
) -> bool {
    if rescue::handle_defeat(state, victim, entry) {
        return false;
    }
    enqueue(state, ReactionEvent::Defeated { killer, victim }, depth);
    true
}

/// Roll one status onto a target and log the outcome.
pub fn inflict_status(
    state: &mut BattleState,
    target: ActorRef,
    status_id: u8,
    chance: f64,
    entry: &mut ActionEntryBuilder,
) {
    let Some(definition) = state.definitions.status(status_id).cloned() else { return };
    let Some(mut victim) = state.snapshot(target) else { return };
    if !victim.is_alive() {
        return;
    }
    let outcome = try_apply_status(&mut victim, &definition, chance, &mut state.rng);
    let kind = match outcome {
        StatusOutcome::Applied | StatusOutcome::Refreshed => EffectKind::StatusApplied,
        StatusOutcome::Resisted => EffectKind::StatusResisted,
    };
    entry.push(Effect::new(kind).on(victim.id).status(status_id));
    state.store(target, victim);
}

fn spell_kind(school: SpellSchool) -> ActionKind {
    match school {
        SpellSchool::Priest => ActionKind::PriestMagic,
        SpellSchool::Mage => ActionKind::MageMagic,
    }
}

/// Cast a known spell as the actor's action, spending one charge.
pub fn cast_spell(
    state: &mut BattleState,
    caster: ActorRef,
    spell_id: u16,
    depth: u32,
    entry: &mut ActionEntryBuilder,
) -> bool {
    let Some(spell) = state.definitions.spell(spell_id).cloned() else { return false };
    let Some(actor) = state.actor(caster) else { return false };
    if actor.spell_charges(spell_id) == 0 {
        return false;
    }
    let targets = spell_targets(state, caster, &spell, None);
    if targets.is_empty() {
        return false;
    }
    state.update(caster, |a| a.consume_spell_charge(spell_id));
    entry.declare(spell_kind(spell.school), Some(spell_id));
    debug!(?caster, spell = spell_id, targets = targets.len(), "spell cast");
    resolve_spell(state, caster, &spell, &targets, 1.0, depth, entry);
    true
}

/// Cast a spell as a reaction. Costs no charge.
pub fn reaction_spell(
    state: &mut BattleState,
    caster: ActorRef,
    spell_id: u16,
    target: ActorRef,
    power_multiplier: f64,
    depth: u32,
    entry: &mut ActionEntryBuilder,
) {
    let Some(spell) = state.definitions.spell(spell_id).cloned() else { return };
    let targets = spell_targets(state, caster, &spell, Some(target));
    resolve_spell(state, caster, &spell, &targets, power_multiplier, depth, entry);
}

fn spell_targets(
    state: &mut BattleState,
    caster: ActorRef,
    spell: &SpellDefinition,
    preferred: Option<ActorRef>,
) -> Vec<ActorRef> {
    let opponents = caster.side.opponent();
    match &spell.effect {
        SpellEffect::Damage { target, .. } | SpellEffect::Status { target, .. } => match target {
            SpellTarget::All => state.active(opponents),
            SpellTarget::Single => preferred
                .filter(|r| state.is_active(*r))
                .or_else(|| pick_offensive(state, caster))
                .into_iter()
                .collect(),
        },
        SpellEffect::Heal { target, .. } => match target {
            SpellTarget::All => state
                .active(caster.side)
                .into_iter()
                .filter(|r| {
                    state
                        .actor(*r)
                        .is_some_and(|a| a.current_hp < a.snapshot.max_hp)
                })
                .collect(),
            SpellTarget::Single => pick_heal_target(state, caster).into_iter().collect(),
        },
        SpellEffect::Buff { .. } => state.active(caster.side),
    }
}

#[allow(clippy::too_many_arguments)]
fn resolve_spell(
    state: &mut BattleState,
    caster: ActorRef,
    spell: &SpellDefinition,
    targets: &[ActorRef],
    power_multiplier: f64,
    depth: u32,
    entry: &mut ActionEntryBuilder,
) {
    match &spell.effect {
        SpellEffect::Damage { power, .. } => {
            for &target in targets {
                magical_hit(
                    state,
                    caster,
                    target,
                    power * power_multiplier,
                    spell.school,
                    Some(spell.id),
                    depth,
                    entry,
                );
            }
        }
        SpellEffect::Heal { power, .. } => {
            for &target in targets {
                heal_target(state, caster, target, power * power_multiplier, spell.school, entry);
            }
        }
        SpellEffect::Status { status_id, chance, .. } => {
            for &target in targets {
                inflict_status(state, target, *status_id, *chance, entry);
            }
        }
        SpellEffect::Buff { buff } => {
            for &target in targets {
                grant_buff(state, target, buff, Some(spell.id), entry);
            }
        }
    }
    if spell.is_offensive() {
        enqueue(state, ReactionEvent::OffensiveSpell { caster }, depth);
    }
}

/// One magical blow: nullify roll, optional critical, damage and barrier.
#[allow(clippy::too_many_arguments)]
pub fn magical_hit(
    state: &mut BattleState,
    caster: ActorRef,
    target: ActorRef,
    power: f64,
    school: SpellSchool,
    spell_id: Option<u16>,
    depth: u32,
    entry: &mut ActionEntryBuilder,
) {
    let (Some(att), Some(def)) = (state.snapshot(caster), state.snapshot(target)) else { return };
    if !att.is_alive() || !def.is_alive() {
        return;
    }
    if state.rng.percent_chance(def.effects.damage.magic_nullify_percent) {
        entry.push(Effect::new(EffectKind::Nullified).on(def.id));
        return;
    }
    let critical = att.effects.damage.magic_critical
        && state.rng.percent_chance(att.snapshot.critical_rate);
    if critical {
        entry.push(Effect::new(EffectKind::Critical).on(def.id));
    }
    let raw = magical_damage(&att, &def, power, school, spell_id, critical);
    let applied = apply_damage(state, target, raw, DamageType::Magical, entry);
    enqueue(state, ReactionEvent::MagicalDamage { attacker: caster, defender: target }, depth);
    if applied.defeated {
        settle_defeat(state, target, Some(caster), depth, entry);
    }
}

fn heal_target(
    state: &mut BattleState,
    caster: ActorRef,
    target: ActorRef,
    power: f64,
    school: SpellSchool,
    entry: &mut ActionEntryBuilder,
) {
    let (Some(healer), Some(patient)) = (state.snapshot(caster), state.snapshot(target)) else {
        return;
    };
    if !patient.is_alive() {
        return;
    }
    let variance = state.rng.stat_variance(healer.attributes.luck);
    let amount = healing_amount(&healer, &patient, power, school, variance);
    let restored = state.update(target, |a| a.heal(amount)).unwrap_or(0);
    entry.push(Effect::new(EffectKind::Heal).on(patient.id).value(restored));
}

fn grant_buff(
    state: &mut BattleState,
    target: ActorRef,
    buff: &BuffTemplate,
    source_id: Option<u16>,
    entry: &mut ActionEntryBuilder,
) {
    let id = state.actor_id(target);
    let granted = state.update(target, |a| {
        a.buffs.push(TimedBuff {
            stat: buff.stat,
            multiplier: buff.multiplier,
            remaining_turns: buff.duration,
            action_delta: buff.action_delta,
            source_id,
        });
    });
    if granted.is_some() {
        entry.push(Effect::new(EffectKind::BuffApplied).on(id).extra(&buff.stat.to_string()));
    }
}

/// Breath against each listed target. Breath never crits and has no nullify roll.
pub fn breath_at(
    state: &mut BattleState,
    attacker: ActorRef,
    targets: &[ActorRef],
    power: f64,
    depth: u32,
    entry: &mut ActionEntryBuilder,
) {
    for &target in targets {
        let (Some(att), Some(def)) = (state.snapshot(attacker), state.snapshot(target)) else {
            continue;
        };
        if !att.is_alive() || !def.is_alive() {
            continue;
        }
        let raw = breath_damage(&att, &def, power);
        let applied = apply_damage(state, target, raw, DamageType::Breath, entry);
        enqueue(state, ReactionEvent::BreathDamage { attacker, defender: target }, depth);
        if applied.defeated {
            settle_defeat(state, target, Some(attacker), depth, entry);
        }
    }
}

/// Run an enemy special skill. Returns false when it has nothing to act on.
pub fn enemy_special(
    state: &mut BattleState,
    actor: ActorRef,
    skill_id: u16,
    depth: u32,
    entry: &mut ActionEntryBuilder,
) -> bool {
    let Some(skill) = state.definitions.enemy_skill(skill_id).cloned() else { return false };
    let Some(user) = state.snapshot(actor) else { return false };
    if !ai::special_ready(state, &user, &skill) {
        return false;
    }

    let targets = if !skill.is_offensive() {
        vec![actor]
    } else if skill.target_all {
        state.active(actor.side.opponent())
    } else {
        pick_offensive(state, actor).into_iter().collect()
    };
    if targets.is_empty() {
        return false;
    }

    entry.declare(ActionKind::EnemySpecial, Some(skill_id));
    state.update(actor, |a| {
        *a.counters.enemy_skill_uses.entry(skill_id).or_insert(0) += 1;
    });
    debug!(?actor, skill = skill_id, "enemy special");

    match &skill.effect {
        EnemySkillEffect::Physical { multiplier, hits } => {
            let profile = AttackProfile {
                hit_count: Some(*hits),
                damage_multiplier: *multiplier,
                ..AttackProfile::default()
            };
            for target in targets {
                physical_attack(state, actor, target, &profile, depth, entry);
            }
        }
        EnemySkillEffect::Magical { power } => {
            for target in targets {
                magical_hit(state, actor, target, *power, SpellSchool::Mage, None, depth, entry);
            }
        }
        EnemySkillEffect::Breath { power } => {
            breath_at(state, actor, &targets, *power, depth, entry);
        }
        EnemySkillEffect::Status { status_id, chance } => {
            for target in targets {
                inflict_status(state, target, *status_id, *chance, entry);
            }
        }
        EnemySkillEffect::SelfHeal { percent } => {
            let amount = ((user.snapshot.max_hp as f64 * percent / 100.0).floor() as u32).max(1);
            let restored = state.update(actor, |a| a.heal(amount)).unwrap_or(0);
            entry.push(Effect::new(EffectKind::Heal).on(user.id).value(restored));
        }
        EnemySkillEffect::Buff { buff } => {
            grant_buff(state, actor, buff, Some(skill_id), entry);
        }
    }
    true
}

/// Take a guard stance for the rest of the turn and repair some degradation.
pub fn defend(state: &mut BattleState, actor: ActorRef, entry: &mut ActionEntryBuilder) {
    entry.declare(ActionKind::Defend, None);
    let id = state.actor_id(actor);
    state.update(actor, |a| {
        a.defending = true;
        a.counters.degradation = repair(a.counters.degradation, a.effects.combat.degradation_repair);
    });
    entry.push(Effect::new(EffectKind::Defending).on(id));
}

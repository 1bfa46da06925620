//! Counters, retaliations and follow-ups.
//!
//! Resolution code enqueues [`ReactionEvent`]s as things happen; the turn
//! loop drains the queue after each action. Draining works in batches so
//! that a reaction's own events are handled after the batch that caused them.

use crate::actor::ActorRef;
use crate::battle::conditions::action_lock;
use crate::battle::engine::{self, AttackProfile};
use crate::battle::log::{ActionEntryBuilder, ActionKind};
use crate::battle::state::{BattleState, OrderKey};
use crate::battle::targeting::pick_offensive;
use crate::effects::{ReactionMode, ReactionSkill, ReactionTarget, ReactionTrigger};
use std::cmp::Ordering;
use tracing::{debug, trace};

/// Something that happened which a reaction skill may answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionEvent {
    PhysicalDamage { attacker: ActorRef, defender: ActorRef },
    MagicalDamage { attacker: ActorRef, defender: ActorRef },
    BreathDamage { attacker: ActorRef, defender: ActorRef },
    Evaded { attacker: ActorRef, defender: ActorRef },
    Defeated { killer: Option<ActorRef>, victim: ActorRef },
    OffensiveSpell { caster: ActorRef },
    AttackWithoutKill { attacker: ActorRef, defender: ActorRef },
}

impl ReactionEvent {
    /// Triggers this event arms for `reactor`, each with the actor it points at.
    pub fn armed_for(&self, reactor: ActorRef) -> Vec<(ReactionTrigger, Option<ActorRef>)> {
        use ReactionTrigger::*;
        match *self {
            ReactionEvent::PhysicalDamage { attacker, defender } => {
                if defender == reactor {
                    vec![
                        (SelfDamagedPhysical, Some(attacker)),
                        (SelfDamagedAny, Some(attacker)),
                    ]
                } else if defender.side == reactor.side {
                    vec![(AllyDamagedPhysical, Some(attacker))]
                } else {
                    Vec::new()
                }
            }
            ReactionEvent::MagicalDamage { attacker, defender } => {
                if defender == reactor {
                    vec![
                        (SelfDamagedMagical, Some(attacker)),
                        (SelfDamagedAny, Some(attacker)),
                    ]
                } else {
                    Vec::new()
                }
            }
            ReactionEvent::BreathDamage { attacker, defender } => {
                if defender == reactor {
                    vec![(SelfDamagedAny, Some(attacker))]
                } else {
                    Vec::new()
                }
            }
            ReactionEvent::Evaded { attacker, defender } => {
                if defender == reactor {
                    vec![(SelfEvaded, Some(attacker))]
                } else {
                    Vec::new()
                }
            }
            ReactionEvent::Defeated { killer, victim } => {
                if victim.side == reactor.side && victim != reactor {
                    vec![(AllyDefeated, killer)]
                } else if killer == Some(reactor) && victim.side != reactor.side {
                    vec![(SelfKilledEnemy, None)]
                } else {
                    Vec::new()
                }
            }
            ReactionEvent::OffensiveSpell { caster } => {
                if caster == reactor {
                    vec![(SelfCastOffensiveSpell, None)]
                } else if caster.side == reactor.side {
                    vec![(AllyCastOffensiveSpell, None)]
                } else {
                    Vec::new()
                }
            }
            ReactionEvent::AttackWithoutKill { attacker, defender } => {
                if attacker == reactor {
                    vec![(AttackedWithoutKill, Some(defender))]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Whether the event may arm reactions when raised by a reaction itself.
    pub fn rearms_past_root(&self) -> bool {
        match self {
            ReactionEvent::PhysicalDamage { .. }
            | ReactionEvent::MagicalDamage { .. }
            | ReactionEvent::BreathDamage { .. }
            | ReactionEvent::Evaded { .. } => true,
            ReactionEvent::Defeated { .. }
            | ReactionEvent::OffensiveSpell { .. }
            | ReactionEvent::AttackWithoutKill { .. } => false,
        }
    }
}

/// Execution tier, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReactionTier {
    Counter,
    Retaliation,
    FollowUp,
}

pub fn tier_of(trigger: ReactionTrigger) -> ReactionTier {
    match trigger {
        ReactionTrigger::SelfDamagedPhysical
        | ReactionTrigger::SelfDamagedMagical
        | ReactionTrigger::SelfDamagedAny
        | ReactionTrigger::SelfEvaded
        | ReactionTrigger::AllyDamagedPhysical => ReactionTier::Counter,
        ReactionTrigger::AllyDefeated => ReactionTier::Retaliation,
        ReactionTrigger::SelfKilledEnemy
        | ReactionTrigger::SelfCastOffensiveSpell
        | ReactionTrigger::AllyCastOffensiveSpell
        | ReactionTrigger::AttackedWithoutKill => ReactionTier::FollowUp,
    }
}

/// A queued event and the depth of the action that raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReaction {
    pub event: ReactionEvent,
    pub depth: u32,
    pub seq: u64,
}

/// One reaction skill armed by one event, waiting for its turn.
#[derive(Debug, Clone)]
pub struct ReactionCandidate {
    pub tier: ReactionTier,
    pub key: OrderKey,
    pub seq: u64,
    pub reactor: ActorRef,
    pub skill: ReactionSkill,
    pub source: Option<ActorRef>,
    pub depth: u32,
}

/// Tier, then cached speed desc, then cached tiebreak desc, then enqueue order.
pub fn execution_order(a: &ReactionCandidate, b: &ReactionCandidate) -> Ordering {
    a.tier
        .cmp(&b.tier)
        .then_with(|| b.key.speed.cmp(&a.key.speed))
        .then_with(|| b.key.tiebreak.cmp(&a.key.tiebreak))
        .then_with(|| a.seq.cmp(&b.seq))
}

/// Queue an event raised at `depth`. Past the root action only counter-type
/// events re-arm, and only up to the configured depth.
pub fn enqueue(state: &mut BattleState, event: ReactionEvent, depth: u32) {
    if depth > 0 && (!event.rearms_past_root() || depth >= state.config.max_reaction_depth) {
        trace!(?event, depth, "reaction event suppressed");
        return;
    }
    let seq = state.next_reaction_seq();
    state.reactions.push_back(PendingReaction { event, depth, seq });
}

/// Collect every armed reaction for a batch of pending events, in execution order.
pub fn collect_candidates(state: &BattleState, batch: &[PendingReaction]) -> Vec<ReactionCandidate> {
    let mut candidates = Vec::new();
    for pending in batch {
        for reactor in state.all_refs() {
            let Some(actor) = state.actor(reactor) else { continue };
            if !actor.is_active() || actor.effects.combat.reactions.is_empty() {
                continue;
            }
            for (trigger, source) in pending.event.armed_for(reactor) {
                for skill in actor.effects.combat.reactions.iter().filter(|s| s.trigger == trigger) {
                    candidates.push(ReactionCandidate {
                        tier: tier_of(trigger),
                        key: state.order.key(reactor),
                        seq: pending.seq,
                        reactor,
                        skill: skill.clone(),
                        source,
                        depth: pending.depth,
                    });
                }
            }
        }
    }
    // Stable sort keeps roster and skill order inside equal keys.
    candidates.sort_by(execution_order);
    candidates
}

/// Run reactions until the queue is empty.
pub fn drain(state: &mut BattleState) {
    while !state.reactions.is_empty() {
        let batch: Vec<PendingReaction> = state.reactions.drain(..).collect();
        for candidate in collect_candidates(state, &batch) {
            execute(state, &candidate);
        }
    }
}

fn reaction_chance(state: &BattleState, skill: &ReactionSkill, reactor: ActorRef, target: ActorRef) -> f64 {
    let Some(actor) = state.actor(reactor) else { return 0.0 };
    let attribute_bonus = skill
        .chance_attribute
        .map_or(0.0, |attr| actor.attributes.get(attr) as f64 * skill.chance_scale);
    let evasion = state
        .actor(target)
        .map_or(1.0, |t| t.effects.combat.reaction_evasion_multiplier);
    ((skill.base_chance + attribute_bonus) * actor.effects.combat.proc_multiplier * evasion)
        .floor()
        .clamp(0.0, 100.0)
}

fn resolve_target(state: &mut BattleState, candidate: &ReactionCandidate) -> Option<ActorRef> {
    let opponent = candidate.reactor.side.opponent();
    let preferred = match candidate.skill.target {
        ReactionTarget::TriggeringActor => candidate
            .source
            .filter(|s| s.side == opponent && state.is_active(*s)),
        ReactionTarget::RandomOpponent => None,
    };
    preferred.or_else(|| pick_offensive(state, candidate.reactor))
}

fn execute(state: &mut BattleState, candidate: &ReactionCandidate) {
    let reactor = candidate.reactor;
    let skill = &candidate.skill;

    // 1. The reactor must still be able to act.
    let Some(actor) = state.actor(reactor) else { return };
    if !actor.is_active() || action_lock(actor, &state.definitions).is_some() {
        return;
    }
    let used = actor.counters.reaction_uses.get(&skill.id).copied().unwrap_or(0);
    if skill.uses_per_battle.is_some_and(|limit| used >= limit) {
        return;
    }
    let actor_id = actor.id;

    // 2. Aim, then roll.
    let Some(target) = resolve_target(state, candidate) else { return };
    let chance = reaction_chance(state, skill, reactor, target);
    if !state.rng.percent_chance(chance) {
        trace!(?reactor, skill = skill.id, chance, "reaction did not fire");
        return;
    }
    debug!(?reactor, ?target, skill = skill.id, tier = ?candidate.tier, "reaction fires");
    state.update(reactor, |a| {
        *a.counters.reaction_uses.entry(skill.id).or_insert(0) += 1;
    });

    // 3. Resolve one depth deeper through the normal machinery.
    let depth = candidate.depth + 1;
    let mut entry = ActionEntryBuilder::new(actor_id, state.turn, ActionKind::Reaction).skill(skill.id);
    match skill.mode {
        ReactionMode::Physical => {
            let profile = AttackProfile {
                attack_count_multiplier: skill.attack_count_multiplier,
                critical_rate_multiplier: skill.critical_rate_multiplier,
                accuracy_multiplier: skill.accuracy_multiplier,
                damage_multiplier: skill.damage_multiplier,
                ..AttackProfile::default()
            };
            engine::physical_attack(state, reactor, target, &profile, depth, &mut entry);
        }
        ReactionMode::Spell(spell_id) => {
            engine::reaction_spell(state, reactor, spell_id, target, skill.damage_multiplier, depth, &mut entry);
        }
        ReactionMode::Breath => {
            engine::breath_at(state, reactor, &[target], skill.damage_multiplier, depth, &mut entry);
        }
    }
    state.push_entry(entry.build());
}

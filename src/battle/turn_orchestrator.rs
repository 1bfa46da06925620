use crate::actor::{Actor, ActorRef, Side, TimedBuff};
use crate::battle::action_stack::{ActionStack, ScheduledAction};
use crate::battle::ai;
use crate::battle::conditions::{action_lock, is_confused, tick_damage};
use crate::battle::engine::{self, AttackProfile};
use crate::battle::log::{ActionEntryBuilder, ActionKind, BattleLog, Effect, EffectKind};
use crate::battle::reactions;
use crate::battle::state::{BattleOutcome, BattleState};
use crate::battle::targeting::{pick_confused, pick_offensive, pick_other_ally};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Final result of a battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleReport {
    pub outcome: BattleOutcome,
    pub players: Vec<Actor>,
    pub enemies: Vec<Actor>,
    pub log: BattleLog,
}

/// Main entry point: resolve a whole battle and consume the state.
pub fn run_battle(mut state: BattleState) -> BattleReport {
    info!(
        players = state.players.len(),
        enemies = state.enemies.len(),
        max_turns = state.config.max_turns,
        "battle started"
    );

    // 1. Opening log and pre-emptive strikes.
    record_opening(&mut state);
    run_pre_emptives(&mut state);

    // 2. Turn loop, checking the end state before every turn.
    while !state.is_over() {
        if let Some(outcome) = decide(&state) {
            state.outcome = Some(outcome);
            break;
        }
        if state.turn >= state.config.max_turns {
            debug!(turn = state.turn, "turn cap reached");
            state.outcome = Some(BattleOutcome::Retreat);
            break;
        }
        run_turn(&mut state);
    }

    // 3. Close the log.
    finish(state)
}

/// Victory, defeat or retreat, if the battle is decided.
pub fn decide(state: &BattleState) -> Option<BattleOutcome> {
    let all_down = |side: Side| state.roster(side).iter().all(|a| !a.is_alive());
    let none_active = |side: Side| state.active(side).is_empty();
    if all_down(Side::Enemy) {
        Some(BattleOutcome::Victory)
    } else if all_down(Side::Player) {
        Some(BattleOutcome::Defeat)
    } else if none_active(Side::Player) || none_active(Side::Enemy) {
        Some(BattleOutcome::Retreat)
    } else {
        None
    }
}

/// Settle the outcome after an action. Returns true once the battle is over.
fn check_end(state: &mut BattleState) -> bool {
    if state.outcome.is_none() {
        state.outcome = decide(state);
    }
    state.is_over()
}

fn record_opening(state: &mut BattleState) {
    for actor in state.players.iter().chain(state.enemies.iter()) {
        state.log.initial_hp.insert(actor.id, actor.current_hp);
    }
    let appearances: Vec<ActionEntryBuilder> = state
        .enemies
        .iter()
        .map(|enemy| ActionEntryBuilder::new(enemy.id, 0, ActionKind::EnemyAppear))
        .collect();
    for entry in appearances {
        state.push_entry(entry.build());
    }
}

fn run_pre_emptives(state: &mut BattleState) {
    for actor_ref in state.all_refs() {
        let Some(actor) = state.snapshot(actor_ref) else { continue };
        for attack in &actor.effects.combat.pre_emptive {
            if check_end(state) {
                return;
            }
            // An earlier strike may have felled this actor; the rest still roll.
            if !state.is_active(actor_ref) {
                break;
            }
            if !state.rng.percent_chance(attack.chance) {
                continue;
            }
            let Some(target) = pick_offensive(state, actor_ref) else { break };
            let profile = AttackProfile {
                attack_count_multiplier: attack.attack_count_multiplier,
                damage_multiplier: attack.damage_multiplier,
                ..AttackProfile::default()
            };
            let mut entry = ActionEntryBuilder::new(actor.id, 0, ActionKind::PreEmptive).skill(attack.id);
            engine::physical_attack(state, actor_ref, target, &profile, 0, &mut entry);
            state.push_entry(entry.build());
            reactions::drain(state);
        }
    }
}

fn run_turn(state: &mut BattleState) {
    state.turn += 1;
    debug!(turn = state.turn, "turn started");

    // 1. Turn-start phases.
    apply_buff_triggers(state);
    reset_rescues(state);
    process_forced_retreats(state);
    if check_end(state) {
        return;
    }
    mark_turn_flags(state);

    // 2. Actions in order.
    let mut stack = ActionStack::build_for_turn(state);
    while let Some(scheduled) = stack.pop_front() {
        take_action(state, scheduled, &mut stack);
        if check_end(state) {
            return;
        }
    }

    // 3. End of turn.
    end_of_turn(state);
    check_end(state);
}

fn apply_buff_triggers(state: &mut BattleState) {
    let turn = state.turn;
    for actor_ref in state.all_refs() {
        let Some(actor) = state.snapshot(actor_ref) else { continue };
        if !actor.is_active() {
            continue;
        }
        for trigger in actor.effects.combat.buff_triggers.iter().filter(|t| t.turn == turn) {
            let targets = if trigger.party_wide {
                state.active(actor_ref.side)
            } else {
                vec![actor_ref]
            };
            let mut entry = ActionEntryBuilder::new(actor.id, turn, ActionKind::BuffTrigger);
            for target in targets {
                let id = state.actor_id(target);
                state.update(target, |a| {
                    a.buffs.push(TimedBuff {
                        stat: trigger.buff.stat,
                        multiplier: trigger.buff.multiplier,
                        remaining_turns: trigger.buff.duration,
                        action_delta: trigger.buff.action_delta,
                        source_id: None,
                    })
                });
                entry.push(
                    Effect::new(EffectKind::BuffApplied)
                        .on(id)
                        .extra(&trigger.buff.stat.to_string()),
                );
            }
            state.push_entry(entry.build());
        }
    }
}

fn reset_rescues(state: &mut BattleState) {
    for actor in state.players.iter_mut().chain(state.enemies.iter_mut()) {
        actor.counters.rescues_used = 0;
        actor.counters.rescue_pending = false;
    }
}

fn process_forced_retreats(state: &mut BattleState) {
    let turn = state.turn;
    for actor_ref in state.all_refs() {
        let Some(actor) = state.actor(actor_ref) else { continue };
        if !actor.is_active() {
            continue;
        }
        let Some(retreat) = actor.effects.combat.forced_retreat else { continue };
        let id = actor.id;
        if turn < retreat.from_turn || !state.rng.percent_chance(retreat.chance) {
            continue;
        }
        state.update(actor_ref, |a| a.withdrawn = true);
        debug!(?actor_ref, "actor withdrew");
        let mut entry = ActionEntryBuilder::new(id, turn, ActionKind::Withdraw);
        entry.push(Effect::new(EffectKind::Withdrew).on(id));
        state.push_entry(entry.build());
    }
}

/// Set the turn-scoped sacrifice and martial flags from their intervals.
fn mark_turn_flags(state: &mut BattleState) {
    let turn = state.turn;
    let on_turn = |interval: Option<u32>| interval.is_some_and(|n| n > 0 && turn % n == 0);
    for actor_ref in state.all_refs() {
        let Some(actor) = state.actor(actor_ref) else { continue };
        let active = actor.is_active();
        let sacrifice = active && on_turn(actor.effects.combat.sacrifice_interval);
        let martial = active && on_turn(actor.effects.combat.martial_interval);
        let id = actor.id;
        state.update(actor_ref, |a| {
            a.counters.sacrifice = sacrifice;
            a.counters.martial = martial;
        });
        if martial {
            debug!(?actor_ref, "martial turn");
        }
        if sacrifice {
            let mut entry = ActionEntryBuilder::new(id, turn, ActionKind::Sacrifice);
            entry.push(Effect::new(EffectKind::SacrificeMarked).on(id));
            state.push_entry(entry.build());
        }
    }
}

fn take_action(state: &mut BattleState, scheduled: ScheduledAction, stack: &mut ActionStack) {
    let actor_ref = scheduled.actor();
    let is_extra = matches!(scheduled, ScheduledAction::Extra(_));
    let Some(actor) = state.snapshot(actor_ref) else { return };

    // 1. Reasons not to act at all.
    if !actor.is_active() {
        return;
    }
    if !is_extra && actor.counters.rescue_pending {
        debug!(?actor_ref, "action spent on rescue");
        state.update(actor_ref, |a| a.counters.rescue_pending = false);
        return;
    }
    if let Some(status_id) = action_lock(&actor, &state.definitions) {
        let mut entry = ActionEntryBuilder::new(actor.id, state.turn, ActionKind::StatusLocked);
        entry.push(Effect::new(EffectKind::ActionLocked).on(actor.id).status(status_id));
        state.push_entry(entry.build());
        return;
    }

    // 2. Act, then let reactions play out.
    let mut entry = ActionEntryBuilder::new(actor.id, state.turn, ActionKind::Defend);
    if is_extra {
        entry.set_tag("extra");
    }
    let resolved = perform_action(state, actor_ref, &mut entry);
    state.push_entry(entry.build());
    reactions::drain(state);

    // 3. Skill-granted extra actions, each gated on its own roll.
    if !resolved || is_extra || decide(state).is_some() || !state.is_active(actor_ref) {
        return;
    }
    let turn = state.turn;
    let mut granted = 0;
    for grant in actor.effects.combat.extra_actions.iter().filter(|g| g.is_active(turn)) {
        if state.rng.percent_chance(grant.chance) {
            granted += 1;
        }
    }
    for _ in 0..granted {
        stack.push_front(ScheduledAction::Extra(actor_ref));
    }
}

/// Berserk, vampiric impulse and confusion pre-empt normal selection.
fn perform_action(state: &mut BattleState, actor_ref: ActorRef, entry: &mut ActionEntryBuilder) -> bool {
    let Some(actor) = state.snapshot(actor_ref) else { return false };
    let combat = &actor.effects.combat;

    // 1. Berserk forces a plain attack.
    if state.rng.percent_chance(combat.berserk_percent) {
        if let Some(target) = pick_offensive(state, actor_ref) {
            entry.declare(ActionKind::PhysicalAttack, None);
            entry.set_tag("berserk");
            engine::physical_attack(state, actor_ref, target, &AttackProfile::default(), 0, entry);
            return true;
        }
    }

    // 2. Vampiric impulse drains an ally.
    let has_ally = state.active(actor_ref.side).iter().any(|r| *r != actor_ref);
    if has_ally && state.rng.percent_chance(combat.vampiric_impulse_percent) {
        if let Some(target) = pick_other_ally(state, actor_ref) {
            let profile = AttackProfile {
                drain: true,
                allow_cover: false,
                ..AttackProfile::default()
            };
            entry.declare(ActionKind::PhysicalAttack, None);
            entry.set_tag("vampiric");
            engine::physical_attack(state, actor_ref, target, &profile, 0, entry);
            return true;
        }
    }

    // 3. Confusion swings at anyone.
    if is_confused(&actor, &state.definitions) {
        if let Some(target) = pick_confused(state, actor_ref) {
            let profile = AttackProfile {
                allow_cover: false,
                ..AttackProfile::default()
            };
            entry.declare(ActionKind::PhysicalAttack, None);
            entry.set_tag("confused");
            engine::physical_attack(state, actor_ref, target, &profile, 0, entry);
            return true;
        }
    }

    // 4. Normal selection, falling through categories until one resolves.
    for category in ai::select_actions(state, actor_ref) {
        if engine::execute(state, actor_ref, category, 0, entry) {
            return true;
        }
    }
    false
}

fn end_of_turn(state: &mut BattleState) {
    let turn = state.turn;
    for actor_ref in state.all_refs() {
        let Some(actor) = state.snapshot(actor_ref) else { continue };
        if !actor.is_alive() {
            continue;
        }
        let mut entry = ActionEntryBuilder::new(actor.id, turn, ActionKind::EndOfTurn);
        tick_statuses(state, actor_ref, &mut entry);
        tick_buffs(state, actor_ref, &mut entry);
        regenerate(state, actor_ref, &mut entry);
        state.update(actor_ref, |a| a.defending = false);
        if !entry.is_empty() {
            state.push_entry(entry.build());
        }
        reactions::drain(state);
        if check_end(state) {
            return;
        }
    }
}

fn tick_statuses(state: &mut BattleState, actor_ref: ActorRef, entry: &mut ActionEntryBuilder) {
    let Some(actor) = state.snapshot(actor_ref) else { return };
    for applied in &actor.statuses {
        let Some(definition) = state.definitions.status(applied.status_id).cloned() else {
            state.update(actor_ref, |a| a.statuses.retain(|s| s.status_id != applied.status_id));
            continue;
        };
        let Some(mut current) = state.snapshot(actor_ref) else { return };
        if !current.is_alive() {
            return;
        }

        // 1. Damage over time.
        let damage = tick_damage(&current, &definition);
        if damage > 0 {
            let defeated = current.take_damage(damage);
            entry.push(
                Effect::new(EffectKind::StatusDamage)
                    .on(current.id)
                    .value(damage)
                    .status(definition.id),
            );
            state.store(actor_ref, current);
            if defeated && engine::settle_defeat(state, actor_ref, None, 0, entry) {
                return;
            }
            let Some(refreshed) = state.snapshot(actor_ref) else { return };
            current = refreshed;
        }
        // A revival clears statuses.
        let Some(position) = current.statuses.iter().position(|s| s.status_id == definition.id) else {
            continue;
        };

        // 2. Early recovery, else countdown.
        if state.rng.percent_chance(definition.recovery_chance) {
            current.statuses.remove(position);
            entry.push(Effect::new(EffectKind::StatusRecovered).on(current.id).status(definition.id));
        } else {
            let remaining = &mut current.statuses[position].remaining_turns;
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                current.statuses.remove(position);
                entry.push(Effect::new(EffectKind::StatusExpired).on(current.id).status(definition.id));
            }
        }
        state.store(actor_ref, current);
    }
}

fn tick_buffs(state: &mut BattleState, actor_ref: ActorRef, entry: &mut ActionEntryBuilder) {
    let Some(mut actor) = state.snapshot(actor_ref) else { return };
    let mut expired = Vec::new();
    actor.buffs.retain_mut(|buff| {
        buff.remaining_turns = buff.remaining_turns.saturating_sub(1);
        if buff.remaining_turns == 0 {
            expired.push(buff.stat);
            false
        } else {
            true
        }
    });
    for stat in expired {
        entry.push(Effect::new(EffectKind::BuffExpired).on(actor.id).extra(&stat.to_string()));
    }
    state.store(actor_ref, actor);
}

fn regenerate(state: &mut BattleState, actor_ref: ActorRef, entry: &mut ActionEntryBuilder) {
    let Some(actor) = state.actor(actor_ref) else { return };
    let percent = actor.effects.combat.regeneration_percent;
    if !actor.is_alive() || percent <= 0.0 || actor.current_hp >= actor.snapshot.max_hp {
        return;
    }
    let amount = ((actor.snapshot.max_hp as f64 * percent / 100.0).floor() as u32).max(1);
    let id = actor.id;
    let restored = state.update(actor_ref, |a| a.heal(amount)).unwrap_or(0);
    entry.push(Effect::new(EffectKind::Regenerated).on(id).value(restored));
}

fn finish(mut state: BattleState) -> BattleReport {
    let outcome = state.outcome.unwrap_or(BattleOutcome::Retreat);
    state.log.total_turns = state.turn;
    let kind = match outcome {
        BattleOutcome::Victory => ActionKind::Victory,
        BattleOutcome::Defeat => ActionKind::Defeat,
        BattleOutcome::Retreat => ActionKind::Retreat,
    };
    state.push_entry(ActionEntryBuilder::new(0, state.turn, kind).build());
    info!(%outcome, turns = state.turn, entries = state.log.entries.len(), "battle finished");

    BattleReport {
        outcome,
        players: state.players,
        enemies: state.enemies,
        log: state.log,
    }
}

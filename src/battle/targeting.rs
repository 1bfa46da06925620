use crate::actor::{Actor, ActorRef};
use crate::battle::log::{ActionEntryBuilder, Effect, EffectKind};
use crate::battle::state::BattleState;
use schema::FormationRow;
use tracing::debug;

/// Base pick weight for front, middle and back rows.
const ROW_WEIGHTS: [f64; 3] = [3.0, 2.0, 1.0];

fn pick_weight(actor: &Actor) -> f64 {
    ROW_WEIGHTS[actor.row().index()] * actor.effects.combat.targeting_weight.max(0.0)
}

/// Choose a living opponent for an offensive action.
///
/// A marked sacrifice on the opposing side is always chosen. Otherwise the
/// pick is weighted by row and by the target's targeting weight.
pub fn pick_offensive(state: &mut BattleState, attacker: ActorRef) -> Option<ActorRef> {
    let side = attacker.side.opponent();
    let forced = state
        .active(side)
        .into_iter()
        .find(|r| state.actor(*r).is_some_and(|a| a.counters.sacrifice));
    if let Some(sacrifice) = forced {
        debug!(?attacker, ?sacrifice, "offensive pick forced onto sacrifice");
        return Some(sacrifice);
    }

    let candidates = state.active(side);
    let weights: Vec<f64> = candidates
        .iter()
        .filter_map(|r| state.actor(*r))
        .map(pick_weight)
        .collect();
    match state.rng.pick_weighted(&weights) {
        Some(i) => candidates.get(i).copied(),
        // Every candidate has zero weight; fall back to the first in line.
        None => candidates.first().copied(),
    }
}

/// Living ally with the lowest HP percent, first in slot order on ties.
pub fn pick_heal_target(state: &BattleState, caster: ActorRef) -> Option<ActorRef> {
    let mut best: Option<(ActorRef, f64)> = None;
    for r in state.active(caster.side) {
        let Some(actor) = state.actor(r) else { continue };
        if actor.current_hp >= actor.snapshot.max_hp {
            continue;
        }
        let hp = actor.hp_percent();
        if best.map_or(true, |(_, best_hp)| hp < best_hp) {
            best = Some((r, hp));
        }
    }
    best.map(|(r, _)| r)
}

/// Any living combatant except the actor itself, uniformly.
pub fn pick_confused(state: &mut BattleState, actor: ActorRef) -> Option<ActorRef> {
    let candidates: Vec<ActorRef> = state
        .all_refs()
        .into_iter()
        .filter(|r| *r != actor && state.is_active(*r))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    let i = state.rng.next_int(0, candidates.len() as i64 - 1) as usize;
    candidates.get(i).copied()
}

/// A random living ally other than the actor, for drain attacks.
pub fn pick_other_ally(state: &mut BattleState, actor: ActorRef) -> Option<ActorRef> {
    let candidates: Vec<ActorRef> = state
        .active(actor.side)
        .into_iter()
        .filter(|r| *r != actor)
        .collect();
    if candidates.is_empty() {
        return None;
    }
    let i = state.rng.next_int(0, candidates.len() as i64 - 1) as usize;
    candidates.get(i).copied()
}

/// Let a front-row ally step in front of a physical attack on a back-row member.
///
/// Each eligible coverer rolls its cover chance in slot order; the first
/// success takes the hit.
pub fn resolve_cover(
    state: &mut BattleState,
    target: ActorRef,
    entry: &mut ActionEntryBuilder,
) -> ActorRef {
    let Some(defender) = state.actor(target) else { return target };
    if defender.row() != FormationRow::Back {
        return target;
    }
    let mut coverers: Vec<(ActorRef, u8, f64, u32)> = state
        .active(target.side)
        .into_iter()
        .filter(|r| *r != target)
        .filter_map(|r| state.actor(r).map(|a| (r, a)))
        .filter(|(_, a)| a.row() == FormationRow::Front && a.effects.combat.cover_percent > 0.0)
        .map(|(r, a)| (r, a.slot, a.effects.combat.cover_percent, a.id))
        .collect();
    coverers.sort_by_key(|(r, slot, _, _)| (*slot, r.index));
    let target_id = defender.id;
    for (coverer, _, chance, coverer_id) in coverers {
        if state.rng.percent_chance(chance) {
            debug!(?coverer, ?target, "cover intercepts attack");
            entry.push(Effect::new(EffectKind::Covered).on(coverer_id).value(target_id));
            return coverer;
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{CombatSnapshot, Side};
    use crate::battle::log::ActionKind;
    use crate::battle::random::BattleRandom;
    use crate::scenario::BattleConfig;
    use schema::BattleDefinitions;

    fn unit(id: u32, side: Side, slot: u8) -> Actor {
        Actor::new(
            id,
            "Unit",
            side,
            slot,
            CombatSnapshot {
                max_hp: 20,
                ..Default::default()
            },
        )
    }

    fn state(players: Vec<Actor>, enemies: Vec<Actor>, rng: BattleRandom) -> BattleState {
        BattleState::new(players, enemies, BattleDefinitions::new(), rng, BattleConfig::default())
            .expect("state should build")
    }

    #[test]
    fn test_front_row_is_favoured() {
        // Weights 3 (front) and 1 (back): a draw of 0.7 lands in the front band.
        let mut battle = state(
            vec![unit(1, Side::Player, 0)],
            vec![unit(1001, Side::Enemy, 0), unit(5002, Side::Enemy, 4)],
            BattleRandom::fixed(0.7),
        );
        assert_eq!(pick_offensive(&mut battle, ActorRef::player(0)), Some(ActorRef::enemy(0)));
        battle.rng = BattleRandom::fixed(0.8);
        assert_eq!(pick_offensive(&mut battle, ActorRef::player(0)), Some(ActorRef::enemy(1)));
    }

    #[test]
    fn test_sacrifice_overrides_weights() {
        let mut battle = state(
            vec![unit(1, Side::Player, 0)],
            vec![unit(1001, Side::Enemy, 0), unit(5002, Side::Enemy, 4)],
            BattleRandom::fixed(0.0),
        );
        battle.enemies[1].counters.sacrifice = true;
        assert_eq!(pick_offensive(&mut battle, ActorRef::player(0)), Some(ActorRef::enemy(1)));
        assert_eq!(battle.rng.draws(), 0);
    }

    #[test]
    fn test_heal_target_is_most_wounded() {
        let mut hurt = unit(2, Side::Player, 1);
        hurt.current_hp = 5;
        let mut scratched = unit(3, Side::Player, 2);
        scratched.current_hp = 18;
        let battle = state(
            vec![unit(1, Side::Player, 0), hurt, scratched],
            vec![unit(1001, Side::Enemy, 0)],
            BattleRandom::fixed(0.0),
        );
        assert_eq!(pick_heal_target(&battle, ActorRef::player(0)), Some(ActorRef::player(1)));
    }

    #[test]
    fn test_cover_redirects_rear_target() {
        let mut guardian = unit(1, Side::Player, 0);
        guardian.effects.combat.cover_percent = 100.0;
        let mut battle = state(
            vec![guardian, unit(2, Side::Player, 4)],
            vec![unit(1001, Side::Enemy, 0)],
            BattleRandom::fixed(0.0),
        );
        let mut entry = ActionEntryBuilder::new(1001, 1, ActionKind::PhysicalAttack);
        assert_eq!(resolve_cover(&mut battle, ActorRef::player(1), &mut entry), ActorRef::player(0));
        // Front-row targets are never covered.
        assert_eq!(resolve_cover(&mut battle, ActorRef::player(0), &mut entry), ActorRef::player(0));
        assert_eq!(entry.build().count(EffectKind::Covered), 1);
    }

    #[test]
    fn test_cover_skips_middle_row_targets() {
        let mut guardian = unit(1, Side::Player, 0);
        guardian.effects.combat.cover_percent = 100.0;
        let mut battle = state(
            vec![guardian, unit(2, Side::Player, 2)],
            vec![unit(1001, Side::Enemy, 0)],
            BattleRandom::fixed(0.0),
        );
        let mut entry = ActionEntryBuilder::new(1001, 1, ActionKind::PhysicalAttack);
        assert_eq!(resolve_cover(&mut battle, ActorRef::player(1), &mut entry), ActorRef::player(1));
        assert_eq!(entry.build().count(EffectKind::Covered), 0);
    }

    #[test]
    fn test_coverers_roll_in_slot_order() {
        // Roster order puts the slot 1 guard first; slot 0 still rolls first.
        let mut right = unit(1, Side::Player, 1);
        right.effects.combat.cover_percent = 50.0;
        let mut left = unit(2, Side::Player, 0);
        left.effects.combat.cover_percent = 50.0;
        let mut battle = state(
            vec![right, left, unit(3, Side::Player, 5)],
            vec![unit(1001, Side::Enemy, 0)],
            BattleRandom::fixed(0.0),
        );
        let mut entry = ActionEntryBuilder::new(1001, 1, ActionKind::PhysicalAttack);
        assert_eq!(resolve_cover(&mut battle, ActorRef::player(2), &mut entry), ActorRef::player(1));
        assert_eq!(battle.rng.draws(), 1);
    }

    #[test]
    fn test_confused_never_picks_self() {
        let mut battle = state(
            vec![unit(1, Side::Player, 0)],
            vec![unit(1001, Side::Enemy, 0)],
            BattleRandom::fixed(0.0),
        );
        assert_eq!(pick_confused(&mut battle, ActorRef::player(0)), Some(ActorRef::enemy(0)));
    }
}

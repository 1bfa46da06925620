use crate::actor::{Actor, AppliedStatus};
use crate::battle::random::BattleRandom;
use schema::{BattleDefinitions, StatusDefinition};

/// Result of trying to put a status on an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    Applied,
    /// Already present; the remaining duration was extended if the new one is longer.
    Refreshed,
    Resisted,
}

/// Effective chance after the target's resistance multiplier for this status.
pub fn application_chance(target: &Actor, status_id: u8, base_chance: f64) -> f64 {
    let resistance = target
        .effects
        .combat
        .status_resistance
        .get(&status_id)
        .copied()
        .unwrap_or(1.0);
    (base_chance * resistance).clamp(0.0, 100.0)
}

/// Roll for and apply a status. Statuses of the same id never stack.
pub fn try_apply_status(
    target: &mut Actor,
    status: &StatusDefinition,
    base_chance: f64,
    rng: &mut BattleRandom,
) -> StatusOutcome {
    if !target.is_alive() {
        return StatusOutcome::Resisted;
    }
    let chance = application_chance(target, status.id, base_chance);
    if !rng.percent_chance(chance) {
        return StatusOutcome::Resisted;
    }
    match target.statuses.iter_mut().find(|s| s.status_id == status.id) {
        Some(existing) => {
            existing.remaining_turns = existing.remaining_turns.max(status.duration);
            StatusOutcome::Refreshed
        }
        None => {
            target.statuses.push(AppliedStatus {
                status_id: status.id,
                remaining_turns: status.duration,
            });
            StatusOutcome::Applied
        }
    }
}

/// First active status that prevents the actor from acting.
pub fn action_lock(actor: &Actor, definitions: &BattleDefinitions) -> Option<u8> {
    actor
        .statuses
        .iter()
        .find(|s| definitions.status(s.status_id).is_some_and(|d| d.locks_action))
        .map(|s| s.status_id)
}

pub fn is_confused(actor: &Actor, definitions: &BattleDefinitions) -> bool {
    actor
        .statuses
        .iter()
        .any(|s| definitions.status(s.status_id).is_some_and(|d| d.confuses))
}

/// Sum of action-slot changes from active statuses.
pub fn status_action_delta(actor: &Actor, definitions: &BattleDefinitions) -> i32 {
    actor
        .statuses
        .iter()
        .filter_map(|s| definitions.status(s.status_id))
        .map(|d| d.action_delta as i32)
        .sum()
}

/// Drop statuses that end when the bearer takes damage. Returns the removed ids.
pub fn wake_on_damage(actor: &mut Actor, definitions: &BattleDefinitions) -> Vec<u8> {
    let mut removed = Vec::new();
    actor.statuses.retain(|s| {
        let wears_off = definitions
            .status(s.status_id)
            .is_some_and(|d| d.wears_off_on_damage);
        if wears_off {
            removed.push(s.status_id);
        }
        !wears_off
    });
    removed
}

/// HP lost at end of turn to a status, at least 1 when the status ticks at all.
pub fn tick_damage(actor: &Actor, status: &StatusDefinition) -> u32 {
    if status.tick_damage_percent <= 0.0 {
        return 0;
    }
    let raw = (actor.snapshot.max_hp as f64 * status.tick_damage_percent / 100.0).floor() as u32;
    raw.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{CombatSnapshot, Side};

    fn poison() -> StatusDefinition {
        StatusDefinition {
            id: 1,
            name: "Poison".to_string(),
            duration: 3,
            locks_action: false,
            confuses: false,
            tick_damage_percent: 10.0,
            action_delta: 0,
            wears_off_on_damage: false,
            recovery_chance: 0.0,
        }
    }

    fn sleep() -> StatusDefinition {
        StatusDefinition {
            id: 2,
            name: "Sleep".to_string(),
            duration: 2,
            locks_action: true,
            wears_off_on_damage: true,
            ..poison()
        }
    }

    fn target() -> Actor {
        Actor::new(
            1,
            "Target",
            Side::Player,
            0,
            CombatSnapshot {
                max_hp: 55,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_reapplication_refreshes_to_longer_duration() {
        let mut rng = BattleRandom::fixed(0.0);
        let mut actor = target();
        assert_eq!(try_apply_status(&mut actor, &poison(), 100.0, &mut rng), StatusOutcome::Applied);
        actor.statuses[0].remaining_turns = 1;
        assert_eq!(try_apply_status(&mut actor, &poison(), 100.0, &mut rng), StatusOutcome::Refreshed);
        assert_eq!(actor.statuses.len(), 1);
        assert_eq!(actor.statuses[0].remaining_turns, 3);
    }

    #[test]
    fn test_immunity_skips_the_roll() {
        let mut rng = BattleRandom::fixed(0.0);
        let mut actor = target();
        actor.effects.combat.status_resistance.insert(1, 0.0);
        assert_eq!(try_apply_status(&mut actor, &poison(), 100.0, &mut rng), StatusOutcome::Resisted);
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn test_locks_and_wake_up() {
        let defs = BattleDefinitions::new().with_status(poison()).with_status(sleep());
        let mut rng = BattleRandom::fixed(0.0);
        let mut actor = target();
        try_apply_status(&mut actor, &poison(), 100.0, &mut rng);
        assert_eq!(action_lock(&actor, &defs), None);
        try_apply_status(&mut actor, &sleep(), 100.0, &mut rng);
        assert_eq!(action_lock(&actor, &defs), Some(2));
        assert_eq!(wake_on_damage(&mut actor, &defs), vec![2]);
        assert_eq!(action_lock(&actor, &defs), None);
        assert!(actor.has_status(1));
    }

    #[test]
    fn test_tick_damage_floor() {
        let actor = target();
        assert_eq!(tick_damage(&actor, &poison()), 5);
        let mut scratch = poison();
        scratch.tick_damage_percent = 0.1;
        assert_eq!(tick_damage(&actor, &scratch), 1);
    }
}

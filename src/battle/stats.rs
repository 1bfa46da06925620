use crate::actor::Actor;
use crate::scenario::BattleConfig;
use schema::{BuffStat, FormationRow, RowProfile};

/// Row multipliers, indexed front / middle / back.
const NEAR: [f64; 3] = [1.0, 0.85, 0.72];
const NEAR_APT: [f64; 3] = [1.28, 1.0, 0.85];
const FAR: [f64; 3] = [0.72, 0.85, 1.0];
const FAR_APT: [f64; 3] = [0.85, 1.0, 1.28];
const MIXED: [f64; 3] = [1.0, 1.0, 1.0];
const BALANCED: [f64; 3] = [0.9, 0.9, 0.9];

pub const DEGRADATION_CAP: f64 = 50.0;

/// Physical damage multiplier for attacking from `row` with the given profile.
pub fn row_multiplier(profile: RowProfile, aptitude: bool, row: FormationRow) -> f64 {
    let table = match (profile, aptitude) {
        (RowProfile::Near, false) => &NEAR,
        (RowProfile::Near, true) => &NEAR_APT,
        (RowProfile::Far, false) => &FAR,
        (RowProfile::Far, true) => &FAR_APT,
        (RowProfile::Mixed, _) => &MIXED,
        (RowProfile::Balanced, _) => &BALANCED,
    };
    table[row.index()]
}

pub fn effective_physical_attack(actor: &Actor) -> f64 {
    actor.snapshot.physical_attack as f64 * actor.buff_multiplier(BuffStat::PhysicalAttack)
}

pub fn effective_magical_attack(actor: &Actor) -> f64 {
    actor.snapshot.magical_attack as f64 * actor.buff_multiplier(BuffStat::MagicalAttack)
}

/// Defense after buffs and accumulated degradation.
pub fn effective_physical_defense(actor: &Actor) -> f64 {
    actor.snapshot.physical_defense as f64
        * actor.buff_multiplier(BuffStat::PhysicalDefense)
        * degradation_factor(actor)
}

pub fn effective_magical_defense(actor: &Actor) -> f64 {
    actor.snapshot.magical_defense as f64
        * actor.buff_multiplier(BuffStat::MagicalDefense)
        * degradation_factor(actor)
}

pub fn effective_agility(actor: &Actor) -> f64 {
    actor.attributes.agility as f64 * actor.buff_multiplier(BuffStat::Agility)
}

fn degradation_factor(actor: &Actor) -> f64 {
    1.0 - actor.counters.degradation.clamp(0.0, DEGRADATION_CAP) / 100.0
}

/// Degradation after one more hit, following the three-tier curve.
pub fn degrade(current: f64) -> f64 {
    let step = if current < 10.0 {
        2.0
    } else if current < 30.0 {
        1.0
    } else {
        0.3
    };
    (current + step).min(DEGRADATION_CAP)
}

/// Degradation left after defending with the given repair fraction.
pub fn repair(current: f64, fraction: f64) -> f64 {
    (current * (1.0 - fraction.clamp(0.0, 1.0))).max(0.0)
}

/// Damage-taken adjustment by level gap, when the defender's table enables it.
pub fn level_adjustment(attacker: &Actor, defender: &Actor) -> f64 {
    if !defender.effects.damage.level_difference_scaling {
        return 1.0;
    }
    let gap = attacker.level as f64 - defender.level as f64;
    1.0 + (gap * 0.01).clamp(-0.3, 0.3)
}

/// Product of the attacker's HP-threshold multipliers that are currently met.
pub fn hp_threshold_multiplier(attacker: &Actor) -> f64 {
    let hp = attacker.hp_percent();
    attacker
        .effects
        .damage
        .hp_threshold_dealt
        .iter()
        .filter(|m| hp <= m.hp_below_percent)
        .map(|m| m.multiplier)
        .product()
}

pub fn race_multiplier(attacker: &Actor, defender: &Actor) -> f64 {
    attacker
        .effects
        .damage
        .race_dealt
        .get(&defender.race)
        .copied()
        .unwrap_or(1.0)
}

/// `[min, max]` hit chance for attacks against `defender`.
pub fn hit_bounds(defender: &Actor, config: &BattleConfig) -> (f64, f64) {
    let combat = &defender.effects.combat;
    let max = match combat.dodge_cap_percent {
        Some(cap) => config.max_hit_chance.min(1.0 - cap / 100.0),
        None => config.max_hit_chance,
    }
    .clamp(0.0, 1.0);
    let min = match combat.evasion_limit_percent {
        Some(limit) => 1.0 - limit / 100.0,
        None => config.min_hit_chance,
    }
    .clamp(0.0, max);
    (min, max)
}

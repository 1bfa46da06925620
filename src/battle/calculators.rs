//! Pure damage, healing and hit formulas.
//!
//! Nothing here draws from the random stream: callers roll first and pass the
//! results in, which keeps the draw order visible in the engine.

use crate::actor::Actor;
use crate::battle::stats::{
    effective_magical_attack, effective_magical_defense, effective_physical_attack,
    effective_physical_defense, hp_threshold_multiplier, level_adjustment, race_multiplier,
    row_multiplier,
};
use crate::scenario::BattleConfig;
use schema::{BuffStat, DamageType, SpellSchool};

pub const DEFAULT_CRITICAL_MULTIPLIER: f64 = 1.5;
const FIRST_HIT_BONUS_CAP: f64 = 3.4;

/// Accuracy multiplier for the n-th hit (1-based) of a multi-hit attack.
pub fn accuracy_falloff(hit_index: u32) -> f64 {
    if hit_index <= 1 {
        1.0
    } else {
        0.6 * 0.9_f64.powi(hit_index as i32 - 2)
    }
}

/// Damage multiplier for the n-th hit (1-based). Hits one and two are full strength.
pub fn damage_falloff(hit_index: u32) -> f64 {
    if hit_index <= 2 {
        1.0
    } else {
        0.9_f64.powi(hit_index as i32 - 2)
    }
}

/// Bonus on the opening hit for every full 1000 points of attack over defense.
pub fn first_hit_bonus(surplus: f64) -> f64 {
    let steps = (surplus.max(0.0) / 1000.0).floor();
    (1.0 + 0.3 * steps).min(FIRST_HIT_BONUS_CAP)
}

/// Chance that hit `hit_index` lands, clamped into the defender's bounds.
#[allow(clippy::too_many_arguments)]
pub fn hit_chance(
    attacker: &Actor,
    defender: &Actor,
    hit_index: u32,
    accuracy_multiplier: f64,
    attacker_variance: f64,
    defender_variance: f64,
    config: &BattleConfig,
) -> f64 {
    let attack_score = attacker.snapshot.hit_rate as f64 * attacker.buff_multiplier(BuffStat::HitRate);
    let defense_score =
        defender.snapshot.evasion_rate as f64 * defender.buff_multiplier(BuffStat::EvasionRate);
    let total = attack_score + defense_score;
    let ratio = if total > 0.0 { attack_score / total } else { 1.0 };
    let variance = if defender_variance > 0.0 {
        attacker_variance / defender_variance
    } else {
        attacker_variance
    };
    let luck_delta = (attacker.attributes.luck - defender.attributes.luck) as f64 * 0.002;

    let raw = (ratio * variance + luck_delta)
        * accuracy_falloff(hit_index)
        * attacker.effects.combat.hit_multiplier
        * accuracy_multiplier;

    let (min, max) = crate::battle::stats::hit_bounds(defender, config);
    raw.clamp(min, max)
}

/// Multiplier applied to a critical hit.
pub fn critical_bonus(attacker: &Actor, defender: &Actor) -> f64 {
    let damage = &attacker.effects.damage;
    let multiplier = if damage.critical_multiplier > 0.0 {
        damage.critical_multiplier
    } else {
        DEFAULT_CRITICAL_MULTIPLIER
    };
    (1.0 + damage.critical_bonus_percent / 100.0)
        * multiplier
        * defender.effects.damage.critical_taken
        * defender.effects.damage.critical_resistance
}

/// Multipliers shared by every damage type: dealt, taken, buffs, race and level.
fn dealt_and_taken(attacker: &Actor, defender: &Actor, damage_type: DamageType) -> f64 {
    attacker.effects.damage.dealt.get(damage_type)
        * attacker.buff_multiplier(BuffStat::DamageDealt)
        * race_multiplier(attacker, defender)
        * hp_threshold_multiplier(attacker)
        * defender.effects.damage.taken.get(damage_type)
        * defender.buff_multiplier(BuffStat::DamageTaken)
        * defender.effects.damage.resistance.get(damage_type)
        * level_adjustment(attacker, defender)
}

fn floor_damage(raw: f64) -> u32 {
    if raw.is_finite() {
        (raw.floor() as u32).max(1)
    } else {
        1
    }
}

/// Per-hit parameters of a physical attack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalHit {
    /// 1-based index of the hit inside the attack.
    pub hit_index: u32,
    pub critical: bool,
    pub damage_multiplier: f64,
}

/// Damage of one physical hit before barrier absorption.
pub fn physical_damage(attacker: &Actor, defender: &Actor, hit: &PhysicalHit) -> u32 {
    // 1. Attack against defense, with defense halved on a critical.
    let attack = effective_physical_attack(attacker);
    let mut defense = effective_physical_defense(defender);
    if hit.critical {
        defense /= 2.0;
    }
    let mut damage = (attack - defense).max(1.0) + attacker.snapshot.bonus_damage as f64;

    // 2. Position in the attack sequence.
    if hit.hit_index <= 1 {
        damage *= first_hit_bonus(attack - defense);
    }
    damage *= damage_falloff(hit.hit_index);

    // 3. Formation, dealt and taken modifiers.
    let combat = &attacker.effects.combat;
    damage *= row_multiplier(combat.row_profile, combat.row_aptitude, attacker.row());
    damage *= dealt_and_taken(attacker, defender, DamageType::Physical);
    if attacker.counters.martial {
        damage *= attacker.effects.damage.martial_multiplier;
    }
    let cumulative = attacker.effects.damage.cumulative_hit_bonus_percent;
    damage *= 1.0 + cumulative * hit.hit_index.saturating_sub(1) as f64 / 100.0;
    damage *= hit.damage_multiplier;

    // 4. Critical.
    if hit.critical {
        damage *= critical_bonus(attacker, defender);
    }
    floor_damage(damage)
}

/// Damage of an offensive spell before nullify and barrier handling.
pub fn magical_damage(
    caster: &Actor,
    defender: &Actor,
    power: f64,
    school: SpellSchool,
    spell_id: Option<u16>,
    critical: bool,
) -> u32 {
    let attack = effective_magical_attack(caster);
    let defense = effective_magical_defense(defender);
    let mut damage = (attack - 0.5 * defense).max(1.0);
    damage *= power * caster.effects.damage.spell_power.get(school);
    damage *= dealt_and_taken(caster, defender, DamageType::Magical);
    if critical {
        damage *= critical_bonus(caster, defender);
    }
    if let Some(id) = spell_id {
        damage *= defender
            .effects
            .damage
            .spell_resistance
            .get(&id)
            .copied()
            .unwrap_or(1.0);
    }
    floor_damage(damage)
}

/// Breath damage. Breath never crits.
pub fn breath_damage(attacker: &Actor, defender: &Actor, power: f64) -> u32 {
    let attack = attacker.snapshot.breath_damage as f64;
    let defense = effective_magical_defense(defender);
    let damage = (attack - 0.5 * defense).max(1.0)
        * power
        * dealt_and_taken(attacker, defender, DamageType::Breath);
    floor_damage(damage)
}

/// HP restored by a healing spell.
pub fn healing_amount(
    caster: &Actor,
    target: &Actor,
    power: f64,
    school: SpellSchool,
    variance: f64,
) -> u32 {
    let amount = caster.snapshot.magical_healing as f64
        * variance
        * power
        * caster.effects.damage.spell_power.get(school)
        * caster.effects.damage.healing_dealt
        * target.effects.damage.healing_received;
    floor_damage(amount)
}

/// What softened an incoming hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absorption {
    None,
    Guard,
    Barrier,
    Defending,
}

/// Reduce `damage` by a guard or barrier charge, or by a defending stance.
///
/// Guard charges are spent before barrier charges. A charge cuts the hit to a
/// third; defending without one halves it. Never returns less than 1.
pub fn absorb(defender: &mut Actor, damage: u32, damage_type: DamageType) -> (u32, Absorption) {
    if defender.guards.consume(damage_type) {
        return ((damage / 3).max(1), Absorption::Guard);
    }
    if defender.barriers.consume(damage_type) {
        return ((damage / 3).max(1), Absorption::Barrier);
    }
    if defender.defending {
        return ((damage / 2).max(1), Absorption::Defending);
    }
    (damage, Absorption::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{CombatSnapshot, Side};
    use crate::effects::TypedCharges;
    use rstest::rstest;

    fn unit(attack: u32, defense: u32) -> Actor {
        let mut actor = Actor::new(
            1,
            "Unit",
            Side::Player,
            0,
            CombatSnapshot {
                max_hp: 100,
                physical_attack: attack,
                physical_defense: defense,
                magical_attack: attack,
                magical_defense: defense,
                hit_rate: 100,
                evasion_rate: 100,
                attack_count: 1,
                ..Default::default()
            },
        );
        actor.attributes.luck = 60;
        actor
    }

    fn single(critical: bool) -> PhysicalHit {
        PhysicalHit {
            hit_index: 1,
            critical,
            damage_multiplier: 1.0,
        }
    }

    #[rstest]
    #[case("first hit is exact", 1, 1.0, 1.0)]
    #[case("second hit", 2, 0.6, 1.0)]
    #[case("third hit", 3, 0.54, 0.9)]
    #[case("fourth hit", 4, 0.486, 0.81)]
    fn test_falloffs(
        #[case] desc: &str,
        #[case] hit_index: u32,
        #[case] accuracy: f64,
        #[case] damage: f64,
    ) {
        assert!((accuracy_falloff(hit_index) - accuracy).abs() < 1e-9, "{}", desc);
        assert!((damage_falloff(hit_index) - damage).abs() < 1e-9, "{}", desc);
    }

    #[rstest]
    #[case("below the first step", 999.0, 1.0)]
    #[case("one step", 1000.0, 1.3)]
    #[case("two steps", 2500.0, 1.6)]
    #[case("capped", 50_000.0, 3.4)]
    #[case("deficit gives no bonus", -20.0, 1.0)]
    fn test_first_hit_bonus_steps_and_cap(#[case] desc: &str, #[case] surplus: f64, #[case] expected: f64) {
        assert!((first_hit_bonus(surplus) - expected).abs() < 1e-9, "{}", desc);
    }

    #[test]
    fn test_physical_damage_floors_at_one() {
        let weak = unit(5, 0);
        let wall = unit(0, 500);
        assert_eq!(physical_damage(&weak, &wall, &single(false)), 1);
    }

    #[test]
    fn test_physical_damage_with_surplus() {
        let attacker = unit(1000, 0);
        let defender = unit(0, 0);
        assert_eq!(physical_damage(&attacker, &defender, &single(false)), 1300);
    }

    #[test]
    fn test_critical_halves_defense_and_multiplies() {
        let attacker = unit(200, 100);
        let defender = unit(0, 100);
        // (200 - 50) * 1.5
        assert_eq!(physical_damage(&attacker, &defender, &single(true)), 225);
        assert_eq!(physical_damage(&attacker, &defender, &single(false)), 100);
    }

    #[test]
    fn test_hit_chance_respects_bounds() {
        let config = BattleConfig::default();
        let attacker = unit(10, 10);
        let mut defender = unit(10, 10);
        defender.snapshot.evasion_rate = 1_000_000;
        let chance = hit_chance(&attacker, &defender, 1, 1.0, 1.0, 1.0, &config);
        assert_eq!(chance, config.min_hit_chance);

        defender.snapshot.evasion_rate = 0;
        let chance = hit_chance(&attacker, &defender, 1, 1.0, 1.0, 1.0, &config);
        assert_eq!(chance, 1.0);
    }

    #[test]
    fn test_barrier_cuts_to_a_third() {
        let mut defender = unit(0, 0);
        defender.barriers = TypedCharges {
            physical: 1,
            ..Default::default()
        };
        assert_eq!(absorb(&mut defender, 300, DamageType::Physical), (100, Absorption::Barrier));
        assert_eq!(defender.barriers.physical, 0);
        assert_eq!(absorb(&mut defender, 300, DamageType::Physical), (300, Absorption::None));
    }

    #[test]
    fn test_guard_preferred_then_defending_halves() {
        let mut defender = unit(0, 0);
        defender.guards.magical = 1;
        defender.barriers.magical = 1;
        assert_eq!(absorb(&mut defender, 90, DamageType::Magical), (30, Absorption::Guard));
        assert_eq!(defender.barriers.magical, 1);
        defender.defending = true;
        assert_eq!(absorb(&mut defender, 90, DamageType::Breath), (45, Absorption::Defending));
        assert_eq!(absorb(&mut defender, 1, DamageType::Breath), (1, Absorption::Defending));
    }

    #[test]
    fn test_healing_scales_and_floors() {
        let mut caster = unit(0, 0);
        caster.snapshot.magical_healing = 40;
        let target = unit(0, 0);
        assert_eq!(healing_amount(&caster, &target, 1.5, SpellSchool::Priest, 1.0), 60);
        caster.snapshot.magical_healing = 0;
        assert_eq!(healing_amount(&caster, &target, 1.5, SpellSchool::Priest, 1.0), 1);
    }
}

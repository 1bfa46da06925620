// Property-based checks over randomly shaped battles.
#[cfg(test)]
mod tests {
    use crate::actor::{Actor, Side};
    use crate::battle::calculators::hit_chance;
    use crate::battle::log::ActionKind;
    use crate::battle::stats::hit_bounds;
    use crate::battle::tests::common::TestActorBuilder;
    use crate::effects::TypedCharges;
    use crate::scenario::{BattleConfig, TURN_CAP};
    use crate::simulate;
    use proptest::prelude::*;
    use schema::BattleDefinitions;

    prop_compose! {
        fn combatant(id: u32, side: Side, slot: u8)(
            max_hp in 1u32..300,
            attack in 0u32..200,
            defense in 0u32..120,
            hit_rate in 0u32..100,
            evasion_rate in 0u32..100,
            attack_count in 1u8..5,
            critical_rate in 0.0f64..60.0,
            agility in 0i32..80,
            luck in 0i32..80,
            barriers in 0u32..3,
        ) -> Actor {
            TestActorBuilder::new(id, side)
                .with_slot(slot)
                .with_max_hp(max_hp)
                .with_attack(attack)
                .with_defense(defense)
                .with_agility(agility)
                .with(|a| {
                    a.snapshot.hit_rate = hit_rate;
                    a.snapshot.evasion_rate = evasion_rate;
                    a.snapshot.attack_count = attack_count;
                    a.snapshot.critical_rate = critical_rate;
                    a.attributes.luck = luck;
                    a.effects.combat.starting_barriers = TypedCharges {
                        physical: barriers,
                        ..TypedCharges::default()
                    };
                })
                .build()
        }
    }

    prop_compose! {
        fn matchup()(
            p1 in combatant(1, Side::Player, 0),
            p2 in combatant(2, Side::Player, 2),
            e1 in combatant(1001, Side::Enemy, 0),
            e2 in combatant(2001, Side::Enemy, 1),
        ) -> (Vec<Actor>, Vec<Actor>) {
            (vec![p1, p2], vec![e1, e2])
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn proptest_battle_invariants_hold(seed in any::<u64>(), (players, enemies) in matchup()) {
            let starting: Vec<u32> = players
                .iter()
                .chain(enemies.iter())
                .map(|a| a.effects.combat.starting_barriers.physical)
                .collect();
            let report = simulate(players, enemies, BattleDefinitions::new(), seed, BattleConfig::default())
                .expect("generated rosters are valid");

            prop_assert!(report.log.total_turns <= TURN_CAP);
            for actor in report.players.iter().chain(report.enemies.iter()) {
                prop_assert!(actor.current_hp <= actor.snapshot.max_hp);
            }
            let finals: Vec<u32> = report
                .players
                .iter()
                .chain(report.enemies.iter())
                .map(|a| a.barriers.physical)
                .collect();
            for (after, before) in finals.iter().zip(starting.iter()) {
                prop_assert!(after <= before);
            }

            let last = report.log.entries.last().map(|e| e.declaration.kind);
            prop_assert!(matches!(
                last,
                Some(ActionKind::Victory | ActionKind::Defeat | ActionKind::Retreat)
            ));
            if last == Some(ActionKind::Victory) {
                prop_assert!(report.enemies.iter().all(|a| !a.is_alive()));
            }
            if last == Some(ActionKind::Defeat) {
                prop_assert!(report.players.iter().all(|a| !a.is_alive()));
            }
        }

        #[test]
        fn proptest_same_seed_same_log(seed in any::<u64>(), (players, enemies) in matchup()) {
            let run = |players: Vec<Actor>, enemies: Vec<Actor>| {
                simulate(players, enemies, BattleDefinitions::new(), seed, BattleConfig::default())
                    .expect("generated rosters are valid")
                    .log
                    .to_bytes()
                    .expect("log should encode")
            };
            let first = run(players.clone(), enemies.clone());
            let second = run(players, enemies);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn proptest_hit_chance_stays_in_bounds(
            attacker in combatant(1, Side::Player, 0),
            defender in combatant(1001, Side::Enemy, 0),
            hit_index in 1u32..8,
            attacker_variance in 0.4f64..1.0,
            defender_variance in 0.4f64..1.0,
            dodge_cap in proptest::option::of(0.0f64..100.0),
            evasion_limit in proptest::option::of(0.0f64..100.0),
        ) {
            let mut defender = defender;
            defender.effects.combat.dodge_cap_percent = dodge_cap;
            defender.effects.combat.evasion_limit_percent = evasion_limit;
            let config = BattleConfig::default();

            let chance = hit_chance(
                &attacker,
                &defender,
                hit_index,
                1.0,
                attacker_variance,
                defender_variance,
                &config,
            );
            let (min, max) = hit_bounds(&defender, &config);
            prop_assert!(min <= max);
            prop_assert!(chance >= min && chance <= max);
            prop_assert!((0.0..=1.0).contains(&chance));
        }
    }
}

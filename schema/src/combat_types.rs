use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// The three damage channels an attack can travel through.
/// Barriers, guards, dealt and taken multipliers are all keyed by this.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
pub enum DamageType {
    Physical,
    Magical,
    Breath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum SpellSchool {
    Priest,
    Mage,
}

/// The six base attributes every combatant carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum Attribute {
    Strength,
    Wisdom,
    Spirit,
    Vitality,
    Agility,
    Luck,
}

/// Formation row derived from a formation slot (two slots per row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
pub enum FormationRow {
    Front,
    Middle,
    Back,
}

impl FormationRow {
    pub fn from_slot(slot: u8) -> Self {
        match slot / 2 {
            0 => FormationRow::Front,
            1 => FormationRow::Middle,
            _ => FormationRow::Back,
        }
    }

    pub fn index(self) -> usize {
        match self {
            FormationRow::Front => 0,
            FormationRow::Middle => 1,
            FormationRow::Back => 2,
        }
    }
}

/// Which rows a combatant's physical attacks are tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
pub enum RowProfile {
    #[default]
    Near,
    Far,
    Mixed,
    Balanced,
}

/// Stats a timed buff can scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum BuffStat {
    PhysicalAttack,
    MagicalAttack,
    PhysicalDefense,
    MagicalDefense,
    Agility,
    HitRate,
    EvasionRate,
    DamageDealt,
    DamageTaken,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_rows_from_slots() {
        assert_eq!(FormationRow::from_slot(0), FormationRow::Front);
        assert_eq!(FormationRow::from_slot(1), FormationRow::Front);
        assert_eq!(FormationRow::from_slot(2), FormationRow::Middle);
        assert_eq!(FormationRow::from_slot(5), FormationRow::Back);
        // Out-of-range slots collapse into the back row rather than panicking.
        assert_eq!(FormationRow::from_slot(9), FormationRow::Back);
    }

    #[test]
    fn test_damage_type_iteration_is_stable() {
        let order: Vec<DamageType> = DamageType::iter().collect();
        assert_eq!(
            order,
            vec![DamageType::Physical, DamageType::Magical, DamageType::Breath]
        );
        assert_eq!(DamageType::Breath.to_string(), "Breath");
    }
}

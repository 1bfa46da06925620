use crate::actor::Side;

/// Main error type for the party battle engine.
///
/// Battle resolution itself never fails; these errors only surface while a
/// battle is being set up or while its inputs are being loaded.
#[derive(Debug, thiserror::Error)]
pub enum BattleEngineError {
    /// The rosters or configuration handed to the engine are unusable
    #[error("Battle setup error: {0}")]
    Setup(#[from] SetupError),
    /// A scenario file could not be read or parsed
    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),
}

/// Errors raised while constructing a `BattleState`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    /// One side has no combatants at all
    #[error("The {0:?} roster is empty")]
    EmptyRoster(Side),
    /// Two combatants share a log id, which would make the log ambiguous
    #[error("Duplicate actor id {0}")]
    DuplicateActorId(u32),
    /// A combatant starts with more HP than its maximum
    #[error("Actor {id} starts with {current_hp} HP above its maximum of {max_hp}")]
    HpAboveMaximum { id: u32, current_hp: u32, max_hp: u32 },
    /// The configured turn cap is outside 1..=20
    #[error("Turn cap {0} is outside the supported range 1..=20")]
    InvalidTurnCap(u32),
}

/// Errors raised while loading a scenario description
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Could not read scenario file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed scenario data: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Failure reported by an external skill compiler.
///
/// The engine treats this as "no change" when it happens mid-battle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkillCompileError {
    #[error("Unknown skill id {0}")]
    UnknownSkill(u16),
    #[error("Skill set rejected: {0}")]
    Rejected(String),
}

/// Type alias for Results using BattleEngineError
pub type BattleResult<T> = Result<T, BattleEngineError>;

/// Type alias for Results using SetupError
pub type SetupResult<T> = Result<T, SetupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_errors_convert_into_engine_error() {
        let err: BattleEngineError = SetupError::EmptyRoster(Side::Enemy).into();
        assert_eq!(
            err.to_string(),
            "Battle setup error: The Enemy roster is empty"
        );
    }

    #[test]
    fn test_turn_cap_message() {
        assert_eq!(
            SetupError::InvalidTurnCap(25).to_string(),
            "Turn cap 25 is outside the supported range 1..=20"
        );
    }
}

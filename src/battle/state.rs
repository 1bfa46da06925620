use crate::actor::{Actor, ActorRef, Side};
use crate::battle::log::{ActionLogEntry, BattleLog};
use crate::battle::random::BattleRandom;
use crate::battle::reactions::PendingReaction;
use crate::effects::SkillCompiler;
use crate::errors::{SetupError, SetupResult};
use crate::scenario::BattleConfig;
use ordered_float::OrderedFloat;
use schema::BattleDefinitions;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// How a battle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattleOutcome {
    Victory,
    Defeat,
    Retreat,
}

impl BattleOutcome {
    /// Stable numeric code used by downstream consumers.
    pub fn code(self) -> u8 {
        match self {
            BattleOutcome::Victory => 0,
            BattleOutcome::Defeat => 1,
            BattleOutcome::Retreat => 2,
        }
    }
}

impl fmt::Display for BattleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BattleOutcome::Victory => "victory",
            BattleOutcome::Defeat => "defeat",
            BattleOutcome::Retreat => "retreat",
        };
        write!(f, "{}", label)
    }
}

/// Speed and tiebreak an actor drew for the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct OrderKey {
    pub speed: i64,
    pub tiebreak: OrderedFloat<f64>,
}

/// Per-turn cache of each actor's best order key, reused to sort reactions.
#[derive(Debug, Clone, Default)]
pub struct OrderSnapshot {
    keys: BTreeMap<ActorRef, OrderKey>,
}

impl OrderSnapshot {
    /// Keep the highest speed and highest tiebreak seen for an actor.
    pub fn record(&mut self, actor: ActorRef, speed: i64, tiebreak: f64) {
        let entry = self.keys.entry(actor).or_default();
        entry.speed = entry.speed.max(speed);
        entry.tiebreak = entry.tiebreak.max(OrderedFloat(tiebreak));
    }

    /// Actors that did not draw this turn sort last.
    pub fn key(&self, actor: ActorRef) -> OrderKey {
        self.keys.get(&actor).copied().unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}

/// Everything the engine owns while a battle runs.
pub struct BattleState {
    pub players: Vec<Actor>,
    pub enemies: Vec<Actor>,
    pub rng: BattleRandom,
    pub turn: u32,
    pub log: BattleLog,
    pub reactions: VecDeque<PendingReaction>,
    pub order: OrderSnapshot,
    pub definitions: BattleDefinitions,
    pub config: BattleConfig,
    pub outcome: Option<BattleOutcome>,
    reaction_seq: u64,
    compiler: Option<Box<dyn SkillCompiler>>,
}

impl fmt::Debug for BattleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BattleState")
            .field("players", &self.players)
            .field("enemies", &self.enemies)
            .field("turn", &self.turn)
            .field("outcome", &self.outcome)
            .field("has_compiler", &self.compiler.is_some())
            .finish()
    }
}

impl BattleState {
    /// Validate the rosters and assemble a battle ready to run.
    pub fn new(
        players: Vec<Actor>,
        enemies: Vec<Actor>,
        definitions: BattleDefinitions,
        rng: BattleRandom,
        config: BattleConfig,
    ) -> SetupResult<Self> {
        // 1. Structural checks on the inputs.
        config.validate()?;
        if players.is_empty() {
            return Err(SetupError::EmptyRoster(Side::Player));
        }
        if enemies.is_empty() {
            return Err(SetupError::EmptyRoster(Side::Enemy));
        }
        let mut seen = BTreeSet::new();
        for actor in players.iter().chain(enemies.iter()) {
            if !seen.insert(actor.id) {
                return Err(SetupError::DuplicateActorId(actor.id));
            }
            if actor.current_hp > actor.snapshot.max_hp {
                return Err(SetupError::HpAboveMaximum {
                    id: actor.id,
                    current_hp: actor.current_hp,
                    max_hp: actor.snapshot.max_hp,
                });
            }
        }

        // 2. Normalize sides and load the starting charge counters.
        let prepare = |mut actor: Actor, side: Side| {
            actor.side = side;
            actor.arm_starting_charges();
            actor
        };
        let players = players.into_iter().map(|a| prepare(a, Side::Player)).collect();
        let enemies = enemies.into_iter().map(|a| prepare(a, Side::Enemy)).collect();

        Ok(Self {
            players,
            enemies,
            rng,
            turn: 0,
            log: BattleLog::new(),
            reactions: VecDeque::new(),
            order: OrderSnapshot::default(),
            definitions,
            config,
            outcome: None,
            reaction_seq: 0,
            compiler: None,
        })
    }

    /// Attach the collaborator used when a revival rewrites a skill set.
    pub fn with_compiler(mut self, compiler: Box<dyn SkillCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn compiler(&self) -> Option<&dyn SkillCompiler> {
        self.compiler.as_deref()
    }

    pub fn roster(&self, side: Side) -> &[Actor] {
        match side {
            Side::Player => &self.players,
            Side::Enemy => &self.enemies,
        }
    }

    pub fn actor(&self, actor: ActorRef) -> Option<&Actor> {
        self.roster(actor.side).get(actor.index)
    }

    /// Read a copy of an actor for local mutation.
    pub fn snapshot(&self, actor: ActorRef) -> Option<Actor> {
        self.actor(actor).cloned()
    }

    /// Write a mutated copy back into its roster slot. Stale handles are ignored.
    pub fn store(&mut self, actor: ActorRef, value: Actor) {
        let roster = match actor.side {
            Side::Player => &mut self.players,
            Side::Enemy => &mut self.enemies,
        };
        if let Some(slot) = roster.get_mut(actor.index) {
            *slot = value;
        }
    }

    /// Read, mutate and write back one actor. Returns `None` for a stale handle.
    pub fn update<R>(&mut self, actor: ActorRef, f: impl FnOnce(&mut Actor) -> R) -> Option<R> {
        let mut copy = self.snapshot(actor)?;
        let result = f(&mut copy);
        self.store(actor, copy);
        Some(result)
    }

    pub fn actor_id(&self, actor: ActorRef) -> u32 {
        self.actor(actor).map_or(0, |a| a.id)
    }

    pub fn refs(&self, side: Side) -> impl Iterator<Item = ActorRef> + '_ {
        (0..self.roster(side).len()).map(move |index| ActorRef::new(side, index))
    }

    /// Players first, then enemies, each in roster order.
    pub fn all_refs(&self) -> Vec<ActorRef> {
        self.refs(Side::Player).chain(self.refs(Side::Enemy)).collect()
    }

    /// Alive and not withdrawn, in roster order.
    pub fn active(&self, side: Side) -> Vec<ActorRef> {
        self.refs(side)
            .filter(|r| self.actor(*r).is_some_and(Actor::is_active))
            .collect()
    }

    pub fn is_active(&self, actor: ActorRef) -> bool {
        self.actor(actor).is_some_and(Actor::is_active)
    }

    pub fn push_entry(&mut self, entry: ActionLogEntry) {
        self.log.push(entry);
    }

    pub fn next_reaction_seq(&mut self) -> u64 {
        self.reaction_seq += 1;
        self.reaction_seq
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }
}

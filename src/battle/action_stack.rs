use std::collections::VecDeque;

use crate::actor::ActorRef;
use crate::battle::conditions::status_action_delta;
use crate::battle::state::BattleState;
use crate::battle::stats::effective_agility;
use tracing::debug;

/// Upper bound of the speed reroll used by order-shuffle actors.
const SHUFFLE_SPEED_MAX: i64 = 10_000;

/// A unit of work for the turn loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledAction {
    /// A regular action slot from the turn order.
    Turn(ActorRef),
    /// A skill-granted extra action. It never grants further extra actions.
    Extra(ActorRef),
}

impl ScheduledAction {
    pub fn actor(self) -> ActorRef {
        match self {
            ScheduledAction::Turn(actor) | ScheduledAction::Extra(actor) => actor,
        }
    }
}

/// The turn's remaining work, front first.
#[derive(Debug, Default)]
pub struct ActionStack {
    actions: VecDeque<ScheduledAction>,
}

// One action slot with the draws that place it in the order.
#[derive(Debug, Clone, Copy)]
struct OrderSlot {
    actor: ActorRef,
    first_strike: bool,
    speed: i64,
    tiebreak: f64,
}

impl ActionStack {
    /// Creates a new, empty ActionStack.
    pub fn new() -> Self {
        Self {
            actions: VecDeque::new(),
        }
    }

    /// Draw this turn's order and cache each actor's key for the reaction system.
    pub fn build_for_turn(state: &mut BattleState) -> Self {
        let mut stack = Self::new();
        for actor in Self::determine_action_order(state) {
            stack.push_back(ScheduledAction::Turn(actor));
        }
        stack
    }

    /// Adds an action to the end of the execution queue.
    pub fn push_back(&mut self, action: ScheduledAction) {
        self.actions.push_back(action);
    }

    /// Adds an action to the front of the execution queue, to be executed next.
    pub fn push_front(&mut self, action: ScheduledAction) {
        self.actions.push_front(action);
    }

    /// Removes and returns the next action to be executed from the front of the queue.
    pub fn pop_front(&mut self) -> Option<ScheduledAction> {
        self.actions.pop_front()
    }

    /// Number of slots an actor gets this turn, never fewer than one.
    pub fn slot_count(state: &BattleState, actor: ActorRef) -> u32 {
        let Some(a) = state.actor(actor) else { return 0 };
        let extra = a.effects.combat.next_turn_extra_actions as i32
            + status_action_delta(a, &state.definitions)
            + a.buff_action_delta();
        (1 + extra).max(1) as u32
    }

    fn determine_action_order(state: &mut BattleState) -> Vec<ActorRef> {
        state.order.clear();
        let mut slots = Vec::new();

        // 1. Each active actor draws speed then tiebreak, once per slot.
        for actor in state.all_refs() {
            let Some(a) = state.actor(actor) else { continue };
            if !a.is_active() {
                continue;
            }
            let combat = &a.effects.combat;
            let (first_strike, shuffle, multiplier) =
                (combat.first_strike, combat.order_shuffle, combat.order_multiplier);
            let agility = effective_agility(a);
            let luck = a.attributes.luck;

            for _ in 0..Self::slot_count(state, actor) {
                let speed = if shuffle {
                    state.rng.next_int(1, SHUFFLE_SPEED_MAX)
                } else {
                    (agility * state.rng.stat_variance(luck) * multiplier).trunc() as i64
                };
                let tiebreak = state.rng.next_unit();
                state.order.record(actor, speed, tiebreak);
                slots.push(OrderSlot {
                    actor,
                    first_strike,
                    speed,
                    tiebreak,
                });
            }
        }

        // 2. First strike, then speed, then tiebreak. Stable for exact ties.
        slots.sort_by(|a, b| {
            b.first_strike
                .cmp(&a.first_strike)
                .then_with(|| b.speed.cmp(&a.speed))
                .then_with(|| b.tiebreak.total_cmp(&a.tiebreak))
        });
        debug!(
            turn = state.turn,
            order = ?slots.iter().map(|s| (s.actor, s.speed)).collect::<Vec<_>>(),
            "action order"
        );
        slots.into_iter().map(|s| s.actor).collect()
    }
}

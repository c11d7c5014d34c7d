use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, warn};

use brainstem_core::{
    BrainError, Result, StateMachineSnapshot, StateTransitionEvent, Timestamp, TransitionReason,
    TransitionRecord,
};

use super::bindings::{Bindings, Condition, StateCallback, StateHook};
use super::config::{GraphDefinition, StateDefinition, TransitionMode};
use super::evaluator::time_elapsed;

const DEFAULT_HISTORY_LIMIT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StateId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MachineId(usize);

const ROOT: MachineId = MachineId(0);

struct Slot<F> {
    func: F,
    faulted: bool,
}

impl<F> Slot<F> {
    fn new(func: F) -> Self {
        Self {
            func,
            faulted: false,
        }
    }
}

struct StateNode<C> {
    name: String,
    parent: Option<StateId>,
    parent_machine: MachineId,
    sub_machine: Option<MachineId>,
    transitions: Vec<usize>,
    enter: Option<Slot<StateCallback<C>>>,
    during: Option<Slot<StateCallback<C>>>,
    exit: Option<Slot<StateCallback<C>>>,
    last_enter: Option<Timestamp>,
}

impl<C> StateNode<C> {
    fn hook_mut(&mut self, hook: StateHook) -> Option<&mut Slot<StateCallback<C>>> {
        match hook {
            StateHook::Enter => self.enter.as_mut(),
            StateHook::During => self.during.as_mut(),
            StateHook::Exit => self.exit.as_mut(),
        }
    }

    fn hook(&self, hook: StateHook) -> Option<&Slot<StateCallback<C>>> {
        match hook {
            StateHook::Enter => self.enter.as_ref(),
            StateHook::During => self.during.as_ref(),
            StateHook::Exit => self.exit.as_ref(),
        }
    }
}

/// One nesting level: the root, or the children of one state.
#[derive(Debug)]
struct SubMachine {
    current: Option<StateId>,
    default: StateId,
}

struct TransitionNode<C> {
    from: StateId,
    to: StateId,
    mode: TransitionMode,
    min_elapsed: Duration,
    condition: Option<Slot<Condition<C>>>,
    notify: Option<Slot<StateCallback<C>>>,
    last_taken: Option<Timestamp>,
}

/// Hierarchical state machine driven by one [`StateMachine::step`] per tick.
///
/// `C` is the context handed to every callback, typically the entity's
/// channel registry plus whatever the host needs.
pub struct StateMachine<C> {
    states: Vec<StateNode<C>>,
    machines: Vec<SubMachine>,
    transitions: Vec<TransitionNode<C>>,
    by_name: HashMap<String, StateId>,
    resume_history: bool,
    started: bool,
    clock: Timestamp,
    history: VecDeque<StateTransitionEvent>,
    history_limit: usize,
}

impl<C> StateMachine<C> {
    pub fn new(definition: GraphDefinition, bindings: Bindings<C>) -> Result<Self> {
        definition.validate()?;
        let mut bindings = bindings;

        let by_name: HashMap<String, StateId> = definition
            .states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), StateId(i)))
            .collect();
        let id_of = |name: &str| -> Result<StateId> {
            by_name
                .get(name)
                .copied()
                .ok_or_else(|| BrainError::InvalidGraph(format!("unknown state '{}'", name)))
        };

        let root_default = definition
            .default_of(None)
            .ok_or_else(|| BrainError::InvalidGraph("graph has no root-level state".into()))?;
        let mut machines = vec![SubMachine {
            current: None,
            default: id_of(root_default)?,
        }];
        let mut sub_of: HashMap<&str, MachineId> = HashMap::new();
        for state in &definition.states {
            if let Some(child) = definition.default_of(Some(&state.name)) {
                sub_of.insert(state.name.as_str(), MachineId(machines.len()));
                machines.push(SubMachine {
                    current: None,
                    default: id_of(child)?,
                });
            }
        }

        let mut states = Vec::with_capacity(definition.states.len());
        for state in &definition.states {
            let (parent, parent_machine) = match state.parent.as_deref() {
                Some(p) => {
                    let machine = sub_of.get(p).copied().ok_or_else(|| {
                        BrainError::InvalidGraph(format!("parent '{}' has no sub-machine", p))
                    })?;
                    (Some(id_of(p)?), machine)
                }
                None => (None, ROOT),
            };
            states.push(StateNode {
                name: state.name.clone(),
                parent,
                parent_machine,
                sub_machine: sub_of.get(state.name.as_str()).copied(),
                transitions: Vec::new(),
                enter: take_hook(&mut bindings, state, StateHook::Enter, state.has_enter)?,
                during: take_hook(&mut bindings, state, StateHook::During, state.has_during)?,
                exit: take_hook(&mut bindings, state, StateHook::Exit, state.has_exit)?,
                last_enter: None,
            });
        }

        let mut transitions = Vec::with_capacity(definition.transitions.len());
        for t in &definition.transitions {
            let key = (t.from.clone(), t.to.clone());

            let condition = bindings.conditions.remove(&key);
            match (t.mode.uses_condition(), condition.is_some()) {
                (true, false) => {
                    return Err(BrainError::InvalidGraph(format!(
                        "transition '{}' -> '{}' ({:?}) needs a condition binding",
                        t.from, t.to, t.mode
                    )));
                }
                (false, true) => {
                    return Err(BrainError::InvalidGraph(format!(
                        "transition '{}' -> '{}' is time-only but has a condition bound",
                        t.from, t.to
                    )));
                }
                _ => {}
            }

            let notify = bindings.notifies.remove(&key);
            match (t.has_notify, notify.is_some()) {
                (true, false) => {
                    return Err(BrainError::InvalidGraph(format!(
                        "transition '{}' -> '{}' declares a notify callback but none is bound",
                        t.from, t.to
                    )));
                }
                (false, true) => {
                    return Err(BrainError::InvalidGraph(format!(
                        "notify callback bound for transition '{}' -> '{}' which does not declare it",
                        t.from, t.to
                    )));
                }
                _ => {}
            }

            let min_elapsed = Duration::try_from_secs_f64(t.min_elapsed).map_err(|e| {
                BrainError::InvalidGraph(format!(
                    "transition '{}' -> '{}': {}",
                    t.from, t.to, e
                ))
            })?;

            let from = id_of(&t.from)?;
            states[from.0].transitions.push(transitions.len());
            transitions.push(TransitionNode {
                from,
                to: id_of(&t.to)?,
                mode: t.mode,
                min_elapsed,
                condition: condition.map(Slot::new),
                notify: notify.map(Slot::new),
                last_taken: None,
            });
        }

        if let Some((state, hook)) = bindings.hooks.keys().next() {
            return Err(BrainError::InvalidGraph(format!(
                "{} callback bound for unknown state '{}'",
                hook, state
            )));
        }
        if let Some((from, to)) = bindings
            .conditions
            .keys()
            .chain(bindings.notifies.keys())
            .next()
        {
            return Err(BrainError::InvalidGraph(format!(
                "callback bound for unknown transition '{}' -> '{}'",
                from, to
            )));
        }

        debug!(
            states = states.len(),
            transitions = transitions.len(),
            levels = machines.len(),
            "Built state machine"
        );

        Ok(Self {
            states,
            machines,
            transitions,
            by_name,
            resume_history: definition.resume_history,
            started: false,
            clock: Timestamp::ZERO,
            history: VecDeque::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        })
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Runs one evaluation pass: enter on first use, during callbacks root to
    /// leaf, then the innermost passable transition, if any.
    pub fn step(&mut self, now: Timestamp, ctx: &mut C) -> Result<Option<StateTransitionEvent>> {
        self.clock = now;

        if !self.started {
            self.started = true;
            self.enter_level(ROOT, ctx);
        }

        for id in self.active_ids() {
            self.invoke_hook(id, StateHook::During, ctx);
        }

        let Some(tid) = self.find_passable(now, ctx) else {
            return Ok(None);
        };

        self.invoke_notify(tid, ctx);
        self.transitions[tid].last_taken = Some(now);
        let target = self.transitions[tid].to;
        self.switch_to(target, TransitionReason::Transition, ctx)
            .map(Some)
    }

    /// Jumps to `name` at `now` without checking conditions or calling
    /// on-taken callbacks. States entered by the jump are stamped with `now`.
    /// Unknown names and redundant jumps leave the machine untouched.
    pub fn set_active_state_by_name(
        &mut self,
        name: &str,
        now: Timestamp,
        ctx: &mut C,
    ) -> Result<()> {
        let target = self.lookup(name)?;
        let previous = self.clock;
        self.clock = now;
        match self.switch_to(target, TransitionReason::Forced, ctx) {
            Ok(_) => Ok(()),
            Err(err) => {
                self.clock = previous;
                Err(err)
            }
        }
    }

    /// Exits the active chain and returns to the uninitialized state.
    pub fn reset(&mut self, ctx: &mut C) {
        if self.started {
            self.exit_level(ROOT, ctx);
        }
        for machine in &mut self.machines {
            machine.current = None;
        }
        for state in &mut self.states {
            state.last_enter = None;
        }
        for transition in &mut self.transitions {
            transition.last_taken = None;
        }
        self.history.clear();
        self.started = false;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Time of the last step or forced jump.
    pub fn now(&self) -> Timestamp {
        self.clock
    }

    pub fn active_state_name(&self) -> Option<&str> {
        self.active_leaf().map(|id| self.states[id.0].name.as_str())
    }

    /// Active states from the root level down to the leaf.
    pub fn active_path(&self) -> Vec<&str> {
        self.active_ids()
            .into_iter()
            .map(|id| self.states[id.0].name.as_str())
            .collect()
    }

    pub fn is_state_active(&self, name: &str) -> bool {
        self.active_ids()
            .into_iter()
            .any(|id| self.states[id.0].name == name)
    }

    /// True when `name` is the remembered state of its level, or the
    /// default of a level that was never entered.
    pub fn is_state_cached(&self, name: &str) -> bool {
        let Some(&id) = self.by_name.get(name) else {
            return false;
        };
        let machine = &self.machines[self.states[id.0].parent_machine.0];
        match machine.current {
            Some(current) => current == id,
            None => machine.default == id,
        }
    }

    /// `Ok(None)` when the transition exists but was never taken.
    pub fn time_since_transition_taken(&self, from: &str, to: &str) -> Result<Option<Duration>> {
        let tid = self.find_transition(from, to)?;
        Ok(self.transitions[tid]
            .last_taken
            .map(|at| self.clock.elapsed_since(at)))
    }

    pub fn last_enter_time(&self, name: &str) -> Result<Option<Timestamp>> {
        let id = self.lookup(name)?;
        Ok(self.states[id.0].last_enter)
    }

    pub fn contains_state(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// State names in declaration order.
    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|s| s.name.as_str())
    }

    pub fn history(&self) -> Vec<StateTransitionEvent> {
        self.history.iter().cloned().collect()
    }

    /// Callbacks disabled after returning an error, as `state.hook` or
    /// `from->to.condition` / `from->to.notify`.
    pub fn faulted_callbacks(&self) -> Vec<String> {
        let mut faulted = Vec::new();
        for state in &self.states {
            for hook in [StateHook::Enter, StateHook::During, StateHook::Exit] {
                if state.hook(hook).is_some_and(|s| s.faulted) {
                    faulted.push(format!("{}.{}", state.name, hook));
                }
            }
        }
        for t in &self.transitions {
            let label = format!("{}->{}", self.states[t.from.0].name, self.states[t.to.0].name);
            if t.condition.as_ref().is_some_and(|s| s.faulted) {
                faulted.push(format!("{}.condition", label));
            }
            if t.notify.as_ref().is_some_and(|s| s.faulted) {
                faulted.push(format!("{}.notify", label));
            }
        }
        faulted
    }

    pub fn snapshot(&self) -> StateMachineSnapshot {
        StateMachineSnapshot {
            active_path: self.active_path().into_iter().map(String::from).collect(),
            cached_states: self
                .states
                .iter()
                .filter(|s| self.is_state_cached(&s.name))
                .map(|s| s.name.clone())
                .collect(),
            transitions: self
                .transitions
                .iter()
                .map(|t| TransitionRecord {
                    from: self.states[t.from.0].name.clone(),
                    to: self.states[t.to.0].name.clone(),
                    last_taken: t.last_taken,
                })
                .collect(),
            history: self.history(),
            faulted_callbacks: self.faulted_callbacks(),
        }
    }

    fn lookup(&self, name: &str) -> Result<StateId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| BrainError::UnknownState(name.to_string()))
    }

    fn find_transition(&self, from: &str, to: &str) -> Result<usize> {
        let from_id = self.lookup(from)?;
        let to_id = self.lookup(to)?;
        self.states[from_id.0]
            .transitions
            .iter()
            .copied()
            .find(|&tid| self.transitions[tid].to == to_id)
            .ok_or_else(|| BrainError::UnknownTransition {
                from: from.to_string(),
                to: to.to_string(),
            })
    }

    fn active_ids(&self) -> Vec<StateId> {
        let mut path = Vec::new();
        let mut machine = Some(ROOT);
        while let Some(m) = machine {
            let Some(id) = self.machines[m.0].current else {
                break;
            };
            path.push(id);
            machine = self.states[id.0].sub_machine;
        }
        path
    }

    fn active_leaf(&self) -> Option<StateId> {
        self.active_ids().last().copied()
    }

    fn find_passable(&mut self, now: Timestamp, ctx: &C) -> Option<usize> {
        for id in self.active_ids().into_iter().rev() {
            for k in 0..self.states[id.0].transitions.len() {
                let tid = self.states[id.0].transitions[k];
                if self.is_passable(tid, now, ctx) {
                    return Some(tid);
                }
            }
        }
        None
    }

    fn is_passable(&mut self, tid: usize, now: Timestamp, ctx: &C) -> bool {
        let t = &mut self.transitions[tid];
        let from = &self.states[t.from.0];
        let to = &self.states[t.to.0];
        let elapsed = time_elapsed(from.last_enter, now, t.min_elapsed);
        let condition = &mut t.condition;
        t.mode.is_satisfied(elapsed, || match condition {
            Some(slot) if !slot.faulted => match (slot.func)(ctx) {
                Ok(passable) => passable,
                Err(err) => {
                    slot.faulted = true;
                    warn!(
                        from = %from.name,
                        to = %to.name,
                        error = %err,
                        "Transition condition failed; disabling it"
                    );
                    false
                }
            },
            _ => false,
        })
    }

    fn invoke_hook(&mut self, id: StateId, hook: StateHook, ctx: &mut C) {
        let node = &mut self.states[id.0];
        let failure = match node.hook_mut(hook) {
            Some(slot) if !slot.faulted => match (slot.func)(ctx) {
                Ok(()) => None,
                Err(err) => {
                    slot.faulted = true;
                    Some(err)
                }
            },
            _ => None,
        };
        if let Some(err) = failure {
            warn!(
                state = %node.name,
                hook = %hook,
                error = %err,
                "State callback failed; disabling it"
            );
        }
    }

    fn invoke_notify(&mut self, tid: usize, ctx: &mut C) {
        let t = &mut self.transitions[tid];
        let failure = match t.notify.as_mut() {
            Some(slot) if !slot.faulted => match (slot.func)(ctx) {
                Ok(()) => None,
                Err(err) => {
                    slot.faulted = true;
                    Some(err)
                }
            },
            _ => None,
        };
        if let Some(err) = failure {
            warn!(
                from = %self.states[t.from.0].name,
                to = %self.states[t.to.0].name,
                error = %err,
                "Transition notify failed; disabling it"
            );
        }
    }

    fn switch_to(
        &mut self,
        target: StateId,
        reason: TransitionReason,
        ctx: &mut C,
    ) -> Result<StateTransitionEvent> {
        let from = self
            .active_state_name()
            .map(String::from);

        // Leaf first, so popping yields the root-most ancestor first.
        let mut chain = Vec::new();
        let mut cursor = Some(target);
        while let Some(id) = cursor {
            chain.push(id);
            cursor = self.states[id.0].parent;
        }

        if let Err(err) = self.transition_level(ROOT, &mut chain, ctx) {
            error!(
                target = %self.states[target.0].name,
                error = %err,
                "State switch aborted"
            );
            return Err(err);
        }
        self.started = true;

        let event = StateTransitionEvent {
            from,
            to: self
                .active_state_name()
                .map(String::from)
                .unwrap_or_default(),
            reason,
            at: self.clock,
            recorded_at: Utc::now(),
        };
        debug!(
            from = event.from.as_deref().unwrap_or("<none>"),
            to = %event.to,
            reason = ?reason,
            "State transition"
        );
        if self.history_limit > 0 {
            if self.history.len() == self.history_limit {
                self.history.pop_front();
            }
            self.history.push_back(event.clone());
        }
        Ok(event)
    }

    fn transition_level(
        &mut self,
        machine: MachineId,
        chain: &mut Vec<StateId>,
        ctx: &mut C,
    ) -> Result<()> {
        let next = chain.pop().ok_or_else(|| {
            BrainError::TransitionHierarchy("empty target chain".into())
        })?;
        self.check_level(next, machine)?;

        if self.machines[machine.0].current == Some(next) {
            let name = &self.states[next.0].name;
            if chain.is_empty() {
                return Err(BrainError::RedundantTransition(name.clone()));
            }
            let Some(sub) = self.states[next.0].sub_machine else {
                return Err(BrainError::TransitionHierarchy(format!(
                    "state '{}' has no children",
                    name
                )));
            };
            return self.transition_level(sub, chain, ctx);
        }

        self.exit_level(machine, ctx);
        chain.push(next);
        self.enter_chain(machine, chain, ctx)
    }

    fn check_level(&self, id: StateId, machine: MachineId) -> Result<()> {
        if self.states[id.0].parent_machine != machine {
            return Err(BrainError::TransitionHierarchy(format!(
                "state '{}' does not belong to the level being entered",
                self.states[id.0].name
            )));
        }
        Ok(())
    }

    fn enter_chain(
        &mut self,
        machine: MachineId,
        chain: &mut Vec<StateId>,
        ctx: &mut C,
    ) -> Result<()> {
        let Some(next) = chain.pop() else {
            self.enter_level(machine, ctx);
            return Ok(());
        };
        self.check_level(next, machine)?;

        self.machines[machine.0].current = Some(next);
        self.enter_self(next, ctx);

        match self.states[next.0].sub_machine {
            Some(sub) => self.enter_chain(sub, chain, ctx),
            None if chain.is_empty() => Ok(()),
            None => Err(BrainError::TransitionHierarchy(format!(
                "state '{}' has no children",
                self.states[next.0].name
            ))),
        }
    }

    /// Enters a level without a specific target.
    fn enter_level(&mut self, machine: MachineId, ctx: &mut C) {
        let level = &mut self.machines[machine.0];
        let target = match level.current {
            Some(remembered) if self.resume_history => remembered,
            _ => level.default,
        };
        level.current = Some(target);
        self.enter_self(target, ctx);
        if let Some(sub) = self.states[target.0].sub_machine {
            self.enter_level(sub, ctx);
        }
    }

    fn enter_self(&mut self, id: StateId, ctx: &mut C) {
        self.states[id.0].last_enter = Some(self.clock);
        debug!(state = %self.states[id.0].name, at = %self.clock, "Entering state");
        self.invoke_hook(id, StateHook::Enter, ctx);
    }

    /// Exits the active subtree of a level, deepest state first. The level
    /// keeps remembering its current state.
    fn exit_level(&mut self, machine: MachineId, ctx: &mut C) {
        if let Some(current) = self.machines[machine.0].current {
            if let Some(sub) = self.states[current.0].sub_machine {
                self.exit_level(sub, ctx);
            }
            debug!(state = %self.states[current.0].name, "Exiting state");
            self.invoke_hook(current, StateHook::Exit, ctx);
        }
    }
}

fn take_hook<C>(
    bindings: &mut Bindings<C>,
    state: &StateDefinition,
    hook: StateHook,
    declared: bool,
) -> Result<Option<Slot<StateCallback<C>>>> {
    let bound = bindings.hooks.remove(&(state.name.clone(), hook));
    match (declared, bound) {
        (true, Some(f)) => Ok(Some(Slot::new(f))),
        (false, None) => Ok(None),
        (true, None) => Err(BrainError::InvalidGraph(format!(
            "state '{}' declares a {} callback but none is bound",
            state.name, hook
        ))),
        (false, Some(_)) => Err(BrainError::InvalidGraph(format!(
            "{} callback bound for state '{}' which does not declare it",
            hook, state.name
        ))),
    }
}

impl<C> fmt::Debug for StateMachine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("states", &self.states.len())
            .field("transitions", &self.transitions.len())
            .field("active_path", &self.active_path())
            .field("clock", &self.clock)
            .finish()
    }
}

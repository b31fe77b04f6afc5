use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use limbo_core::{Blackboard, ObjectRef, UpdateMode, Value};

use crate::error::HsmError;
use crate::state::{Command, Guard, Hook, LimboState, StateCtx, StateId, StateKind};

/// Source side of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransitionFrom {
    /// Matches any active state that has no transition of its own for the event.
    AnyState,
    State(StateId),
}

impl From<StateId> for TransitionFrom {
    fn from(id: StateId) -> Self {
        TransitionFrom::State(id)
    }
}

struct Transition {
    to: StateId,
    guard: Option<Guard>,
}

/// Reported to [`Hsm::on_active_state_changed`] listeners after the new state has entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveStateChange {
    pub machine: StateId,
    pub previous: Option<StateId>,
    pub current: StateId,
}

type ChangeListener = Box<dyn FnMut(&ActiveStateChange)>;

struct Slot {
    state: LimboState,
    parent: Option<StateId>,
    children: Vec<StateId>,
    event_finished: String,
    active: bool,
    blackboard: Blackboard,
    cargo: Value,
    initial_state: Option<StateId>,
    active_state: Option<StateId>,
    previous_active_state: Option<StateId>,
    transitions: BTreeMap<TransitionFrom, BTreeMap<String, Transition>>,
}

impl Slot {
    fn new(id: StateId, state: LimboState, parent: Option<StateId>) -> Self {
        Self {
            state,
            parent,
            children: Vec::new(),
            event_finished: format!("finished#{}", id.0),
            active: false,
            blackboard: Blackboard::new(),
            cargo: Value::Nil,
            initial_state: None,
            active_state: None,
            previous_active_state: None,
            transitions: BTreeMap::new(),
        }
    }
}

/// Hierarchical state machine.
///
/// States live in an arena owned by the `Hsm`; the root is created by [`Hsm::new`] and every
/// other state is added under a machine or parallel state with [`Hsm::add_state`]. Events
/// dispatched by callbacks are queued and processed, in order, once the operation that ran the
/// callback has finished.
pub struct Hsm {
    slots: Vec<Slot>,
    agent: Option<ObjectRef>,
    initialized: bool,
    update_mode: UpdateMode,
    pending: VecDeque<(String, Value)>,
    listeners: Vec<ChangeListener>,
}

impl Hsm {
    pub fn new(root: LimboState) -> Self {
        Self {
            slots: vec![Slot::new(StateId(0), root, None)],
            agent: None,
            initialized: false,
            update_mode: UpdateMode::default(),
            pending: VecDeque::new(),
            listeners: Vec::new(),
        }
    }

    pub fn root(&self) -> StateId {
        StateId(0)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.len() == 1
    }

    pub fn contains(&self, id: StateId) -> bool {
        id.0 < self.slots.len()
    }

    fn slot(&self, id: StateId) -> Result<&Slot, HsmError> {
        self.slots.get(id.0).ok_or(HsmError::UnknownState(id))
    }

    // ---- structure ------------------------------------------------------------------------

    /// Adds `state` as the last child of `parent`, which must be a machine or parallel state.
    pub fn add_state(&mut self, parent: StateId, state: LimboState) -> Result<StateId, HsmError> {
        if self.initialized {
            tracing::error!(state = %state.name, "cannot add states after initialize");
            return Err(HsmError::AlreadyInitialized);
        }
        if self.slot(parent)?.state.kind == StateKind::Leaf {
            tracing::error!(parent = %parent, "leaf states cannot hold child states");
            return Err(HsmError::NotAContainer(parent));
        }
        let id = StateId(self.slots.len());
        self.slots.push(Slot::new(id, state, Some(parent)));
        self.slots[parent.0].children.push(id);
        Ok(id)
    }

    pub fn name(&self, id: StateId) -> Option<&str> {
        self.slots.get(id.0).map(|s| s.state.name.as_str())
    }

    pub fn kind(&self, id: StateId) -> Option<StateKind> {
        self.slots.get(id.0).map(|s| s.state.kind)
    }

    /// First state with this name, in insertion order.
    pub fn find(&self, name: &str) -> Option<StateId> {
        self.slots
            .iter()
            .position(|s| s.state.name == name)
            .map(StateId)
    }

    pub fn parent(&self, id: StateId) -> Option<StateId> {
        self.slots.get(id.0).and_then(|s| s.parent)
    }

    pub fn children(&self, id: StateId) -> &[StateId] {
        self.slots
            .get(id.0)
            .map(|s| s.children.as_slice())
            .unwrap_or(&[])
    }

    /// Topmost ancestor of `id`.
    pub fn get_root(&self, id: StateId) -> StateId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// The state's completion event. Unique per state; when the root's is left unconsumed the
    /// whole machine exits.
    pub fn event_finished(&self, id: StateId) -> Option<&str> {
        self.slots.get(id.0).map(|s| s.event_finished.as_str())
    }

    pub fn blackboard(&self, id: StateId) -> Option<&Blackboard> {
        self.slots.get(id.0).map(|s| &s.blackboard)
    }

    /// Transition cargo; only set while the target state's enter callbacks run.
    pub fn cargo(&self, id: StateId) -> Value {
        self.slots
            .get(id.0)
            .map(|s| s.cargo.clone())
            .unwrap_or_default()
    }

    pub fn agent(&self) -> Option<&ObjectRef> {
        self.agent.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_active(&self, id: StateId) -> bool {
        self.slots.get(id.0).is_some_and(|s| s.active)
    }

    pub fn update_mode(&self) -> UpdateMode {
        self.update_mode
    }

    pub fn set_update_mode(&mut self, mode: UpdateMode) {
        self.update_mode = mode;
    }

    fn check_child(&self, machine: StateId, state: StateId) -> Result<(), HsmError> {
        if self.slot(machine)?.state.kind != StateKind::Machine {
            tracing::error!(state = %machine, "not a machine state");
            return Err(HsmError::NotAMachine(machine));
        }
        if self.slot(state)?.parent != Some(machine) {
            tracing::error!(machine = %machine, state = %state, "state is not a child of this machine");
            return Err(HsmError::NotAChild { machine, state });
        }
        Ok(())
    }

    /// Child entered when `machine` enters. Defaults to the first child.
    pub fn set_initial_state(&mut self, machine: StateId, state: StateId) -> Result<(), HsmError> {
        self.check_child(machine, state)?;
        self.slots[machine.0].initial_state = Some(state);
        Ok(())
    }

    pub fn initial_state(&self, machine: StateId) -> Option<StateId> {
        let slot = self.slots.get(machine.0)?;
        slot.initial_state.or_else(|| slot.children.first().copied())
    }

    pub fn active_state(&self, machine: StateId) -> Option<StateId> {
        self.slots.get(machine.0).and_then(|s| s.active_state)
    }

    pub fn previous_active_state(&self, machine: StateId) -> Option<StateId> {
        self.slots.get(machine.0).and_then(|s| s.previous_active_state)
    }

    /// Deepest state on the active chain below `id`, or `id` itself.
    pub fn get_leaf_state(&self, id: StateId) -> StateId {
        let mut current = id;
        while let Some(next) = self.active_state(current) {
            current = next;
        }
        current
    }

    // ---- transitions ----------------------------------------------------------------------

    pub fn add_transition(
        &mut self,
        machine: StateId,
        from: impl Into<TransitionFrom>,
        to: StateId,
        event: &str,
    ) -> Result<(), HsmError> {
        self.insert_transition(machine, from.into(), to, event, None)
    }

    /// Like [`Hsm::add_transition`], but only taken while `guard` returns `true` for the target
    /// state's blackboard.
    pub fn add_guarded_transition(
        &mut self,
        machine: StateId,
        from: impl Into<TransitionFrom>,
        to: StateId,
        event: &str,
        guard: impl Fn(&Blackboard) -> bool + 'static,
    ) -> Result<(), HsmError> {
        self.insert_transition(machine, from.into(), to, event, Some(Box::new(guard)))
    }

    fn insert_transition(
        &mut self,
        machine: StateId,
        from: TransitionFrom,
        to: StateId,
        event: &str,
        guard: Option<Guard>,
    ) -> Result<(), HsmError> {
        if event.is_empty() {
            tracing::error!(machine = %machine, "transition event name is empty");
            return Err(HsmError::EmptyEvent);
        }
        if let TransitionFrom::State(from) = from {
            self.check_child(machine, from)?;
        }
        self.check_child(machine, to)?;
        self.slots[machine.0]
            .transitions
            .entry(from)
            .or_default()
            .insert(event.to_string(), Transition { to, guard });
        Ok(())
    }

    pub fn has_transition(
        &self,
        machine: StateId,
        from: impl Into<TransitionFrom>,
        event: &str,
    ) -> bool {
        self.slots
            .get(machine.0)
            .and_then(|s| s.transitions.get(&from.into()))
            .is_some_and(|t| t.contains_key(event))
    }

    /// Returns whether a transition was removed.
    pub fn remove_transition(
        &mut self,
        machine: StateId,
        from: impl Into<TransitionFrom>,
        event: &str,
    ) -> bool {
        let from = from.into();
        let Some(slot) = self.slots.get_mut(machine.0) else {
            return false;
        };
        let Some(table) = slot.transitions.get_mut(&from) else {
            return false;
        };
        let removed = table.remove(event).is_some();
        if table.is_empty() {
            slot.transitions.remove(&from);
        }
        removed
    }

    // ---- lifecycle ------------------------------------------------------------------------

    /// Assigns blackboards and runs every state's setup callbacks once.
    ///
    /// The root gets a new scope under `parent_scope`. Other states share their parent's
    /// blackboard unless their plan declares variables, in which case they get their own scope.
    pub fn initialize(
        &mut self,
        agent: Option<ObjectRef>,
        parent_scope: Option<&Blackboard>,
    ) -> Result<(), HsmError> {
        if self.initialized {
            tracing::error!("state machine initialized twice");
            return Err(HsmError::AlreadyInitialized);
        }
        let scope = parent_scope.cloned().unwrap_or_default();
        for index in 0..self.slots.len() {
            let parent_bb = match self.slots[index].parent {
                Some(parent) => self.slots[parent.0].blackboard.clone(),
                None => scope.clone(),
            };
            let is_root = index == 0;
            let blackboard = match &self.slots[index].state.blackboard_plan {
                Some(plan) if !plan.borrow().is_empty() => plan
                    .borrow()
                    .create_blackboard(agent.as_ref(), Some(&parent_bb)),
                _ if is_root => Blackboard::with_parent(&parent_bb),
                _ => parent_bb,
            };
            self.slots[index].blackboard = blackboard;
        }
        self.agent = agent;
        self.initialized = true;
        for index in 0..self.slots.len() {
            self.run_hooks(StateId(index), Hook::Setup, 0.0);
        }
        tracing::debug!(
            root = %self.slots[0].state.name,
            states = self.slots.len(),
            "state machine initialized"
        );
        self.drain_pending();
        Ok(())
    }

    /// Enters or exits the whole machine.
    pub fn set_active(&mut self, active: bool) -> Result<(), HsmError> {
        if !self.initialized {
            tracing::error!("state machine must be initialized before activation");
            return Err(HsmError::NotInitialized);
        }
        if self.slots[0].active != active {
            if active {
                self.enter_state(self.root());
            } else {
                self.exit_state(self.root());
            }
            self.drain_pending();
        }
        Ok(())
    }

    /// Exits the whole machine and enters it again from the initial states.
    pub fn restart(&mut self) -> Result<(), HsmError> {
        if !self.initialized {
            tracing::error!("state machine must be initialized before restart");
            return Err(HsmError::NotInitialized);
        }
        self.exit_state(self.root());
        self.enter_state(self.root());
        self.drain_pending();
        Ok(())
    }

    /// Makes `state` the active child of `machine`. The current child always exits first, even
    /// when it is `state` itself.
    pub fn change_active_state(&mut self, machine: StateId, state: StateId) -> Result<(), HsmError> {
        self.check_child(machine, state)?;
        if !self.slots[machine.0].active {
            tracing::error!(machine = %machine, "cannot change the active state of an inactive machine");
            return Err(HsmError::Inactive(machine));
        }
        self.change_active_now(machine, state);
        self.drain_pending();
        Ok(())
    }

    /// Updates the root, then every active state below it, once each.
    pub fn update(&mut self, delta: f64) {
        if !self.slots[0].active {
            return;
        }
        self.update_state(self.root(), delta);
        self.drain_pending();
    }

    /// Idle-frame notification from the host.
    pub fn notify_process(&mut self, delta: f64) {
        if self.update_mode == UpdateMode::Idle {
            self.update(delta);
        }
    }

    /// Physics-frame notification from the host.
    pub fn notify_physics_process(&mut self, delta: f64) {
        if self.update_mode == UpdateMode::Physics {
            self.update(delta);
        }
    }

    pub fn on_active_state_changed(&mut self, listener: impl FnMut(&ActiveStateChange) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // ---- events ---------------------------------------------------------------------------

    pub fn dispatch(&mut self, event: &str) -> bool {
        self.dispatch_with_cargo(event, Value::Nil)
    }

    /// Offers `event` to the active states, deepest first, then tries the transition tables on
    /// the way back up. Returns whether anything consumed it.
    pub fn dispatch_with_cargo(&mut self, event: &str, cargo: impl Into<Value>) -> bool {
        if event.is_empty() {
            tracing::error!("cannot dispatch an empty event");
            return false;
        }
        let consumed = self.dispatch_now(event, cargo.into());
        self.drain_pending();
        consumed
    }

    fn dispatch_now(&mut self, event: &str, cargo: Value) -> bool {
        if !self.slots[0].active {
            tracing::warn!(event, "event dispatched to an inactive state machine");
            return false;
        }
        let consumed = self.dispatch_in(self.root(), event, &cargo);
        if !consumed {
            tracing::debug!(event, "event not consumed");
        }
        consumed
    }

    fn drain_pending(&mut self) {
        while let Some((event, cargo)) = self.pending.pop_front() {
            if event.is_empty() {
                tracing::error!("cannot dispatch an empty event");
                continue;
            }
            self.dispatch_now(&event, cargo);
        }
    }

    fn dispatch_in(&mut self, id: StateId, event: &str, cargo: &Value) -> bool {
        if !self.slots[id.0].active {
            return false;
        }
        let mut consumed = match self.slots[id.0].state.kind {
            StateKind::Leaf => self.call_handler(id, event, cargo),
            StateKind::Parallel => {
                let mut consumed = false;
                for child in self.slots[id.0].children.clone() {
                    consumed = self.dispatch_in(child, event, cargo) || consumed;
                }
                consumed || self.call_handler(id, event, cargo)
            }
            StateKind::Machine => {
                let consumed = match self.slots[id.0].active_state {
                    Some(active) => self.dispatch_in(active, event, cargo),
                    None => false,
                };
                consumed
                    || self.call_handler(id, event, cargo)
                    || self.try_transition(id, event, cargo)
            }
        };
        if !consumed && self.slots[id.0].parent.is_none() && self.slots[id.0].event_finished == event
        {
            tracing::debug!(root = %self.slots[id.0].state.name, "state machine finished");
            self.exit_state(id);
            consumed = true;
        }
        consumed
    }

    fn try_transition(&mut self, machine: StateId, event: &str, cargo: &Value) -> bool {
        let slot = &self.slots[machine.0];
        let Some(active) = slot.active_state else {
            return false;
        };
        let transition = slot
            .transitions
            .get(&TransitionFrom::State(active))
            .and_then(|t| t.get(event))
            .or_else(|| {
                slot.transitions
                    .get(&TransitionFrom::AnyState)
                    .and_then(|t| t.get(event))
            });
        let Some(transition) = transition else {
            return false;
        };
        let to = transition.to;
        let target = &self.slots[to.0];
        let permitted = target.state.guard.as_ref().is_none_or(|g| g(&target.blackboard))
            && transition
                .guard
                .as_ref()
                .is_none_or(|g| g(&target.blackboard));
        if !permitted {
            tracing::debug!(machine = %machine, to = %to, event, "transition vetoed by guard");
            return false;
        }
        self.slots[to.0].cargo = cargo.clone();
        self.change_active_now(machine, to);
        self.slots[to.0].cargo = Value::Nil;
        true
    }

    // ---- internals ------------------------------------------------------------------------

    fn change_active_now(&mut self, machine: StateId, to: StateId) {
        let previous = self.slots[machine.0].active_state;
        if let Some(current) = previous {
            self.exit_state(current);
            self.slots[machine.0].previous_active_state = Some(current);
        }
        self.slots[machine.0].active_state = Some(to);
        self.enter_state(to);
        tracing::debug!(
            machine = %self.slots[machine.0].state.name,
            state = %self.slots[to.0].state.name,
            "active state changed"
        );
        let change = ActiveStateChange {
            machine,
            previous,
            current: to,
        };
        for listener in &mut self.listeners {
            listener(&change);
        }
    }

    fn enter_state(&mut self, id: StateId) {
        self.slots[id.0].active = true;
        self.run_hooks(id, Hook::Enter, 0.0);
        match self.slots[id.0].state.kind {
            StateKind::Leaf => {}
            StateKind::Machine => match self.initial_state(id) {
                Some(initial) => self.change_active_now(id, initial),
                None => {
                    tracing::warn!(state = %self.slots[id.0].state.name, "machine has no child states")
                }
            },
            StateKind::Parallel => {
                for child in self.slots[id.0].children.clone() {
                    self.enter_state(child);
                }
            }
        }
    }

    fn exit_state(&mut self, id: StateId) {
        if !self.slots[id.0].active {
            return;
        }
        match self.slots[id.0].state.kind {
            StateKind::Leaf => {}
            StateKind::Machine => {
                if let Some(active) = self.slots[id.0].active_state {
                    self.exit_state(active);
                    let slot = &mut self.slots[id.0];
                    slot.previous_active_state = Some(active);
                    slot.active_state = None;
                }
            }
            StateKind::Parallel => {
                for child in self.slots[id.0].children.clone() {
                    self.exit_state(child);
                }
            }
        }
        self.run_hooks(id, Hook::Exit, 0.0);
        self.slots[id.0].active = false;
    }

    fn update_state(&mut self, id: StateId, delta: f64) {
        if !self.slots[id.0].active {
            return;
        }
        self.run_hooks(id, Hook::Update, delta);
        match self.slots[id.0].state.kind {
            StateKind::Leaf => {}
            StateKind::Machine => {
                if let Some(active) = self.slots[id.0].active_state {
                    self.update_state(active, delta);
                }
            }
            StateKind::Parallel => {
                for child in self.slots[id.0].children.clone() {
                    self.update_state(child, delta);
                }
            }
        }
    }

    fn ctx<'a>(&'a self, id: StateId, cargo: &'a Value, delta: f64) -> StateCtx<'a> {
        let slot = &self.slots[id.0];
        StateCtx {
            id,
            name: &slot.state.name,
            event_finished: &slot.event_finished,
            blackboard: &slot.blackboard,
            agent: self.agent.as_ref(),
            cargo,
            delta,
            commands: Vec::new(),
        }
    }

    fn run_hooks(&mut self, id: StateId, hook: Hook, delta: f64) {
        let mut callbacks = std::mem::take(self.slots[id.0].state.hooks.get_mut(hook));
        if callbacks.is_empty() {
            return;
        }
        let commands = {
            let mut ctx = self.ctx(id, &self.slots[id.0].cargo, delta);
            for callback in callbacks.iter_mut() {
                callback(&mut ctx);
            }
            ctx.commands
        };
        *self.slots[id.0].state.hooks.get_mut(hook) = callbacks;
        self.apply(commands);
    }

    fn call_handler(&mut self, id: StateId, event: &str, cargo: &Value) -> bool {
        let Some(mut handler) = self.slots[id.0].state.handlers.remove(event) else {
            return false;
        };
        let (consumed, commands) = {
            let mut ctx = self.ctx(id, cargo, 0.0);
            let consumed = handler(&mut ctx);
            (consumed, ctx.commands)
        };
        self.slots[id.0]
            .state
            .handlers
            .insert(event.to_string(), handler);
        self.apply(commands);
        consumed
    }

    fn apply(&mut self, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::Dispatch { event, cargo } => self.pending.push_back((event, cargo)),
                Command::SetInitialState { machine, state } => {
                    // Failures are logged by set_initial_state.
                    let _ = self.set_initial_state(machine, state);
                }
            }
        }
    }
}

impl fmt::Debug for Hsm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hsm")
            .field("root", &self.slots[0].state.name)
            .field("states", &self.slots.len())
            .field("initialized", &self.initialized)
            .field("active", &self.slots[0].active)
            .field("leaf", &self.get_leaf_state(self.root()))
            .field("update_mode", &self.update_mode)
            .finish()
    }
}

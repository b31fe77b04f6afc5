use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use limbo_core::{Blackboard, ObjectRef, SharedPlan, Value};

/// Handle to a state inside one [`crate::Hsm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StateId(pub(crate) usize);

impl StateId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StateKind {
    Leaf,
    /// Exactly one child is active at a time.
    Machine,
    /// All children are entered, updated and exited together.
    Parallel,
}

pub(crate) type Callback = Box<dyn FnMut(&mut StateCtx<'_>)>;
pub(crate) type Handler = Box<dyn FnMut(&mut StateCtx<'_>) -> bool>;
pub(crate) type Guard = Box<dyn Fn(&Blackboard) -> bool>;

#[derive(Clone, Copy)]
pub(crate) enum Hook {
    Setup,
    Enter,
    Exit,
    Update,
}

#[derive(Default)]
pub(crate) struct Hooks {
    setup: Vec<Callback>,
    enter: Vec<Callback>,
    exit: Vec<Callback>,
    update: Vec<Callback>,
}

impl Hooks {
    pub(crate) fn get_mut(&mut self, hook: Hook) -> &mut Vec<Callback> {
        match hook {
            Hook::Setup => &mut self.setup,
            Hook::Enter => &mut self.enter,
            Hook::Exit => &mut self.exit,
            Hook::Update => &mut self.update,
        }
    }
}

/// Authoring description of one state, moved into an [`crate::Hsm`] with
/// [`crate::Hsm::add_state`].
pub struct LimboState {
    pub(crate) name: String,
    pub(crate) kind: StateKind,
    pub(crate) blackboard_plan: Option<SharedPlan>,
    pub(crate) hooks: Hooks,
    pub(crate) handlers: BTreeMap<String, Handler>,
    pub(crate) guard: Option<Guard>,
}

impl LimboState {
    fn with_kind(name: impl Into<String>, kind: StateKind) -> Self {
        Self {
            name: name.into(),
            kind,
            blackboard_plan: None,
            hooks: Hooks::default(),
            handlers: BTreeMap::new(),
            guard: None,
        }
    }

    pub fn leaf(name: impl Into<String>) -> Self {
        Self::with_kind(name, StateKind::Leaf)
    }

    pub fn machine(name: impl Into<String>) -> Self {
        Self::with_kind(name, StateKind::Machine)
    }

    pub fn parallel(name: impl Into<String>) -> Self {
        Self::with_kind(name, StateKind::Parallel)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StateKind {
        self.kind
    }

    /// A non-empty plan gives the state its own blackboard scoped under its parent's.
    pub fn with_blackboard_plan(mut self, plan: SharedPlan) -> Self {
        self.blackboard_plan = Some(plan);
        self
    }

    /// Runs once when the machine is initialized.
    pub fn on_setup(mut self, f: impl FnMut(&mut StateCtx<'_>) + 'static) -> Self {
        self.hooks.setup.push(Box::new(f));
        self
    }

    pub fn on_enter(mut self, f: impl FnMut(&mut StateCtx<'_>) + 'static) -> Self {
        self.hooks.enter.push(Box::new(f));
        self
    }

    pub fn on_exit(mut self, f: impl FnMut(&mut StateCtx<'_>) + 'static) -> Self {
        self.hooks.exit.push(Box::new(f));
        self
    }

    pub fn on_update(mut self, f: impl FnMut(&mut StateCtx<'_>) + 'static) -> Self {
        self.hooks.update.push(Box::new(f));
        self
    }

    /// Handles `event` while the state is active. Returning `true` consumes the event.
    pub fn with_event_handler(
        mut self,
        event: impl Into<String>,
        f: impl FnMut(&mut StateCtx<'_>) -> bool + 'static,
    ) -> Self {
        self.handlers.insert(event.into(), Box::new(f));
        self
    }

    /// Vetoes every transition into this state while it returns `false`.
    pub fn with_guard(mut self, guard: impl Fn(&Blackboard) -> bool + 'static) -> Self {
        self.guard = Some(Box::new(guard));
        self
    }
}

impl fmt::Debug for LimboState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimboState")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("guarded", &self.guard.is_some())
            .finish()
    }
}

pub(crate) enum Command {
    Dispatch { event: String, cargo: Value },
    SetInitialState { machine: StateId, state: StateId },
}

/// What a state callback sees while it runs.
///
/// Requests made through the context are applied after the callback returns: initial-state
/// changes immediately, dispatched events once the current machine operation has finished.
pub struct StateCtx<'a> {
    pub(crate) id: StateId,
    pub(crate) name: &'a str,
    pub(crate) event_finished: &'a str,
    pub(crate) blackboard: &'a Blackboard,
    pub(crate) agent: Option<&'a ObjectRef>,
    pub(crate) cargo: &'a Value,
    pub(crate) delta: f64,
    pub(crate) commands: Vec<Command>,
}

impl<'a> StateCtx<'a> {
    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// This state's own completion event.
    pub fn event_finished(&self) -> &str {
        self.event_finished
    }

    pub fn blackboard(&self) -> &Blackboard {
        self.blackboard
    }

    pub fn agent(&self) -> Option<&ObjectRef> {
        self.agent
    }

    /// Data carried by the event being handled, or by the transition entering this state.
    pub fn cargo(&self) -> &Value {
        self.cargo
    }

    /// Frame time; zero outside update callbacks.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn dispatch(&mut self, event: impl Into<String>) {
        self.dispatch_with_cargo(event, Value::Nil);
    }

    pub fn dispatch_with_cargo(&mut self, event: impl Into<String>, cargo: impl Into<Value>) {
        self.commands.push(Command::Dispatch {
            event: event.into(),
            cargo: cargo.into(),
        });
    }

    /// Dispatches this state's completion event.
    pub fn finish(&mut self) {
        let event = self.event_finished.to_string();
        self.dispatch(event);
    }

    pub fn set_initial_state(&mut self, machine: StateId, state: StateId) {
        self.commands
            .push(Command::SetInitialState { machine, state });
    }
}

//! Per-pet orchestrator over the behavior graph.

use std::collections::{HashMap, HashSet};
use std::fmt;

use bevy::log::{debug, info, warn};
use bevy::math::Vec2;

use crate::error::{Error, Result};
use crate::frames::FramePlayer;
use crate::menu::{ContextMenu, MenuAction, PetContext};
use crate::position::{DragChange, PointerEvent, Position};
use crate::state::{Capability, State, StateContext};
use crate::surface::RenderSurface;
use crate::{IDLE, PREVIOUS};

/// Upper bound on scheduled transitions fired by one update.
const MAX_DUE_PER_TICK: usize = 16;

pub const DEFAULT_CONTAINER: &str = "pets";

pub struct MachineBuilder {
    name: String,
    container: String,
    spawn: Vec2,
    surface_size: Vec2,
    drag_state: Option<String>,
    exclusions: HashSet<String>,
    players: Vec<FramePlayer>,
    states: Vec<(String, Box<dyn State>)>,
    actions: Vec<MenuAction>,
    clock: f64,
}

impl MachineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            container: DEFAULT_CONTAINER.to_owned(),
            spawn: Vec2::new(200.0, 200.0),
            surface_size: Vec2::splat(64.0),
            drag_state: None,
            exclusions: HashSet::from(["drag".to_owned()]),
            players: Vec::new(),
            states: Vec::new(),
            actions: Vec::new(),
            clock: 0.0,
        }
    }

    /// Host time, in ms, that plays issued before the first update use.
    pub fn starting_at(mut self, now: f64) -> Self {
        self.clock = now;
        self
    }

    pub fn container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    pub fn spawn(mut self, x: f32, y: f32) -> Self {
        self.spawn = Vec2::new(x, y);
        self
    }

    pub fn surface_size(mut self, size: Vec2) -> Self {
        self.surface_size = size;
        self
    }

    /// State played while the user drags the pet; release plays `previous`.
    pub fn drag_state(mut self, key: impl Into<String>) -> Self {
        self.drag_state = Some(key.into());
        self
    }

    /// Keys `previous` never resolves to. Replaces the default `{"drag"}`.
    pub fn previous_exclusions<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.exclusions = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn player(mut self, player: FramePlayer) -> Self {
        self.players.push(player);
        self
    }

    pub fn state(self, key: impl Into<String>, state: impl State + 'static) -> Self {
        self.boxed_state(key, Box::new(state))
    }

    pub fn boxed_state(mut self, key: impl Into<String>, state: Box<dyn State>) -> Self {
        self.states.push((key.into(), state));
        self
    }

    pub fn action(mut self, action: MenuAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn build<S: RenderSurface>(
        self,
        mut surface: S,
        context: PetContext,
    ) -> Result<Machine<S>> {
        let mut states = HashMap::with_capacity(self.states.len());
        for (key, mut state) in self.states {
            state.core_mut().attach();
            if states.insert(key.clone(), state).is_some() {
                return Err(Error::Config(format!("state \"{key}\" registered twice")));
            }
        }
        if let Some(key) = &self.drag_state {
            if !states.contains_key(key) {
                return Err(Error::UnknownState { key: key.clone() });
            }
        }

        surface.attach(&self.container)?;
        let position = Position::new(self.spawn.x, self.spawn.y);
        position.update(&mut surface);
        debug!(
            "{}: built with {} state(s), {} frame player(s)",
            self.name,
            states.len(),
            self.players.len()
        );

        Ok(Machine {
            name: self.name,
            container: self.container,
            surface: Some(surface),
            surface_size: self.surface_size,
            players: self.players,
            states,
            actions: self.actions,
            position,
            current: None,
            previous: None,
            exclusions: self.exclusions,
            drag_state: self.drag_state,
            menu: None,
            context,
            clock: self.clock,
            reattached: false,
            removed: false,
        })
    }
}

pub struct Machine<S: RenderSurface> {
    name: String,
    container: String,
    surface: Option<S>,
    surface_size: Vec2,
    players: Vec<FramePlayer>,
    states: HashMap<String, Box<dyn State>>,
    actions: Vec<MenuAction>,
    position: Position,
    current: Option<String>,
    previous: Option<String>,
    exclusions: HashSet<String>,
    drag_state: Option<String>,
    menu: Option<ContextMenu>,
    context: PetContext,
    // time of the latest update, used by plays issued between ticks
    clock: f64,
    reattached: bool,
    removed: bool,
}

impl<S: RenderSurface> fmt::Debug for Machine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("name", &self.name)
            .field("current", &self.current)
            .field("previous", &self.previous)
            .field("position", &self.position)
            .field("clock", &self.clock)
            .field("removed", &self.removed)
            .finish_non_exhaustive()
    }
}

impl<S: RenderSurface> Machine<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_key(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn previous_key(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn state(&self, key: &str) -> Option<&dyn State> {
        self.states.get(key).map(|s| s.as_ref())
    }

    pub fn players(&self) -> &[FramePlayer] {
        &self.players
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn position_mut(&mut self) -> &mut Position {
        &mut self.position
    }

    pub fn actions(&self) -> &[MenuAction] {
        &self.actions
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Time of the latest update, or the start time before the first one.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn is_blocked(&self, capability: Capability) -> bool {
        self.current
            .as_deref()
            .and_then(|key| self.states.get(key))
            .map_or(false, |state| state.is_blocked(capability))
    }

    fn resolve(&self, key: &str) -> String {
        if key != PREVIOUS {
            return key.to_owned();
        }
        match self.current.as_deref() {
            Some(current) if !self.exclusions.contains(current) => current.to_owned(),
            _ => IDLE.to_owned(),
        }
    }

    /// Switch to `key`. The new state starts before the old one is cleaned up.
    pub fn play(&mut self, key: &str) -> Result<()> {
        let key = self.resolve(key);
        if !self.states.contains_key(&key) {
            return Err(Error::UnknownState { key });
        }
        let Some(surface) = self.surface.as_mut() else {
            debug!("{}: ignoring play(\"{key}\") after removal", self.name);
            return Ok(());
        };

        let outgoing = self.current.clone();
        let replay = outgoing.as_deref() == Some(key.as_str());
        let mut ctx = StateContext::new(self.clock, &mut self.players, surface, &mut self.position);
        if let Some(target) = self.states.get_mut(&key) {
            if replay {
                target.on_cleanup();
            }
            if let Err(err) = target.on_start(&mut ctx) {
                target.on_cleanup();
                if replay {
                    // the active state is gone; nothing runs until the next play
                    self.previous = self.current.take();
                }
                return Err(err);
            }
        }
        if !replay {
            if let Some(old) = outgoing.as_deref().and_then(|k| self.states.get_mut(k)) {
                old.on_cleanup();
            }
        }
        let requests = ctx.into_requests();

        info!("{}: state {key}", self.name);
        self.previous = outgoing;
        self.current = Some(key);
        for next in requests {
            self.play(&next)?;
        }
        Ok(())
    }

    /// One tick: due scheduled transitions, then the active state, then the
    /// position, then the attachment check.
    pub fn update(&mut self, dt: f64, now: f64) -> Result<()> {
        if self.removed {
            return Ok(());
        }
        self.clock = now;
        self.fire_due(now)?;

        let (outcome, requests) = match (self.current.as_deref(), self.surface.as_mut()) {
            (Some(key), Some(surface)) => match self.states.get_mut(key) {
                Some(state) => {
                    let mut ctx =
                        StateContext::new(now, &mut self.players, surface, &mut self.position);
                    let outcome = state.on_update(&mut ctx, dt, now);
                    (outcome, ctx.into_requests())
                }
                None => (Ok(()), Vec::new()),
            },
            _ => (Ok(()), Vec::new()),
        };
        // a surface fault costs this tick's drawing, never the transition
        let fault = match outcome {
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => Some(err),
            Ok(()) => None,
        };
        for next in requests {
            self.play(&next)?;
        }

        if let Some(surface) = self.surface.as_mut() {
            self.position.update(surface);
        }
        self.check_attachment()?;
        match fault {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn fire_due(&mut self, now: f64) -> Result<()> {
        for _ in 0..MAX_DUE_PER_TICK {
            let due = match self.current.as_deref() {
                Some(key) => self
                    .states
                    .get_mut(key)
                    .and_then(|s| s.core_mut().pop_due(now)),
                None => None,
            };
            let Some(key) = due else {
                return Ok(());
            };
            self.play(&key)?;
        }
        warn!("{}: too many scheduled transitions in one tick", self.name);
        Ok(())
    }

    fn check_attachment(&mut self) -> Result<()> {
        let Some(surface) = self.surface.as_mut() else {
            return Ok(());
        };
        if surface.is_attached() || self.reattached {
            return Ok(());
        }
        self.reattached = true;
        warn!("{}: surface left \"{}\", reattaching", self.name, self.container);
        surface.attach(&self.container)?;
        self.position.update(surface);
        Ok(())
    }

    /// Feed a pointer event to the drag arbiter.
    pub fn pointer(&mut self, event: &PointerEvent) -> Result<DragChange> {
        if self.removed {
            return Ok(DragChange::None);
        }
        let blocked = self.is_blocked(Capability::Drag);
        let change = self.position.handle_pointer(event, blocked);
        match (change, self.drag_state.clone()) {
            (DragChange::Started, Some(key)) => self.play(&key)?,
            (DragChange::Ended, Some(key)) if self.current.as_deref() == Some(key.as_str()) => {
                self.play(PREVIOUS)?
            }
            _ => {}
        }
        Ok(change)
    }

    /// Whether `point` falls on the pet's surface.
    pub fn hit_test(&self, point: Vec2) -> bool {
        if self.removed {
            return false;
        }
        let d = (point - self.position.coords()).abs();
        let half = self.surface_size / 2.0;
        d.x <= half.x && d.y <= half.y
    }

    pub fn menu(&self) -> Option<&ContextMenu> {
        self.menu.as_ref()
    }

    pub fn is_menu_open(&self) -> bool {
        self.menu.is_some()
    }

    /// Open the context menu around the pet. Refused while one is open or
    /// the active state blocks actions.
    pub fn open_menu(&mut self) -> bool {
        if self.removed || self.menu.is_some() || self.is_blocked(Capability::Action) {
            return false;
        }
        self.menu = Some(ContextMenu::layout(
            self.position.coords(),
            &self.actions,
            &self.context,
        ));
        true
    }

    pub fn close_menu(&mut self) -> bool {
        self.menu.take().is_some()
    }

    /// Pick entry `index` of the open menu and close it.
    pub fn select_menu(&mut self, index: usize) -> Result<()> {
        let Some(menu) = self.menu.take() else {
            return Ok(());
        };
        if let Some(key) = menu.entries().get(index).and_then(|e| e.play.clone()) {
            self.play(&key)?;
        }
        Ok(())
    }

    /// Detach for good. The host drops removed machines on its next tick.
    pub fn remove(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            surface.detach();
            info!("{}: removed", self.name);
        }
        self.menu = None;
        self.removed = true;
    }
}

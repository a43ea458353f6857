//! Behavior-graph nodes.

use std::collections::{HashMap, HashSet};

use bevy::log::debug;
use serde::Deserialize;

use crate::error::{Error, Result, SurfaceError};
use crate::frames::{FramePlayer, Step};
use crate::position::Position;
use crate::surface::RenderSurface;

/// General actions a state may forbid while it is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Drag,
    Action,
}

#[derive(Clone, Debug, Default)]
pub struct StateOptions {
    pub block: Vec<Capability>,
    /// Ignore `on_finish`; something else has to move the machine on.
    pub persist: bool,
}

#[derive(Debug)]
struct Pending {
    due: f64,
    key: String,
}

/// Everything that belongs to one activation of a state. Dropping it drops
/// the transitions it scheduled.
#[derive(Debug)]
struct Activation {
    pending: Vec<Pending>,
}

/// Bookkeeping shared by every state variant.
#[derive(Debug, Default)]
pub struct StateCore {
    block: HashSet<Capability>,
    persist: bool,
    attached: bool,
    started: Option<f64>,
    finished: bool,
    activation: Option<Activation>,
    /// Scratch values for hooks, cleared on cleanup.
    pub memo: HashMap<String, serde_json::Value>,
}

impl StateCore {
    pub fn new(options: StateOptions) -> Self {
        Self {
            block: options.block.into_iter().collect(),
            persist: options.persist,
            ..Self::default()
        }
    }

    pub fn is_blocked(&self, capability: Capability) -> bool {
        self.block.contains(&capability)
    }

    pub fn persist(&self) -> bool {
        self.persist
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub(crate) fn attach(&mut self) {
        self.attached = true;
    }

    pub fn started(&self) -> Option<f64> {
        self.started
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_active(&self) -> bool {
        self.activation.is_some()
    }

    /// Open a new activation. Returns `false` when the state belongs to no
    /// machine yet.
    pub fn start(&mut self, now: f64) -> bool {
        if !self.attached {
            return false;
        }
        self.finished = false;
        self.started = Some(now);
        self.activation = Some(Activation {
            pending: Vec::new(),
        });
        true
    }

    pub fn finish(&mut self) {
        if self.persist {
            return;
        }
        self.finished = true;
    }

    pub fn cleanup(&mut self) {
        if let Some(activation) = self.activation.take() {
            if !activation.pending.is_empty() {
                debug!("dropping {} scheduled transition(s)", activation.pending.len());
            }
        }
        self.started = None;
        self.memo.clear();
    }

    /// Schedule `play(key)` for `delay` ms after `now`, owned by the current
    /// activation.
    pub fn schedule(&mut self, now: f64, delay: f64, key: impl Into<String>) {
        let key = key.into();
        match self.activation.as_mut() {
            Some(activation) => activation.pending.push(Pending {
                due: now + delay,
                key,
            }),
            None => debug!("ignoring transition to \"{key}\" scheduled outside an activation"),
        }
    }

    pub fn scheduled(&self) -> usize {
        self.activation.as_ref().map_or(0, |a| a.pending.len())
    }

    /// Earliest scheduled key whose due time has passed.
    pub fn pop_due(&mut self, now: f64) -> Option<String> {
        let pending = &mut self.activation.as_mut()?.pending;
        let (idx, _) = pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= now)
            .min_by(|(_, a), (_, b)| a.due.total_cmp(&b.due))?;
        Some(pending.remove(idx).key)
    }
}

/// Machine resources a state can touch while it runs.
pub struct StateContext<'a> {
    now: f64,
    players: &'a mut [FramePlayer],
    surface: &'a mut dyn RenderSurface,
    position: &'a mut Position,
    requests: Vec<String>,
}

impl<'a> StateContext<'a> {
    pub fn new(
        now: f64,
        players: &'a mut [FramePlayer],
        surface: &'a mut dyn RenderSurface,
        position: &'a mut Position,
    ) -> Self {
        Self {
            now,
            players,
            surface,
            position,
            requests: Vec::new(),
        }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn player(&mut self, index: usize) -> Result<&mut FramePlayer> {
        let registered = self.players.len();
        self.players
            .get_mut(index)
            .ok_or(Error::UnknownFramePlayer { index, registered })
    }

    pub fn surface(&mut self) -> &mut dyn RenderSurface {
        &mut *self.surface
    }

    pub fn position(&mut self) -> &mut Position {
        &mut *self.position
    }

    /// Clear the surface, step player `index` and draw its new cell.
    ///
    /// The step is reported even when drawing fails, so a finish is never
    /// lost to a surface fault.
    pub fn draw_frame(
        &mut self,
        index: usize,
    ) -> Result<(Step, std::result::Result<(), SurfaceError>)> {
        let registered = self.players.len();
        let player = self
            .players
            .get_mut(index)
            .ok_or(Error::UnknownFramePlayer { index, registered })?;
        self.surface.clear();
        let step = player.update();
        let drawn = player.render(index, &mut *self.surface);
        Ok((step, drawn))
    }

    /// Ask the machine to `play(key)` as soon as the current callback returns.
    pub fn play(&mut self, key: impl Into<String>) {
        self.requests.push(key.into());
    }

    pub fn requested(&self) -> &[String] {
        &self.requests
    }

    pub(crate) fn into_requests(self) -> Vec<String> {
        self.requests
    }
}

/// A node of the behavior graph.
pub trait State {
    fn core(&self) -> &StateCore;
    fn core_mut(&mut self) -> &mut StateCore;

    fn is_blocked(&self, capability: Capability) -> bool {
        self.core().is_blocked(capability)
    }

    fn on_start(&mut self, ctx: &mut StateContext<'_>) -> Result<()> {
        self.core_mut().start(ctx.now());
        Ok(())
    }

    fn on_update(&mut self, _ctx: &mut StateContext<'_>, _dt: f64, _now: f64) -> Result<()> {
        Ok(())
    }

    fn on_finish(&mut self) {
        self.core_mut().finish();
    }

    fn on_cleanup(&mut self) {
        self.core_mut().cleanup();
    }
}

/// A state with no behavior of its own, e.g. a drag pose held until release.
impl State for StateCore {
    fn core(&self) -> &StateCore {
        self
    }

    fn core_mut(&mut self) -> &mut StateCore {
        self
    }
}

//! What a finished state does next.

use std::fmt;

use crate::error::Result;
use crate::state::{StateContext, StateCore};
use crate::IDLE;

pub type TransitionFn =
    Box<dyn FnMut(&mut StateCore, &mut StateContext<'_>, f64, f64) -> Result<()>>;

#[derive(Default)]
pub enum Transition {
    /// `play(key)` after `delay` ms.
    After { delay: f64, key: String },
    /// Hand the decision to the caller.
    Callback(TransitionFn),
    /// `play(key)` in the same tick.
    Play(String),
    /// `play("idle")` after the given ms.
    Delay(f64),
    /// Stay finished until something else moves the machine.
    Terminal,
    /// `play("idle")` in the same tick.
    #[default]
    Default,
}

impl Transition {
    pub fn after(delay: f64, key: impl Into<String>) -> Self {
        Transition::After {
            delay,
            key: key.into(),
        }
    }

    pub fn play(key: impl Into<String>) -> Self {
        Transition::Play(key.into())
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: FnMut(&mut StateCore, &mut StateContext<'_>, f64, f64) -> Result<()> + 'static,
    {
        Transition::Callback(Box::new(f))
    }

    pub fn apply(
        &mut self,
        core: &mut StateCore,
        ctx: &mut StateContext<'_>,
        dt: f64,
        now: f64,
    ) -> Result<()> {
        match self {
            Transition::After { delay, key } => core.schedule(now, *delay, key.as_str()),
            Transition::Callback(f) => return f(core, ctx, dt, now),
            Transition::Play(key) => ctx.play(key.as_str()),
            Transition::Delay(delay) => core.schedule(now, *delay, IDLE),
            Transition::Terminal => {}
            Transition::Default => ctx.play(IDLE),
        }
        Ok(())
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::After { delay, key } => f
                .debug_struct("After")
                .field("delay", delay)
                .field("key", key)
                .finish(),
            Transition::Callback(_) => f.write_str("Callback(..)"),
            Transition::Play(key) => f.debug_tuple("Play").field(key).finish(),
            Transition::Delay(delay) => f.debug_tuple("Delay").field(delay).finish(),
            Transition::Terminal => f.write_str("Terminal"),
            Transition::Default => f.write_str("Default"),
        }
    }
}

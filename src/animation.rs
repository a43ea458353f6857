//! Sprite-driven and timer-only states.

use bevy::math::Vec2;

use crate::error::Result;
use crate::frames::{AnimationSpec, Step};
use crate::position::DEFAULT_SPEED;
use crate::state::{State, StateContext, StateCore, StateOptions};
use crate::transition::Transition;

const DEFAULT_FPS: f64 = 2.0;

pub type StartHook = Box<dyn FnMut(&mut StateCore, &mut StateContext<'_>) -> Result<()>>;
pub type TickHook = Box<dyn FnMut(&mut StateCore, &mut StateContext<'_>, f64, f64) -> Result<()>>;

/// Walk the pet towards `target` while the animation plays; arriving
/// finishes the state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveTo {
    pub target: Vec2,
    pub speed: f32,
}

impl MoveTo {
    pub fn new(target: Vec2) -> Self {
        Self {
            target,
            speed: DEFAULT_SPEED,
        }
    }
}

/// Plays one range of one frame player and transitions when done.
///
/// With a fixed duration the state finishes on the clock alone, whether the
/// frame player is still looping or stopped long ago.
pub struct AnimationState {
    core: StateCore,
    index: usize,
    spec: AnimationSpec,
    frame_interval: f64,
    next_frame: f64,
    duration: Option<f64>,
    finish_at: Option<f64>,
    bound: Option<usize>,
    transition: Transition,
    move_to: Option<MoveTo>,
    start_hook: Option<StartHook>,
    tick_hook: Option<TickHook>,
}

impl AnimationState {
    pub fn new(index: usize, spec: AnimationSpec, options: StateOptions) -> Self {
        Self {
            core: StateCore::new(options),
            index,
            spec,
            frame_interval: 1000.0 / DEFAULT_FPS,
            next_frame: 0.0,
            duration: None,
            finish_at: None,
            bound: None,
            transition: Transition::Default,
            move_to: None,
            start_hook: None,
            tick_hook: None,
        }
    }

    pub fn fps(mut self, fps: f64) -> Self {
        let fps = if fps > 0.0 { fps } else { DEFAULT_FPS };
        self.frame_interval = 1000.0 / fps;
        self
    }

    /// Finish `ms` after start regardless of the frame player.
    pub fn duration(mut self, ms: f64) -> Self {
        self.duration = (ms > 0.0).then_some(ms);
        self
    }

    pub fn transition(mut self, transition: Transition) -> Self {
        self.transition = transition;
        self
    }

    pub fn move_to(mut self, move_to: MoveTo) -> Self {
        self.move_to = Some(move_to);
        self
    }

    pub fn on_start_hook<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut StateCore, &mut StateContext<'_>) -> Result<()> + 'static,
    {
        self.start_hook = Some(Box::new(hook));
        self
    }

    pub fn on_tick_hook<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut StateCore, &mut StateContext<'_>, f64, f64) -> Result<()> + 'static,
    {
        self.tick_hook = Some(Box::new(hook));
        self
    }

    pub fn player_index(&self) -> usize {
        self.index
    }

    pub fn frame_interval(&self) -> f64 {
        self.frame_interval
    }

    /// Frame player bound by the current activation.
    pub fn bound_player(&self) -> Option<usize> {
        self.bound
    }
}

impl State for AnimationState {
    fn core(&self) -> &StateCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StateCore {
        &mut self.core
    }

    fn on_start(&mut self, ctx: &mut StateContext<'_>) -> Result<()> {
        if !self.core.is_attached() {
            return Ok(());
        }
        let now = ctx.now();
        ctx.player(self.index)?.set_animation(&self.spec, None)?;
        self.core.start(now);
        self.next_frame = 0.0;
        self.finish_at = self.duration.map(|ms| now + ms);
        self.bound = Some(self.index);

        if let Some(hook) = self.start_hook.as_mut() {
            hook(&mut self.core, ctx)?;
        }
        Ok(())
    }

    fn on_update(&mut self, ctx: &mut StateContext<'_>, dt: f64, now: f64) -> Result<()> {
        if self.core.is_finished() {
            return Ok(());
        }
        let Some(index) = self.bound else {
            return Ok(());
        };

        let mut fault = None;
        if now >= self.next_frame {
            self.next_frame = now + self.frame_interval;
            let (step, drawn) = ctx.draw_frame(index)?;
            fault = drawn.err();
            if step == Step::Finished && self.finish_at.is_none() {
                self.on_finish();
            }
        }

        if let Some(hook) = self.tick_hook.as_mut() {
            hook(&mut self.core, ctx, dt, now)?;
        }

        if let Some(MoveTo { target, speed }) = self.move_to {
            if !ctx.position().move_towards(target, speed) {
                self.on_finish();
            }
        }

        if let Some(at) = self.finish_at {
            if now >= at {
                self.on_finish();
                self.finish_at = None;
            }
        }

        if self.core.is_finished() {
            self.transition.apply(&mut self.core, ctx, dt, now)?;
        }
        match fault {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn on_cleanup(&mut self) {
        self.core.cleanup();
        self.bound = None;
        self.finish_at = None;
    }
}

/// Waits `duration` ms, then applies its transition. Draws nothing.
pub struct TimerState {
    core: StateCore,
    duration: f64,
    finish_at: Option<f64>,
    transition: Transition,
}

impl TimerState {
    pub fn new(duration: f64, options: StateOptions) -> Self {
        Self {
            core: StateCore::new(options),
            duration: duration.max(0.0),
            finish_at: None,
            transition: Transition::Default,
        }
    }

    pub fn transition(mut self, transition: Transition) -> Self {
        self.transition = transition;
        self
    }
}

impl State for TimerState {
    fn core(&self) -> &StateCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StateCore {
        &mut self.core
    }

    fn on_start(&mut self, ctx: &mut StateContext<'_>) -> Result<()> {
        let now = ctx.now();
        if self.core.start(now) {
            self.finish_at = Some(now + self.duration);
        }
        Ok(())
    }

    fn on_update(&mut self, ctx: &mut StateContext<'_>, dt: f64, now: f64) -> Result<()> {
        if self.core.is_finished() {
            return Ok(());
        }
        if let Some(at) = self.finish_at {
            if now >= at {
                self.on_finish();
                self.finish_at = None;
            }
        }
        if self.core.is_finished() {
            self.transition.apply(&mut self.core, ctx, dt, now)?;
        }
        Ok(())
    }

    fn on_cleanup(&mut self) {
        self.core.cleanup();
        self.finish_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{FrameFrom, FramePlayer, FrameTo, SheetGeometry};
    use crate::position::Position;
    use crate::surface::{RecordingSurface, SurfaceCall};

    struct Rig {
        players: Vec<FramePlayer>,
        surface: RecordingSurface,
        position: Position,
    }

    impl Rig {
        fn new() -> Self {
            let player = FramePlayer::new(SheetGeometry {
                cell_width: 16,
                cell_height: 16,
                sheet_width: 64,
                sheet_height: 64,
                scale: 1.0,
                flip: false,
            })
            .unwrap();
            Self {
                players: vec![player],
                surface: RecordingSurface::attached("test"),
                position: Position::new(0.0, 0.0),
            }
        }

        fn ctx(&mut self, now: f64) -> StateContext<'_> {
            StateContext::new(now, &mut self.players, &mut self.surface, &mut self.position)
        }
    }

    fn three_frames(repeat: bool) -> AnimationSpec {
        AnimationSpec {
            from: FrameFrom::Row(0),
            to: FrameTo::Count(3),
            repeat,
        }
    }

    fn attached(mut state: AnimationState) -> AnimationState {
        state.core.attach();
        state
    }

    #[test]
    fn unknown_player_fails_on_start() {
        let mut rig = Rig::new();
        let mut state = attached(AnimationState::new(
            4,
            three_frames(false),
            StateOptions::default(),
        ));
        let err = state.on_start(&mut rig.ctx(0.0)).unwrap_err();
        assert!(err.is_fatal());
        assert!(!state.core().is_active());
        assert_eq!(state.bound_player(), None);
    }

    #[test]
    fn unattached_start_is_noop() {
        let mut rig = Rig::new();
        let mut state = AnimationState::new(4, three_frames(false), StateOptions::default());
        state.on_start(&mut rig.ctx(0.0)).unwrap();
        assert_eq!(state.bound_player(), None);
    }

    #[test]
    fn frames_advance_on_interval() {
        let mut rig = Rig::new();
        let mut state = attached(
            AnimationState::new(0, three_frames(true), StateOptions::default()).fps(10.0),
        );
        state.on_start(&mut rig.ctx(0.0)).unwrap();
        for now in [0.0, 50.0, 99.0, 100.0, 150.0, 200.0] {
            state.on_update(&mut rig.ctx(now), 16.0, now).unwrap();
        }
        let cols: Vec<u32> = rig.surface.blits().map(|b| b.col).collect();
        assert_eq!(cols, vec![0, 1, 2]);
        assert_eq!(
            rig.surface.calls.first(),
            Some(&SurfaceCall::Clear),
            "surface cleared before the first draw"
        );
    }

    #[test]
    fn player_completion_finishes_and_plays_idle() {
        let mut rig = Rig::new();
        let mut state = attached(
            AnimationState::new(0, three_frames(false), StateOptions::default()).fps(1000.0),
        );
        state.on_start(&mut rig.ctx(0.0)).unwrap();
        let mut requests = Vec::new();
        for tick in 0..10 {
            let now = tick as f64 * 2.0;
            let mut ctx = rig.ctx(now);
            state.on_update(&mut ctx, 2.0, now).unwrap();
            requests.extend(ctx.into_requests());
        }
        assert!(state.core().is_finished());
        assert_eq!(requests, vec![crate::IDLE.to_string()]);
    }

    #[test]
    fn draw_fault_still_reports_the_finish() {
        let mut rig = Rig::new();
        rig.surface.fail_blits = Some(crate::SurfaceError::Draw("gone".into()));
        let mut state = attached(
            AnimationState::new(0, three_frames(false), StateOptions::default()).fps(1000.0),
        );
        state.on_start(&mut rig.ctx(0.0)).unwrap();
        let mut requests = Vec::new();
        let mut tick = 0;
        while !state.core().is_finished() && tick < 10 {
            let now = tick as f64 * 2.0;
            let mut ctx = rig.ctx(now);
            let err = state.on_update(&mut ctx, 2.0, now).unwrap_err();
            assert!(!err.is_fatal());
            requests.extend(ctx.into_requests());
            tick += 1;
        }
        assert!(state.core().is_finished());
        assert_eq!(requests, vec![crate::IDLE.to_string()]);
    }

    #[test]
    fn duration_outlives_a_short_animation() {
        let mut rig = Rig::new();
        let mut state = attached(
            AnimationState::new(0, three_frames(false), StateOptions::default())
                .fps(1000.0)
                .duration(500.0)
                .transition(Transition::play("sleep")),
        );
        state.on_start(&mut rig.ctx(0.0)).unwrap();
        for now in [0.0, 10.0, 20.0, 30.0, 40.0, 499.0] {
            let mut ctx = rig.ctx(now);
            state.on_update(&mut ctx, 10.0, now).unwrap();
            assert!(ctx.requested().is_empty(), "finished early at {now}");
        }
        let mut ctx = rig.ctx(500.0);
        state.on_update(&mut ctx, 1.0, 500.0).unwrap();
        assert_eq!(ctx.requested(), ["sleep".to_string()]);
    }

    #[test]
    fn duration_truncates_a_looping_animation() {
        let mut rig = Rig::new();
        let mut state = attached(
            AnimationState::new(0, three_frames(true), StateOptions::default())
                .duration(100.0)
                .transition(Transition::Terminal),
        );
        state.on_start(&mut rig.ctx(0.0)).unwrap();
        state.on_update(&mut rig.ctx(0.0), 0.0, 0.0).unwrap();
        assert!(!state.core().is_finished());
        state.on_update(&mut rig.ctx(100.0), 100.0, 100.0).unwrap();
        assert!(state.core().is_finished());
    }

    #[test]
    fn persist_keeps_running_past_the_last_frame() {
        let mut rig = Rig::new();
        let mut state = attached(
            AnimationState::new(
                0,
                three_frames(false),
                StateOptions {
                    block: Vec::new(),
                    persist: true,
                },
            )
            .fps(1000.0),
        );
        state.on_start(&mut rig.ctx(0.0)).unwrap();
        for tick in 0..10 {
            let now = tick as f64 * 2.0;
            let mut ctx = rig.ctx(now);
            state.on_update(&mut ctx, 2.0, now).unwrap();
            assert!(ctx.requested().is_empty());
        }
        assert!(!state.core().is_finished());
    }

    #[test]
    fn move_to_walks_and_finishes_on_arrival() {
        let mut rig = Rig::new();
        let mut state = attached(
            AnimationState::new(0, three_frames(true), StateOptions::default())
                .move_to(MoveTo {
                    target: Vec2::new(20.0, 0.0),
                    speed: 5.0,
                })
                .transition(Transition::Terminal),
        );
        state.on_start(&mut rig.ctx(0.0)).unwrap();
        let mut ticks = 0;
        while !state.core().is_finished() {
            let now = ticks as f64 * 16.0;
            state.on_update(&mut rig.ctx(now), 16.0, now).unwrap();
            ticks += 1;
            assert!(ticks < 20);
        }
        assert_eq!(rig.position.x(), 15.0);
        assert_eq!(ticks, 4);
    }

    #[test]
    fn hooks_see_start_and_every_tick() {
        let mut rig = Rig::new();
        let mut state = attached(
            AnimationState::new(0, three_frames(true), StateOptions::default())
                .on_start_hook(|core, _ctx| {
                    core.memo.insert("ticks".into(), 0.into());
                    Ok(())
                })
                .on_tick_hook(|core, ctx, _dt, _now| {
                    let ticks = core.memo["ticks"].as_u64().unwrap_or(0) + 1;
                    core.memo.insert("ticks".into(), ticks.into());
                    if ticks == 3 {
                        ctx.play("wave");
                        core.finish();
                    }
                    Ok(())
                })
                .transition(Transition::Terminal),
        );
        state.on_start(&mut rig.ctx(0.0)).unwrap();
        let mut requests = Vec::new();
        for now in [0.0, 1.0, 2.0, 3.0] {
            let mut ctx = rig.ctx(now);
            state.on_update(&mut ctx, 1.0, now).unwrap();
            requests.extend(ctx.into_requests());
        }
        assert_eq!(requests, vec!["wave".to_string()]);
        assert_eq!(state.core().memo["ticks"], 3);
    }

    #[test]
    fn timer_state_waits_then_transitions() {
        let mut rig = Rig::new();
        let mut timer = TimerState::new(250.0, StateOptions::default())
            .transition(Transition::after(100.0, "walk"));
        timer.core.attach();
        timer.on_start(&mut rig.ctx(1_000.0)).unwrap();
        timer.on_update(&mut rig.ctx(1_200.0), 200.0, 1_200.0).unwrap();
        assert!(!timer.core().is_finished());
        timer.on_update(&mut rig.ctx(1_250.0), 50.0, 1_250.0).unwrap();
        assert!(timer.core().is_finished());
        assert_eq!(timer.core_mut().pop_due(1_349.0), None);
        assert_eq!(timer.core_mut().pop_due(1_350.0).as_deref(), Some("walk"));
        assert!(rig.surface.blits().next().is_none());
    }
}

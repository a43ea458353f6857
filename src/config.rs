//! JSON pet descriptions.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use bevy::log::info;
use bevy::math::Vec2;
use serde::{Deserialize, Deserializer};

use crate::animation::{AnimationState, MoveTo, TimerState};
use crate::error::{Error, Result};
use crate::frames::{AnimationSpec, FrameFrom, FramePlayer, FrameTo, SheetGeometry};
use crate::machine::{Machine, MachineBuilder, DEFAULT_CONTAINER};
use crate::menu::{MenuAction, PetContext};
use crate::position::DEFAULT_SPEED;
use crate::state::{Capability, State, StateCore, StateOptions};
use crate::surface::RenderSurface;
use crate::transition::Transition;
use crate::{IDLE, PREVIOUS};

const BUILTIN_CAT: &str = include_str!("../pets/cat.json");

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PetConfig {
    pub name: String,
    #[serde(default = "default_spawn")]
    pub spawn: [f32; 2],
    #[serde(default)]
    pub surface_size: Option<[f32; 2]>,
    #[serde(default = "default_container")]
    pub container: String,
    #[serde(default)]
    pub initial: Option<String>,
    #[serde(default)]
    pub drag_state: Option<String>,
    #[serde(default)]
    pub previous_exclusions: Option<Vec<String>>,
    pub sheets: Vec<SheetConfig>,
    pub states: BTreeMap<String, StateConfig>,
    #[serde(default)]
    pub actions: Vec<MenuAction>,
}

fn default_spawn() -> [f32; 2] {
    [200.0, 200.0]
}

fn default_container() -> String {
    DEFAULT_CONTAINER.to_owned()
}

fn default_scale() -> f32 {
    1.0
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetConfig {
    /// Asset path of the sheet image.
    pub image: String,
    pub cell_width: u32,
    pub cell_height: u32,
    pub sheet_width: u32,
    pub sheet_height: u32,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub flip: bool,
}

impl SheetConfig {
    pub fn geometry(&self) -> SheetGeometry {
        SheetGeometry {
            cell_width: self.cell_width,
            cell_height: self.cell_height,
            sheet_width: self.sheet_width,
            sheet_height: self.sheet_height,
            scale: self.scale,
            flip: self.flip,
        }
    }

    /// On-screen size of one cell.
    pub fn display_size(&self) -> Vec2 {
        Vec2::new(self.cell_width as f32, self.cell_height as f32) * self.scale
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    #[default]
    Animation,
    Timer,
    /// No behavior; held until something else plays.
    Plain,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    #[serde(default)]
    pub kind: StateKind,
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub from: FrameFrom,
    #[serde(default)]
    pub to: Option<FrameTo>,
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    /// Missing means the default transition, `null` means terminal.
    #[serde(default, deserialize_with = "present")]
    pub on_finish: Option<Option<TransitionConfig>>,
    #[serde(default)]
    pub move_to: Option<[f32; 2]>,
    #[serde(default)]
    pub speed: Option<f32>,
    #[serde(default)]
    pub block: Vec<Capability>,
    #[serde(default)]
    pub persist: bool,
}

fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Shapes accepted by `on_finish`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TransitionConfig {
    After(f64, String),
    Delay(f64),
    Play(String),
    /// `false` is terminal, `true` the default.
    Enabled(bool),
}

impl StateConfig {
    fn transition(&self) -> Transition {
        match &self.on_finish {
            None => Transition::Default,
            Some(None) => Transition::Terminal,
            Some(Some(TransitionConfig::After(delay, key))) => Transition::after(*delay, key),
            Some(Some(TransitionConfig::Delay(delay))) => Transition::Delay(*delay),
            Some(Some(TransitionConfig::Play(key))) => Transition::play(key),
            Some(Some(TransitionConfig::Enabled(false))) => Transition::Terminal,
            Some(Some(TransitionConfig::Enabled(true))) => Transition::Default,
        }
    }

    fn target(&self) -> Option<&str> {
        match &self.on_finish {
            None => Some(IDLE),
            Some(Some(TransitionConfig::After(_, key) | TransitionConfig::Play(key))) => {
                Some(key.as_str())
            }
            Some(Some(TransitionConfig::Delay(_) | TransitionConfig::Enabled(true))) => {
                Some(IDLE)
            }
            Some(None | Some(TransitionConfig::Enabled(false))) => None,
        }
    }

    fn options(&self) -> StateOptions {
        StateOptions {
            block: self.block.clone(),
            persist: self.persist,
        }
    }

    fn build(&self, key: &str) -> Result<Box<dyn State>> {
        let state: Box<dyn State> = match self.kind {
            StateKind::Plain => Box::new(StateCore::new(self.options())),
            StateKind::Timer => {
                let duration = self.duration.ok_or_else(|| {
                    Error::Config(format!("timer state \"{key}\" needs a duration"))
                })?;
                Box::new(TimerState::new(duration, self.options()).transition(self.transition()))
            }
            StateKind::Animation => {
                let to = self.to.ok_or_else(|| {
                    Error::Config(format!("animation state \"{key}\" needs a \"to\""))
                })?;
                let mut state = AnimationState::new(
                    self.index,
                    AnimationSpec {
                        from: self.from,
                        to,
                        repeat: self.repeat,
                    },
                    self.options(),
                )
                .transition(self.transition());
                if let Some(fps) = self.fps {
                    state = state.fps(fps);
                }
                if let Some(ms) = self.duration {
                    state = state.duration(ms);
                }
                if let Some([x, y]) = self.move_to {
                    state = state.move_to(MoveTo {
                        target: Vec2::new(x, y),
                        speed: self.speed.unwrap_or(DEFAULT_SPEED),
                    });
                }
                Box::new(state)
            }
        };
        Ok(state)
    }
}

impl PetConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// The cat shipped with the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CAT)
    }

    pub fn initial(&self) -> &str {
        self.initial.as_deref().unwrap_or(IDLE)
    }

    /// Reject graphs that would only fail once the pet is running.
    pub fn validate(&self) -> Result<()> {
        let keys: HashSet<&str> = self.states.keys().map(String::as_str).collect();
        let known = |key: &str| key == PREVIOUS || keys.contains(key);
        let players = self
            .sheets
            .iter()
            .map(|sheet| FramePlayer::new(sheet.geometry()))
            .collect::<Result<Vec<_>>>()?;

        for (key, state) in &self.states {
            if let Some(target) = state.target() {
                if !known(target) {
                    return Err(Error::UnknownState {
                        key: target.to_owned(),
                    });
                }
            }
            if state.kind != StateKind::Animation {
                continue;
            }
            let registered = players.len();
            let Some(sheet) = self.sheets.get(state.index) else {
                return Err(Error::UnknownFramePlayer {
                    index: state.index,
                    registered,
                });
            };
            if let Some(to) = state.to {
                let mut scratch = FramePlayer::new(sheet.geometry())?;
                let spec = AnimationSpec {
                    from: state.from,
                    to,
                    repeat: state.repeat,
                };
                scratch.set_animation(&spec, None).map_err(|err| {
                    Error::Config(format!("state \"{key}\": {err}"))
                })?;
            }
        }

        let extra = [Some(self.initial()), self.drag_state.as_deref()];
        let actions = self.actions.iter().map(|a| a.play.as_deref());
        for key in extra.into_iter().chain(actions).flatten() {
            if !known(key) {
                return Err(Error::UnknownState {
                    key: key.to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Build the machine and start it in its initial state.
    pub fn build<S: RenderSurface>(&self, surface: S, context: &PetContext) -> Result<Machine<S>> {
        self.build_at(surface, context, 0.0)
    }

    /// [`PetConfig::build`] for a host whose clock already reads `now` ms.
    pub fn build_at<S: RenderSurface>(
        &self,
        surface: S,
        context: &PetContext,
        now: f64,
    ) -> Result<Machine<S>> {
        self.validate()?;

        let [x, y] = self.spawn;
        let size = match self.surface_size {
            Some([w, h]) => Vec2::new(w, h),
            None => self
                .sheets
                .first()
                .map_or(Vec2::splat(64.0), SheetConfig::display_size),
        };
        let mut builder = MachineBuilder::new(self.name.clone())
            .starting_at(now)
            .container(self.container.clone())
            .spawn(x, y)
            .surface_size(size);
        if let Some(key) = &self.drag_state {
            builder = builder.drag_state(key.clone());
        }
        if let Some(keys) = &self.previous_exclusions {
            builder = builder.previous_exclusions(keys.iter().cloned());
        }
        for sheet in &self.sheets {
            builder = builder.player(FramePlayer::new(sheet.geometry())?);
        }
        for (key, state) in &self.states {
            builder = builder.boxed_state(key.clone(), state.build(key)?);
        }
        for action in &self.actions {
            builder = builder.action(action.clone());
        }

        let mut machine = builder.build(surface, context.clone())?;
        info!(
            "{}: {} state(s) on {} sheet(s)",
            self.name,
            self.states.len(),
            self.sheets.len()
        );
        machine.play(self.initial())?;
        Ok(machine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;
    use std::io::Write;

    fn pet(states: &str) -> String {
        format!(
            r#"{{
                "name": "test",
                "sheets": [{{ "image": "t.png", "cell_width": 10, "cell_height": 10,
                              "sheet_width": 40, "sheet_height": 20 }}],
                "states": {states}
            }}"#
        )
    }

    #[test]
    fn builtin_cat_builds() {
        let config = PetConfig::builtin().unwrap();
        let machine = config
            .build(RecordingSurface::new(), &PetContext::default())
            .unwrap();
        assert_eq!(machine.current_key(), Some("idle"));
        assert!(!machine.actions().is_empty());
    }

    #[test]
    fn on_finish_shapes() {
        let config = PetConfig::from_json(&pet(
            r#"{
                "idle": { "to": 4, "repeat": true },
                "a": { "to": 1, "on_finish": [200, "idle"] },
                "b": { "to": 1, "on_finish": "a" },
                "c": { "to": 1, "on_finish": 150 },
                "d": { "to": 1, "on_finish": null },
                "e": { "to": 1, "on_finish": false },
                "f": { "to": 1, "on_finish": true }
            }"#,
        ))
        .unwrap();
        let kinds: Vec<String> = config
            .states
            .values()
            .map(|s| format!("{:?}", s.transition()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                r#"After { delay: 200.0, key: "idle" }"#,
                r#"Play("a")"#,
                "Delay(150.0)",
                "Terminal",
                "Terminal",
                "Default",
                "Default",
            ]
        );
    }

    #[test]
    fn frame_shapes() {
        let config = PetConfig::from_json(&pet(
            r#"{ "idle": { "from": [1, 0], "to": [3, 1] }, "walk": { "from": 1, "to": 8 } }"#,
        ))
        .unwrap();
        assert_eq!(config.states["idle"].from, FrameFrom::Cell(1, 0));
        assert_eq!(config.states["idle"].to, Some(FrameTo::Cell(3, 1)));
        assert_eq!(config.states["walk"].from, FrameFrom::Row(1));
        assert_eq!(config.states["walk"].to, Some(FrameTo::Count(8)));
    }

    #[test]
    fn dangling_keys_are_rejected_up_front() {
        let config =
            PetConfig::from_json(&pet(r#"{ "idle": { "to": 1, "on_finish": "nap" } }"#)).unwrap();
        let err = config
            .build(RecordingSurface::new(), &PetContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownState { ref key } if key == "nap"));

        let config = PetConfig::from_json(&pet(r#"{ "idle": { "index": 2, "to": 1 } }"#)).unwrap();
        assert!(matches!(
            config.validate(),
            Err(Error::UnknownFramePlayer {
                index: 2,
                registered: 1
            })
        ));
    }

    #[test]
    fn ranges_off_the_sheet_are_rejected() {
        let config = PetConfig::from_json(&pet(r#"{ "idle": { "from": 3, "to": 4 } }"#)).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = PetConfig::from_json(r#"{ "name": 3 }"#).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            pet(r#"{ "idle": { "kind": "timer", "duration": 1000, "on_finish": null } }"#)
        )
        .unwrap();
        let config = PetConfig::load(file.path()).unwrap();
        assert_eq!(config.states["idle"].kind, StateKind::Timer);
        assert!(matches!(
            PetConfig::load(file.path().with_extension("missing")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn timer_without_duration_fails_to_build() {
        let config = PetConfig::from_json(&pet(r#"{ "idle": { "kind": "timer" } }"#)).unwrap();
        assert!(matches!(
            config.build(RecordingSurface::new(), &PetContext::default()),
            Err(Error::Config(_))
        ));
    }
}

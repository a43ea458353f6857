//! Bevy front-end: one transparent always-on-top window, one sprite per pet.

use std::collections::HashSet;

use bevy::asset::AssetPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::window::{PrimaryWindow, WindowLevel, WindowMode, WindowPosition, WindowResolution};

use crate::config::PetConfig;
use crate::error::{Result, SurfaceError};
use crate::host::{Host, MachineId};
use crate::menu::PetContext;
use crate::position::{PointerButton, PointerEvent, PointerPhase};
use crate::surface::{Blit, Placement, RenderSurface};

// ===== Menu look =====
const MENU_GROW_SECS: f64 = 0.15;
const MENU_FONT_SIZE: f32 = 36.0;
// labels sit above every pet
const MENU_Z: f32 = 10.0;

/// Everything the binary resolved from its command line.
#[derive(Resource, Clone, Debug)]
pub struct LaunchConfig {
    pub pets: Vec<PetConfig>,
    pub width: f32,
    pub height: f32,
    /// Root the sheet image paths are resolved against.
    pub assets: String,
    pub log_filter: String,
    pub context: PetContext,
}

/// Texture and grid layout of one loaded sheet.
#[derive(Clone, Debug)]
pub struct SheetHandles {
    pub texture: Handle<Image>,
    pub layout: Handle<TextureAtlasLayout>,
    pub columns: u32,
}

/// Render surface backed by a bevy sprite.
///
/// The engine writes into it during the tick; `sync_surfaces` copies the
/// latest frame and placement onto the sprite entity afterwards.
#[derive(Debug, Default)]
pub struct SpriteSurface {
    sheets: Vec<SheetHandles>,
    container: Option<String>,
    frame: Option<Blit>,
    placement: Placement,
}

impl SpriteSurface {
    pub fn new(sheets: Vec<SheetHandles>) -> Self {
        Self {
            sheets,
            ..Self::default()
        }
    }

    pub fn frame(&self) -> Option<&Blit> {
        self.frame.as_ref()
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn sheet(&self, index: usize) -> Option<&SheetHandles> {
        self.sheets.get(index)
    }

    /// Atlas index of the current frame.
    pub fn atlas_index(&self) -> Option<usize> {
        let frame = self.frame.as_ref()?;
        let sheet = self.sheets.get(frame.sheet)?;
        Some((frame.row * sheet.columns + frame.col) as usize)
    }
}

impl RenderSurface for SpriteSurface {
    fn clear(&mut self) {
        self.frame = None;
    }

    fn blit(&mut self, blit: &Blit) -> Result<(), SurfaceError> {
        if self.container.is_none() {
            return Err(SurfaceError::Detached);
        }
        if blit.sheet >= self.sheets.len() {
            return Err(SurfaceError::MissingSheet(blit.sheet));
        }
        self.frame = Some(*blit);
        Ok(())
    }

    fn place(&mut self, placement: Placement) {
        self.placement = placement;
    }

    fn attach(&mut self, container: &str) -> Result<(), SurfaceError> {
        self.container = Some(container.to_owned());
        Ok(())
    }

    fn detach(&mut self) {
        self.container = None;
        self.frame = None;
    }

    fn is_attached(&self) -> bool {
        self.container.is_some()
    }
}

#[derive(Component)]
pub struct PetSprite(pub MachineId);

#[derive(Component)]
struct MenuLabel {
    owner: MachineId,
    from: Vec2,
    at: Vec2,
    opened: f64,
}

pub fn build_app(launch: LaunchConfig) -> App {
    let mut app = App::new();
    app.add_plugins(
        DefaultPlugins
            .set(AssetPlugin {
                file_path: launch.assets.clone(),
                ..default()
            })
            .set(WindowPlugin {
                primary_window: Some(Window {
                    title: "adorapet".into(),
                    name: Some("adorapet".into()),
                    resolution: WindowResolution::new(launch.width, launch.height),
                    resizable: false,
                    decorations: false,
                    transparent: true,
                    window_level: WindowLevel::AlwaysOnTop,
                    position: WindowPosition::Centered(MonitorSelection::Primary),
                    mode: WindowMode::Windowed,
                    ..default()
                }),
                ..default()
            })
            .set(LogPlugin {
                filter: launch.log_filter.clone(),
                ..default()
            })
            .set(ImagePlugin::default_nearest()),
    )
    .insert_resource(ClearColor(Color::srgba(0.0, 0.0, 0.0, 0.0)))
    .insert_non_send_resource(Host::<SpriteSurface>::new())
    .insert_resource(launch)
    .add_systems(Startup, (setup_camera, spawn_pets))
    .add_systems(
        Update,
        (route_pointer, drive_pets, sync_surfaces, sync_menus).chain(),
    );
    app
}

/// Pet coordinates are window pixels, origin top-left, y down.
pub fn to_world(point: Vec2, window: Vec2) -> Vec2 {
    Vec2::new(point.x - window.x / 2.0, window.y / 2.0 - point.y)
}

fn window_size(windows: &Query<&Window, With<PrimaryWindow>>) -> Option<Vec2> {
    windows
        .get_single()
        .ok()
        .map(|w| Vec2::new(w.width(), w.height()))
}

fn report(result: Result<()>, exit: &mut EventWriter<AppExit>) {
    if let Err(err) = result {
        if err.is_fatal() {
            error!("{err}");
            exit.send(AppExit::error());
        } else {
            warn!("{err}");
        }
    }
}

/// Camera so sprites can be drawn
fn setup_camera(mut commands: Commands) {
    commands.spawn(Camera2dBundle::default());
}

/// Queue every sheet, build the machines and hand them to the host.
fn spawn_pets(
    launch: Res<LaunchConfig>,
    asset_server: Res<AssetServer>,
    mut layouts: ResMut<Assets<TextureAtlasLayout>>,
    mut host: NonSendMut<Host<SpriteSurface>>,
    time: Res<Time>,
    mut exit: EventWriter<AppExit>,
) {
    let now = time.elapsed_seconds_f64() * 1000.0;
    for pet in &launch.pets {
        let sheets = pet
            .sheets
            .iter()
            .map(|sheet| {
                let geometry = sheet.geometry();
                let columns = geometry.sheet_width / geometry.cell_width.max(1);
                let rows = geometry.sheet_height / geometry.cell_height.max(1);
                let layout = TextureAtlasLayout::from_grid(
                    UVec2::new(geometry.cell_width, geometry.cell_height),
                    columns,
                    rows,
                    None,
                    None,
                );
                SheetHandles {
                    texture: asset_server.load(sheet.image.clone()),
                    layout: layouts.add(layout),
                    columns,
                }
            })
            .collect();

        match pet.build_at(SpriteSurface::new(sheets), &launch.context, now) {
            Ok(machine) => {
                let id = host.register(machine);
                info!("spawned {} as {id:?}", pet.name);
            }
            Err(err) => {
                error!("{}: {err}", pet.name);
                exit.send(AppExit::error());
                return;
            }
        }
    }
}

/// Turn mouse and touch input into drag, menu and selection events.
fn route_pointer(
    buttons: Res<ButtonInput<MouseButton>>,
    touches: Res<Touches>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut host: NonSendMut<Host<SpriteSurface>>,
    mut exit: EventWriter<AppExit>,
) {
    let cursor = windows.get_single().ok().and_then(Window::cursor_position);
    let points: Vec<Vec2> = touches.iter().map(|t| t.position()).collect();

    let mut press = None;
    if buttons.just_pressed(MouseButton::Left) {
        press = cursor
            .map(|at| PointerEvent::mouse(PointerPhase::Press, at, PointerButton::Primary));
    } else if touches.any_just_pressed() && !points.is_empty() {
        press = Some(PointerEvent::touch(PointerPhase::Press, points.clone()));
    }

    if let Some(event) = press {
        let Some(at) = event.point() else {
            return;
        };
        // an open menu swallows the click, on an entry or outside it
        let mut consumed = false;
        for (_, machine) in host.iter_mut() {
            let Some(index) = machine.menu().map(|menu| menu.entry_at(at)) else {
                continue;
            };
            consumed = true;
            match index {
                Some(index) => report(machine.select_menu(index), &mut exit),
                None => {
                    machine.close_menu();
                }
            }
        }
        if !consumed {
            if let Some((_, machine)) = host.iter_mut().filter(|(_, m)| m.hit_test(at)).last() {
                report(machine.pointer(&event).map(drop), &mut exit);
            }
        }
    }

    if buttons.just_pressed(MouseButton::Right) {
        if let Some(at) = cursor {
            if let Some((id, machine)) = host.iter_mut().filter(|(_, m)| m.hit_test(at)).last() {
                if !machine.open_menu() {
                    debug!("{id:?}: menu refused");
                }
            }
        }
    }

    let moved = if !points.is_empty() {
        Some(PointerEvent::touch(PointerPhase::Move, points))
    } else {
        cursor.map(|at| PointerEvent::mouse(PointerPhase::Move, at, PointerButton::Primary))
    };
    let released = if buttons.just_released(MouseButton::Left) {
        let at = cursor.unwrap_or_default();
        Some(PointerEvent::mouse(PointerPhase::Release, at, PointerButton::Primary))
    } else if touches.any_just_released() {
        Some(PointerEvent::touch(PointerPhase::Release, Vec::new()))
    } else {
        None
    };

    for (_, machine) in host.iter_mut() {
        if !machine.position().is_dragging() {
            continue;
        }
        if let Some(event) = &moved {
            report(machine.pointer(event).map(drop), &mut exit);
        }
        if let Some(event) = &released {
            report(machine.pointer(event).map(drop), &mut exit);
        }
    }
}

/// One host tick per frame, in engine milliseconds.
fn drive_pets(
    time: Res<Time>,
    mut host: NonSendMut<Host<SpriteSurface>>,
    mut exit: EventWriter<AppExit>,
) {
    let now = time.elapsed_seconds_f64() * 1000.0;
    if let Err(err) = host.tick(now) {
        error!("stopping: {err}");
        exit.send(AppExit::error());
    }
}

/// Mirror every surface onto its sprite, spawning and despawning as
/// machines come and go.
fn sync_surfaces(
    mut commands: Commands,
    host: NonSend<Host<SpriteSurface>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut sprites: Query<(
        Entity,
        &PetSprite,
        &mut Transform,
        &mut TextureAtlas,
        &mut Sprite,
        &mut Handle<Image>,
        &mut Visibility,
    )>,
) {
    let Some(window) = window_size(&windows) else {
        return;
    };
    let mut seen = HashSet::new();

    for (entity, pet, mut transform, mut atlas, mut sprite, mut texture, mut visibility) in
        &mut sprites
    {
        let Some(surface) = host.get(pet.0).and_then(|m| m.surface()) else {
            debug!("despawning sprite of {:?}", pet.0);
            commands.entity(entity).despawn();
            continue;
        };
        seen.insert(pet.0);

        *transform = sprite_transform(surface.placement(), window);
        let (Some(frame), Some(index)) = (surface.frame(), surface.atlas_index()) else {
            *visibility = Visibility::Hidden;
            continue;
        };
        let Some(sheet) = surface.sheet(frame.sheet) else {
            continue;
        };
        if *texture != sheet.texture {
            *texture = sheet.texture.clone();
        }
        if atlas.layout != sheet.layout {
            atlas.layout = sheet.layout.clone();
        }
        atlas.index = index;
        sprite.custom_size = Some(frame.size);
        sprite.flip_x = frame.flip;
        *visibility = if surface.is_attached() {
            Visibility::Visible
        } else {
            Visibility::Hidden
        };
    }

    for (id, machine) in host.iter() {
        if seen.contains(&id) {
            continue;
        }
        let Some(surface) = machine.surface() else {
            continue;
        };
        let (Some(frame), Some(index)) = (surface.frame(), surface.atlas_index()) else {
            continue;
        };
        let Some(sheet) = surface.sheet(frame.sheet) else {
            continue;
        };
        commands.spawn((
            SpriteBundle {
                texture: sheet.texture.clone(),
                transform: sprite_transform(surface.placement(), window),
                sprite: Sprite {
                    custom_size: Some(frame.size),
                    flip_x: frame.flip,
                    ..default()
                },
                ..default()
            },
            TextureAtlas {
                layout: sheet.layout.clone(),
                index,
            },
            PetSprite(id),
        ));
    }
}

fn sprite_transform(placement: Placement, window: Vec2) -> Transform {
    let at = to_world(Vec2::new(placement.x, placement.y), window);
    Transform {
        translation: at.extend(0.0),
        rotation: Quat::from_rotation_z(-placement.rotation.to_radians()),
        scale: Vec3::ONE,
    }
}

/// Keep one text label per entry of every open menu, grown out from the pet.
fn sync_menus(
    mut commands: Commands,
    host: NonSend<Host<SpriteSurface>>,
    time: Res<Time>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut labels: Query<(Entity, &MenuLabel, &mut Transform)>,
) {
    let Some(window) = window_size(&windows) else {
        return;
    };
    let now = time.elapsed_seconds_f64();
    let mut shown = HashSet::new();

    for (entity, label, mut transform) in &mut labels {
        if host.get(label.owner).and_then(|m| m.menu()).is_none() {
            commands.entity(entity).despawn();
            continue;
        }
        shown.insert(label.owner);
        let t = ((now - label.opened) / MENU_GROW_SECS).clamp(0.0, 1.0) as f32;
        let at = to_world(label.from.lerp(label.at, t), window);
        transform.translation = at.extend(MENU_Z);
    }

    for (id, machine) in host.iter() {
        let Some(menu) = machine.menu() else {
            continue;
        };
        if shown.contains(&id) {
            continue;
        }
        for entry in menu.entries() {
            commands.spawn((
                Text2dBundle {
                    text: Text::from_section(
                        entry.label.clone(),
                        TextStyle {
                            font_size: MENU_FONT_SIZE,
                            color: Color::WHITE,
                            ..default()
                        },
                    ),
                    transform: Transform::from_translation(
                        to_world(entry.from, window).extend(MENU_Z),
                    ),
                    ..default()
                },
                MenuLabel {
                    owner: id,
                    from: entry.from,
                    at: entry.at,
                    opened: now,
                },
            ));
        }
    }
}

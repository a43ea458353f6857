//! Radial context menu model.

use std::f32::consts::PI;

use bevy::math::Vec2;
use serde::Deserialize;

/// Slots around the circle; entries past the last slot wrap.
pub const MENU_SLOTS: usize = 8;
pub const DEFAULT_RADIUS: f32 = 130.0;
/// Hit radius of one entry.
pub const ENTRY_RADIUS: f32 = 40.0;

/// One entry of a pet's action list.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MenuAction {
    pub id: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub play: Option<String>,
}

impl MenuAction {
    pub fn play(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image: None,
            play: Some(key.into()),
        }
    }
}

/// State shared by every pet of one host, handed to each machine when it is
/// built.
#[derive(Clone, Debug)]
pub struct PetContext {
    /// Labels for entries that carry no image, by slot.
    pub icon_fallbacks: Vec<String>,
    pub menu_radius: f32,
}

impl Default for PetContext {
    fn default() -> Self {
        Self {
            icon_fallbacks: ["🍈", "🍇", "🍉", "🍊", "🍋", "🍌"]
                .into_iter()
                .map(String::from)
                .collect(),
            menu_radius: DEFAULT_RADIUS,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MenuEntry {
    pub id: String,
    pub label: String,
    pub play: Option<String>,
    /// Resting place of the entry.
    pub at: Vec2,
    /// Point a quarter of the way out the entry grows from.
    pub from: Vec2,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContextMenu {
    origin: Vec2,
    radius: f32,
    entries: Vec<MenuEntry>,
}

impl ContextMenu {
    /// Lay `actions` out around `origin`, first slot straight up.
    pub fn layout(origin: Vec2, actions: &[MenuAction], context: &PetContext) -> Self {
        let radius = context.menu_radius;
        let entries = actions
            .iter()
            .enumerate()
            .map(|(i, action)| {
                let angle = (i % MENU_SLOTS) as f32 * 2.0 * PI / MENU_SLOTS as f32 - PI / 2.0;
                let dir = Vec2::new(angle.cos(), angle.sin());
                let label = action
                    .image
                    .clone()
                    .or_else(|| context.icon_fallbacks.get(i).cloned())
                    .unwrap_or_default();
                MenuEntry {
                    id: action.id.clone(),
                    label,
                    play: action.play.clone(),
                    at: origin + dir * radius,
                    from: origin + dir * (radius / 4.0),
                }
            })
            .collect();
        Self {
            origin,
            radius,
            entries,
        }
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    pub fn entry_at(&self, point: Vec2) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.at.distance(point) <= ENTRY_RADIUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actions(n: usize) -> Vec<MenuAction> {
        (0..n)
            .map(|i| MenuAction::play(format!("a{i}"), format!("s{i}")))
            .collect()
    }

    #[test]
    fn first_slot_is_straight_up() {
        let menu =
            ContextMenu::layout(Vec2::new(200.0, 200.0), &actions(3), &PetContext::default());
        let up = menu.entries()[0].at;
        assert!((up.x - 200.0).abs() < 1e-3);
        assert!((up.y - 70.0).abs() < 1e-3);
        let right = menu.entries()[2].at;
        assert!((right.x - 330.0).abs() < 1e-3);
        assert!((right.y - 200.0).abs() < 1e-3);
        let from = menu.entries()[0].from;
        assert!((from.y - 167.5).abs() < 1e-3);
    }

    #[test]
    fn labels_fall_back_to_shared_icons() {
        let mut list = actions(2);
        list[1].image = Some("zz".into());
        let context = PetContext {
            icon_fallbacks: vec!["x".into()],
            menu_radius: 50.0,
        };
        let menu = ContextMenu::layout(Vec2::ZERO, &list, &context);
        assert_eq!(menu.entries()[0].label, "x");
        assert_eq!(menu.entries()[1].label, "zz");
        assert_eq!(menu.radius(), 50.0);
    }

    #[test]
    fn hit_testing_entries() {
        let menu = ContextMenu::layout(Vec2::ZERO, &actions(4), &PetContext::default());
        assert_eq!(menu.entry_at(Vec2::new(5.0, -125.0)), Some(0));
        assert_eq!(menu.entry_at(Vec2::ZERO), None);
    }
}

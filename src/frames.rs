//! Sprite-sheet frame player.
//!
//! A [`FramePlayer`] walks a (column, row) cursor across a playback range of
//! one sheet. Ranges are expressed the way pet files write them: the start is
//! a row (column 0) or an explicit cell, the end is a frame count measured
//! from the sheet origin or an explicit cell.

use bevy::math::{UVec2, Vec2};
use serde::Deserialize;

use crate::error::{Error, Result, SurfaceError};
use crate::surface::{Blit, RenderSurface};

/// Where playback starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FrameFrom {
    Row(u32),
    Cell(u32, u32),
}

impl Default for FrameFrom {
    fn default() -> Self {
        FrameFrom::Row(0)
    }
}

/// Where playback ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FrameTo {
    /// Number of frames counted from the first cell of the sheet.
    Count(u32),
    Cell(u32, u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnimationSpec {
    pub from: FrameFrom,
    pub to: FrameTo,
    pub repeat: bool,
}

/// Geometry of one sheet, in sheet pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SheetGeometry {
    pub cell_width: u32,
    pub cell_height: u32,
    pub sheet_width: u32,
    pub sheet_height: u32,
    pub scale: f32,
    pub flip: bool,
}

/// Outcome of one [`FramePlayer::update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Not running.
    Idle,
    Advanced,
    /// Hit the end cell with repeat on; the cursor is back at the start.
    Restarted,
    /// Hit the end cell with repeat off; playback stopped.
    Finished,
}

pub type FinishFn = Box<dyn FnMut()>;

pub struct FramePlayer {
    cell: UVec2,
    columns: u32,
    rows: u32,
    // column is signed: the pre-roll sits one cell left of the start
    col: i32,
    row: u32,
    start: (u32, u32),
    end: (u32, u32),
    repeat: bool,
    running: bool,
    // set by the first update after set_animation
    primed: bool,
    pub scale: f32,
    pub flip: bool,
    on_finish: Option<FinishFn>,
}

/// Terminal cell of a linear frame count.
///
/// An exact multiple of `columns` ends on the last column of the previous
/// row, not on column 0 of the next one.
pub fn terminal_cell(count: u32, columns: u32) -> Result<(u32, u32)> {
    if count == 0 {
        return Err(Error::invalid_range("frame count must be at least 1"));
    }
    let rem = count % columns;
    let rows = count / columns;
    if rem == 0 {
        Ok((columns - 1, rows - 1))
    } else {
        Ok((rem - 1, rows))
    }
}

impl FramePlayer {
    pub fn new(geometry: SheetGeometry) -> Result<Self> {
        if geometry.cell_width == 0 || geometry.cell_height == 0 {
            return Err(Error::invalid_range("cell size must be non-zero"));
        }
        let columns = geometry.sheet_width / geometry.cell_width;
        let rows = geometry.sheet_height / geometry.cell_height;
        if columns == 0 || rows == 0 {
            return Err(Error::invalid_range(format!(
                "sheet {}x{} holds no {}x{} cell",
                geometry.sheet_width,
                geometry.sheet_height,
                geometry.cell_width,
                geometry.cell_height
            )));
        }
        Ok(Self {
            cell: UVec2::new(geometry.cell_width, geometry.cell_height),
            columns,
            rows,
            col: 0,
            row: 0,
            start: (0, 0),
            end: (0, 0),
            repeat: false,
            running: false,
            primed: false,
            scale: if geometry.scale > 0.0 {
                geometry.scale
            } else {
                1.0
            },
            flip: geometry.flip,
            on_finish: None,
        })
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cell_size(&self) -> UVec2 {
        self.cell
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn range(&self) -> ((u32, u32), (u32, u32)) {
        (self.start, self.end)
    }

    /// Cursor cell, `None` before the first update of an animation.
    pub fn cursor(&self) -> Option<(u32, u32)> {
        if !self.primed {
            return None;
        }
        u32::try_from(self.col).ok().map(|col| (col, self.row))
    }

    /// Position of a cell in reading order.
    pub fn linear(&self, (col, row): (u32, u32)) -> u32 {
        row * self.columns + col
    }

    /// Resolve `spec` against this sheet and start playing it.
    pub fn set_animation(
        &mut self,
        spec: &AnimationSpec,
        on_finish: Option<FinishFn>,
    ) -> Result<()> {
        let start = match spec.from {
            FrameFrom::Row(row) => (0, row),
            FrameFrom::Cell(col, row) => (col, row),
        };
        let end = match spec.to {
            FrameTo::Count(count) => terminal_cell(count, self.columns)?,
            FrameTo::Cell(col, row) => (col, row),
        };
        for (what, (col, row)) in [("start", start), ("end", end)] {
            if col >= self.columns || row >= self.rows {
                return Err(Error::invalid_range(format!(
                    "{what} cell ({col},{row}) outside a {}x{} sheet",
                    self.columns, self.rows
                )));
            }
        }
        if self.linear(end) < self.linear(start) {
            return Err(Error::invalid_range(format!(
                "end cell {end:?} precedes start cell {start:?}"
            )));
        }

        self.start = start;
        self.end = end;
        self.col = start.0 as i32 - 1;
        self.row = start.1;
        self.repeat = spec.repeat;
        self.running = true;
        self.primed = false;
        self.on_finish = on_finish;
        Ok(())
    }

    pub fn update(&mut self) -> Step {
        if !self.running {
            return Step::Idle;
        }
        self.primed = true;
        let (start_col, start_row) = self.start;
        let (end_col, end_row) = self.end;

        if self.row >= end_row && self.col >= end_col as i32 {
            if self.repeat {
                self.col = start_col as i32;
                self.row = start_row;
                return Step::Restarted;
            }
            self.running = false;
            if let Some(on_finish) = self.on_finish.as_mut() {
                on_finish();
            }
            return Step::Finished;
        }

        if self.col >= self.columns as i32 - 1
            || (self.col >= end_col as i32 && end_row <= start_row)
        {
            self.row += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Step::Advanced
    }

    /// Draw the cursor cell of sheet `sheet` onto `surface`.
    pub fn render(
        &self,
        sheet: usize,
        surface: &mut dyn RenderSurface,
    ) -> Result<(), SurfaceError> {
        let Some((col, row)) = self.cursor() else {
            return Ok(());
        };
        surface.blit(&Blit {
            sheet,
            col,
            row,
            cell: self.cell,
            size: Vec2::new(self.cell.x as f32, self.cell.y as f32) * self.scale,
            flip: self.flip,
        })
    }
}

impl std::fmt::Debug for FramePlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePlayer")
            .field("cell", &self.cell)
            .field("columns", &self.columns)
            .field("cursor", &(self.col, self.row))
            .field("range", &(self.start, self.end))
            .field("repeat", &self.repeat)
            .field("running", &self.running)
            .field("primed", &self.primed)
            .finish_non_exhaustive()
    }
}

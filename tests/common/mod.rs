use adorapet::{
    AnimationSpec, AnimationState, FrameFrom, FramePlayer, FrameTo, MachineBuilder, Machine,
    PetContext, RecordingSurface, SheetGeometry, StateCore, StateOptions, Transition,
};

pub fn sheet() -> FramePlayer {
    FramePlayer::new(SheetGeometry {
        cell_width: 32,
        cell_height: 32,
        sheet_width: 256,
        sheet_height: 64,
        scale: 2.0,
        flip: false,
    })
    .unwrap()
}

/// Two-row loop drawn from row `row`.
pub fn looping(row: u32) -> AnimationState {
    AnimationState::new(
        0,
        AnimationSpec {
            from: FrameFrom::Row(row),
            to: FrameTo::Cell(7, row),
            repeat: true,
        },
        StateOptions::default(),
    )
    .fps(10.0)
}

/// Single frame on row 1 with the given transition, finishing on its second tick.
pub fn one_shot(transition: Transition) -> AnimationState {
    AnimationState::new(
        0,
        AnimationSpec {
            from: FrameFrom::Row(1),
            to: FrameTo::Cell(0, 1),
            repeat: false,
        },
        StateOptions::default(),
    )
    .fps(10.0)
    .transition(transition)
}

pub fn pet(extra: Vec<(&str, AnimationState)>) -> Machine<RecordingSurface> {
    let mut builder = MachineBuilder::new("test")
        .player(sheet())
        .state("idle", looping(0))
        .state("walk", looping(1))
        .state(
            "drag",
            StateCore::new(StateOptions {
                block: Vec::new(),
                persist: true,
            }),
        )
        .drag_state("drag");
    for (key, state) in extra {
        builder = builder.state(key, state);
    }
    builder
        .build(RecordingSurface::new(), PetContext::default())
        .unwrap()
}

/// Ticks at a fixed 16 ms step from `from` up to and including `to`.
pub fn run(machine: &mut Machine<RecordingSurface>, from: f64, to: f64) {
    let mut now = from;
    while now <= to {
        machine.update(16.0, now).unwrap();
        now += 16.0;
    }
}

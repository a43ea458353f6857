//! Tick source over every live machine.

use std::collections::BTreeMap;

use bevy::log::{debug, warn};

use crate::error::Result;
use crate::machine::Machine;
use crate::surface::RenderSurface;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MachineId(u64);

pub struct Host<S: RenderSurface> {
    machines: BTreeMap<MachineId, Machine<S>>,
    next_id: u64,
    last_tick: Option<f64>,
}

impl<S: RenderSurface> Default for Host<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RenderSurface> Host<S> {
    pub fn new() -> Self {
        Self {
            machines: BTreeMap::new(),
            next_id: 0,
            last_tick: None,
        }
    }

    pub fn register(&mut self, machine: Machine<S>) -> MachineId {
        let id = MachineId(self.next_id);
        self.next_id += 1;
        debug!("registered {} as {id:?}", machine.name());
        self.machines.insert(id, machine);
        id
    }

    pub fn deregister(&mut self, id: MachineId) -> Option<Machine<S>> {
        self.machines.remove(&id)
    }

    pub fn get(&self, id: MachineId) -> Option<&Machine<S>> {
        self.machines.get(&id).filter(|m| !m.is_removed())
    }

    pub fn get_mut(&mut self, id: MachineId) -> Option<&mut Machine<S>> {
        self.machines.get_mut(&id).filter(|m| !m.is_removed())
    }

    /// Live machines in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (MachineId, &Machine<S>)> {
        self.machines
            .iter()
            .filter(|(_, m)| !m.is_removed())
            .map(|(id, m)| (*id, m))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (MachineId, &mut Machine<S>)> {
        self.machines
            .iter_mut()
            .filter(|(_, m)| !m.is_removed())
            .map(|(id, m)| (*id, m))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop removed machines, then update the rest once each.
    ///
    /// Configuration errors abort the tick and are returned. Anything else is
    /// logged and the machine gets another go next tick.
    pub fn tick(&mut self, now: f64) -> Result<()> {
        let dt = self.last_tick.map_or(0.0, |last| now - last);
        self.last_tick = Some(now);

        self.machines.retain(|id, m| {
            if m.is_removed() {
                debug!("dropping removed machine {id:?}");
            }
            !m.is_removed()
        });

        for machine in self.machines.values_mut() {
            if let Err(err) = machine.update(dt, now) {
                if err.is_fatal() {
                    return Err(err);
                }
                warn!("{}: skipping tick: {err}", machine.name());
            }
        }
        Ok(())
    }
}

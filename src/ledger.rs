//! Bookkeeping for every object the app creates.
//!
//! Each guard reports itself to the [`ResourceLedger`] when it is created and
//! again when it is released. Once everything has been dropped the ledger can
//! be audited: persistent objects have to be released in the exact reverse
//! order they were created in, and nothing may be left alive.

use std::{cell::RefCell, collections::HashSet, fmt, rc::Rc};

use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Window,
    Instance,
    DebugMessenger,
    Surface,
    Device,
    Swapchain,
    ImageView,
    RenderPass,
    PipelineLayout,
    ShaderModule,
    Pipeline,
    Framebuffer,
    CommandPool,
}

impl ResourceKind {
    /// Transient objects are created and released in the middle of
    /// initialization, so they are only checked for leaks.
    pub fn is_transient(self) -> bool {
        matches!(self, ResourceKind::ShaderModule)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub raw: u64,
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:#x})", self.kind, self.raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEvent {
    Created(ResourceId),
    Released(ResourceId),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerViolation {
    #[error("{0} was released but is not alive")]
    UnknownRelease(ResourceId),
    #[error("{released} was released while {expected} was still alive")]
    OutOfOrder {
        released: ResourceId,
        expected: ResourceId,
    },
    #[error("{0} was never released")]
    Leaked(ResourceId),
}

#[derive(Debug, Default)]
pub struct ResourceLedger {
    events: RefCell<Vec<LedgerEvent>>,
}

impl ResourceLedger {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn created(&self, kind: ResourceKind, raw: u64) {
        let id = ResourceId { kind, raw };
        trace!("Created {}", id);
        self.events.borrow_mut().push(LedgerEvent::Created(id));
    }

    pub fn released(&self, kind: ResourceKind, raw: u64) {
        let id = ResourceId { kind, raw };
        debug!("Releasing {}", id);
        self.events.borrow_mut().push(LedgerEvent::Released(id));
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.borrow().clone()
    }

    /// Number of objects created but not yet released
    pub fn live_count(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .map(|event| match event {
                LedgerEvent::Created(_) => 1isize,
                LedgerEvent::Released(_) => -1,
            })
            .sum::<isize>()
            .max(0) as usize
    }

    /// Replays the recorded events and reports the first violation found.
    pub fn audit(&self) -> Result<(), LedgerViolation> {
        let mut live = Vec::new();
        let mut live_transient = HashSet::new();

        for event in self.events.borrow().iter() {
            match *event {
                LedgerEvent::Created(id) if id.kind.is_transient() => {
                    live_transient.insert(id);
                }
                LedgerEvent::Created(id) => live.push(id),
                LedgerEvent::Released(id) if id.kind.is_transient() => {
                    if !live_transient.remove(&id) {
                        return Err(LedgerViolation::UnknownRelease(id));
                    }
                }
                LedgerEvent::Released(id) => match live.last() {
                    Some(last) if *last == id => {
                        live.pop();
                    }
                    Some(last) if live.contains(&id) => {
                        return Err(LedgerViolation::OutOfOrder {
                            released: id,
                            expected: *last,
                        });
                    }
                    _ => return Err(LedgerViolation::UnknownRelease(id)),
                },
            }
        }

        if let Some(leaked) = live.first().or_else(|| live_transient.iter().next()) {
            return Err(LedgerViolation::Leaked(*leaked));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ResourceKind::*;

    /// Records the same sequence a full run of the app produces.
    fn record_full_run(ledger: &ResourceLedger, image_count: u64) {
        let persistent = [Window, Instance, Surface, Device, Swapchain];
        for (raw, kind) in persistent.iter().enumerate() {
            ledger.created(*kind, raw as u64 + 1);
        }
        for view in 0..image_count {
            ledger.created(ImageView, 100 + view);
        }
        ledger.created(RenderPass, 200);
        ledger.created(PipelineLayout, 300);
        ledger.created(ShaderModule, 400);
        ledger.created(ShaderModule, 401);
        ledger.created(Pipeline, 500);
        ledger.released(ShaderModule, 401);
        ledger.released(ShaderModule, 400);
        for framebuffer in 0..image_count {
            ledger.created(Framebuffer, 600 + framebuffer);
        }
        ledger.created(CommandPool, 700);

        ledger.released(CommandPool, 700);
        for framebuffer in (0..image_count).rev() {
            ledger.released(Framebuffer, 600 + framebuffer);
        }
        ledger.released(Pipeline, 500);
        ledger.released(PipelineLayout, 300);
        ledger.released(RenderPass, 200);
        for view in (0..image_count).rev() {
            ledger.released(ImageView, 100 + view);
        }
        for (raw, kind) in persistent.iter().enumerate().rev() {
            ledger.released(*kind, raw as u64 + 1);
        }
    }

    #[test]
    fn full_run_passes_audit() {
        let ledger = ResourceLedger::new();
        record_full_run(&ledger, 3);
        assert_eq!(ledger.audit(), Ok(()));
        assert_eq!(ledger.live_count(), 0);
    }

    #[test]
    fn release_events_mirror_create_events() {
        let ledger = ResourceLedger::new();
        record_full_run(&ledger, 4);

        let persistent = |event: &LedgerEvent| match event {
            LedgerEvent::Created(id) | LedgerEvent::Released(id) => !id.kind.is_transient(),
        };
        let created = ledger
            .events()
            .iter()
            .filter(|event| persistent(event))
            .filter_map(|event| match event {
                LedgerEvent::Created(id) => Some(*id),
                LedgerEvent::Released(_) => None,
            })
            .collect::<Vec<_>>();
        let mut released = ledger
            .events()
            .iter()
            .filter(|event| persistent(event))
            .filter_map(|event| match event {
                LedgerEvent::Released(id) => Some(*id),
                LedgerEvent::Created(_) => None,
            })
            .collect::<Vec<_>>();
        released.reverse();
        assert_eq!(created, released);
    }

    #[test]
    fn out_of_order_release_is_reported() {
        let ledger = ResourceLedger::new();
        ledger.created(Instance, 1);
        ledger.created(Device, 2);
        ledger.released(Instance, 1);
        assert_eq!(
            ledger.audit(),
            Err(LedgerViolation::OutOfOrder {
                released: ResourceId {
                    kind: Instance,
                    raw: 1
                },
                expected: ResourceId {
                    kind: Device,
                    raw: 2
                },
            })
        );
    }

    #[test]
    fn release_without_create_is_reported() {
        let ledger = ResourceLedger::new();
        ledger.created(Instance, 1);
        ledger.released(CommandPool, 9);
        assert_eq!(
            ledger.audit(),
            Err(LedgerViolation::UnknownRelease(ResourceId {
                kind: CommandPool,
                raw: 9
            }))
        );
    }

    #[test]
    fn double_release_is_reported() {
        let ledger = ResourceLedger::new();
        ledger.created(ShaderModule, 4);
        ledger.released(ShaderModule, 4);
        ledger.released(ShaderModule, 4);
        assert_eq!(
            ledger.audit(),
            Err(LedgerViolation::UnknownRelease(ResourceId {
                kind: ShaderModule,
                raw: 4
            }))
        );
    }

    #[test]
    fn leaked_objects_are_reported() {
        let ledger = ResourceLedger::new();
        ledger.created(Instance, 1);
        ledger.created(Surface, 2);
        ledger.released(Surface, 2);
        assert_eq!(
            ledger.audit(),
            Err(LedgerViolation::Leaked(ResourceId {
                kind: Instance,
                raw: 1
            }))
        );
        assert_eq!(ledger.live_count(), 1);
    }

    #[test]
    fn leaked_transient_objects_are_reported() {
        let ledger = ResourceLedger::new();
        ledger.created(ShaderModule, 7);
        assert_eq!(
            ledger.audit(),
            Err(LedgerViolation::Leaked(ResourceId {
                kind: ShaderModule,
                raw: 7
            }))
        );
    }

    #[test]
    fn partial_initialization_unwinds_cleanly() {
        let ledger = ResourceLedger::new();
        ledger.created(Window, 1);
        ledger.created(Instance, 2);
        ledger.created(Surface, 3);
        // device selection fails here
        ledger.released(Surface, 3);
        ledger.released(Instance, 2);
        ledger.released(Window, 1);
        assert_eq!(ledger.audit(), Ok(()));
    }
}

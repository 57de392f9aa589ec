#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
extern crate log;

pub use otg_if::*;

pub mod err;
pub mod reg;

mod arbiter;
mod dispatch;
mod idle;
mod osal;
mod otg;
mod policy;
mod power;
mod sync;

pub use arbiter::{Arbiter, PowerSequence};
pub use dispatch::{EventQueue, EventWorker, Task, TaskHandler, WorkerRun};
pub use idle::IdleTimer;
pub use osal::Kernel;
pub use otg::{Controller, OtgConfig, OtgParam, OtgState, PortStatus};
pub use policy::{Arbitrated, PowerPolicy, RuntimePm};
pub use power::{PowerEdge, PowerRefCount};

#[cfg(test)]
mod mock;

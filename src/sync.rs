use alloc::sync::Arc;

use spin::{Mutex, MutexGuard};

use crate::osal::Kernel;

/// Spin lock that also masks the controller interrupt while held.
///
/// Usable from the worker and from the idle timer callback. Never sleep
/// while holding it.
pub(crate) struct IrqLock<T> {
    inner: Mutex<T>,
    kernel: Arc<dyn Kernel>,
}

impl<T> IrqLock<T> {
    pub fn new(data: T, kernel: Arc<dyn Kernel>) -> Self {
        Self {
            inner: Mutex::new(data),
            kernel,
        }
    }

    pub fn lock(&self) -> IrqLockGuard<'_, T> {
        let flags = self.kernel.irq_save();
        let guard = self.inner.lock();
        IrqLockGuard {
            guard,
            _irq: IrqRestore {
                kernel: &*self.kernel,
                flags,
            },
        }
    }
}

struct IrqRestore<'a> {
    kernel: &'a dyn Kernel,
    flags: usize,
}

impl Drop for IrqRestore<'_> {
    fn drop(&mut self) {
        self.kernel.irq_restore(self.flags);
    }
}

// Field order matters: the spin lock is released before interrupts come back.
pub(crate) struct IrqLockGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    _irq: IrqRestore<'a>,
}

impl<T> core::ops::Deref for IrqLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> core::ops::DerefMut for IrqLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

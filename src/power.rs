use crate::err::{OtgError, Result};

/// What the caller of a counter operation has to do to the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEdge {
    /// First vote taken: run the physical resume sequence.
    Wake,
    /// Last vote dropped: run the physical suspend sequence.
    Sleep,
    /// Counter moved, hardware stays as it is.
    Hold,
}

/// Keep-awake vote counter.
///
/// `count == 0` means the hardware has been physically suspended, every
/// outstanding vote keeps it awake. Reserved votes are pre-armed during attach
/// and folded into the first release.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PowerRefCount {
    count: i32,
    reserved: i32,
}

impl PowerRefCount {
    pub const fn new() -> Self {
        Self {
            count: 0,
            reserved: 0,
        }
    }

    pub fn count(&self) -> i32 {
        self.count
    }

    pub fn reserved(&self) -> i32 {
        self.reserved
    }

    pub fn is_awake(&self) -> bool {
        self.count > 0
    }

    pub fn acquire(&mut self) -> PowerEdge {
        self.count += 1;
        if self.count == 1 {
            PowerEdge::Wake
        } else {
            PowerEdge::Hold
        }
    }

    /// Pre-arm one vote to be dropped together with the first real release.
    pub fn reserve(&mut self) {
        self.reserved += 1;
    }

    /// Take every reserved vote, returning how many were pending.
    pub fn consume_reserved_on_first_release(&mut self) -> i32 {
        core::mem::take(&mut self.reserved)
    }

    /// Drop one vote plus any reserved ones.
    ///
    /// A release the counter cannot cover leaves it untouched and reports
    /// [`OtgError::RefCountImbalance`].
    pub fn release(&mut self) -> Result<PowerEdge> {
        let votes = 1 + self.reserved;
        if self.count < votes {
            error!(
                "power vote imbalance: release of {votes} with only {} held",
                self.count
            );
            return Err(OtgError::RefCountImbalance);
        }

        let folded = self.consume_reserved_on_first_release();
        if folded > 0 {
            debug!("folding {folded} reserved power vote(s)");
        }
        self.count -= votes;

        Ok(if self.count == 0 {
            PowerEdge::Sleep
        } else {
            PowerEdge::Hold
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_pairs_return_to_zero() {
        let mut rc = PowerRefCount::new();
        assert_eq!(rc.acquire(), PowerEdge::Wake);
        assert_eq!(rc.acquire(), PowerEdge::Hold);
        assert_eq!(rc.release(), Ok(PowerEdge::Hold));
        assert_eq!(rc.release(), Ok(PowerEdge::Sleep));
        assert_eq!(rc.count(), 0);
    }

    #[test]
    fn test_release_at_zero_clamps() {
        let mut rc = PowerRefCount::new();
        assert_eq!(rc.release(), Err(OtgError::RefCountImbalance));
        assert_eq!(rc.count(), 0);
        assert_eq!(rc.release(), Err(OtgError::RefCountImbalance));
        assert_eq!(rc.count(), 0);
    }

    #[test]
    fn test_reserve_folds_into_first_release() {
        let mut rc = PowerRefCount::new();
        // attach vote, pre-armed to go away with the first release
        rc.acquire();
        rc.reserve();

        assert_eq!(rc.acquire(), PowerEdge::Hold);
        assert_eq!(rc.release(), Ok(PowerEdge::Sleep));
        assert_eq!(rc.reserved(), 0);
        assert_eq!(rc.count(), 0);

        assert_eq!(rc.acquire(), PowerEdge::Wake);
        assert_eq!(rc.release(), Ok(PowerEdge::Sleep));
    }

    #[test]
    fn test_release_short_of_reserved_keeps_state() {
        let mut rc = PowerRefCount::new();
        rc.acquire();
        rc.reserve();
        assert_eq!(rc.release(), Err(OtgError::RefCountImbalance));
        assert_eq!(rc.count(), 1);
        assert_eq!(rc.reserved(), 1);
    }

    #[test]
    fn test_random_balanced_sequences() {
        // xorshift, deterministic across runs
        let mut seed = 0x2545_f491_u32;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed
        };

        for _ in 0..200 {
            let mut rc = PowerRefCount::new();
            let mut held = 0;
            let mut wakes = 0;
            let mut sleeps = 0;

            for _ in 0..64 {
                if held == 0 || next() % 2 == 0 {
                    if rc.acquire() == PowerEdge::Wake {
                        wakes += 1;
                    }
                    held += 1;
                } else {
                    if rc.release().unwrap() == PowerEdge::Sleep {
                        sleeps += 1;
                    }
                    held -= 1;
                }
                assert_eq!(rc.count(), held);
            }
            while held > 0 {
                if rc.release().unwrap() == PowerEdge::Sleep {
                    sleeps += 1;
                }
                held -= 1;
            }

            assert_eq!(rc.count(), 0);
            assert_eq!(wakes, sleeps);
        }
    }
}

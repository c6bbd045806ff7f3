use parking_lot::{Condvar, Mutex};

/// Counting gate that admits at most `capacity` holders at once.
///
/// [`AdmissionGate::acquire`] blocks until a slot is free; the slot is
/// returned when the [`Permit`] drops.
#[derive(Debug)]
pub struct AdmissionGate {
    capacity: usize,
    available: Mutex<usize>,
    freed: Condvar,
}

impl AdmissionGate {
    /// A capacity of zero is raised to one so that acquire cannot block
    /// forever.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { capacity, available: Mutex::new(capacity), freed: Condvar::new() }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn acquire(&self) -> Permit<'_> {
        let mut available = self.available.lock();
        while *available == 0 {
            self.freed.wait(&mut available);
        }
        *available -= 1;
        Permit { gate: self }
    }

    fn release(&self) {
        let mut available = self.available.lock();
        *available += 1;
        debug_assert!(*available <= self.capacity);
        drop(available);
        self.freed.notify_one();
    }
}

/// A held slot of an [`AdmissionGate`].
#[derive(Debug)]
pub struct Permit<'a> {
    gate: &'a AdmissionGate,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

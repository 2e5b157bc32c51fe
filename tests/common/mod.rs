//! Common test utilities for rpmb-storage integration tests
//!
//! Collaborators here hand out shared handles so a test can inspect the store
//! after it has been bound into an `RpmbStorage`.

#![allow(dead_code)]

use rpmb_storage::{
    Backend, DeviceError, MemoryRpmbDevice, MemorySimulatedRpmb, RpmbDevice, RpmbKey,
    RpmbStorage, SimulatedRpmb,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Device serial used for key derivation in tests
pub const TEST_SERIAL: &[u8] = b"R58M42ABCDE";

/// Route library logs to the test harness; filter with `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Call counts seen by [`CountingSimulator`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Calls {
    pub get_counter: usize,
    pub program_key: usize,
    pub reads: usize,
    pub writes: usize,
}

/// Simulated store that counts every call it forwards
#[derive(Clone)]
pub struct CountingSimulator {
    inner: Rc<RefCell<MemorySimulatedRpmb>>,
    calls: Rc<RefCell<Calls>>,
}

impl CountingSimulator {
    pub fn new(inner: MemorySimulatedRpmb) -> Self {
        Self {
            inner: Rc::new(RefCell::new(inner)),
            calls: Rc::new(RefCell::new(Calls::default())),
        }
    }

    pub fn calls(&self) -> Calls {
        *self.calls.borrow()
    }

    pub fn with_image<T>(&self, f: impl FnOnce(&mut [u8]) -> T) -> Option<T> {
        self.inner.borrow_mut().image_mut().map(f)
    }
}

impl SimulatedRpmb for CountingSimulator {
    fn get_counter(&mut self, key: &RpmbKey) -> Result<u32, DeviceError> {
        self.calls.borrow_mut().get_counter += 1;
        self.inner.borrow_mut().get_counter(key)
    }

    fn program_key(&mut self, key: &RpmbKey) -> Result<(), DeviceError> {
        self.calls.borrow_mut().program_key += 1;
        self.inner.borrow_mut().program_key(key)
    }

    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), DeviceError> {
        self.calls.borrow_mut().reads += 1;
        self.inner.borrow_mut().read(offset, buf)
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        self.calls.borrow_mut().writes += 1;
        self.inner.borrow_mut().write(offset, data)
    }
}

/// Emulated hardware part shared between the test and the storage facade
#[derive(Clone, Default)]
pub struct SharedDevice(pub Rc<RefCell<MemoryRpmbDevice>>);

impl SharedDevice {
    pub fn block_writes(&self) -> usize {
        self.0.borrow().block_writes()
    }

    pub fn write_counter(&self) -> u32 {
        self.0.borrow().write_counter()
    }
}

impl RpmbDevice for SharedDevice {
    fn get_write_counter(&mut self, key: &RpmbKey) -> Result<u32, DeviceError> {
        self.0.borrow_mut().get_write_counter(key)
    }

    fn program_key(&mut self, key: &RpmbKey) -> Result<(), DeviceError> {
        self.0.borrow_mut().program_key(key)
    }

    fn read_blocks(
        &mut self,
        count: u16,
        address: u16,
        buf: &mut [u8],
        key: &RpmbKey,
    ) -> Result<(), DeviceError> {
        self.0.borrow_mut().read_blocks(count, address, buf, key)
    }

    fn write_blocks(
        &mut self,
        count: u16,
        address: u16,
        data: &[u8],
        key: &RpmbKey,
    ) -> Result<(), DeviceError> {
        self.0.borrow_mut().write_blocks(count, address, data, key)
    }
}

/// Simulated storage plus a handle on its call counts
pub fn counting_storage() -> (RpmbStorage, CountingSimulator) {
    let sim = CountingSimulator::new(MemorySimulatedRpmb::default());
    let storage = RpmbStorage::new(Backend::Simulated(Box::new(sim.clone())));
    (storage, sim)
}

/// Real-backend storage on an emulated part, plus a handle on the part
pub fn emulated_storage() -> (RpmbStorage, SharedDevice) {
    let device = SharedDevice::default();
    let storage = RpmbStorage::new(Backend::Real(Box::new(device.clone())));
    (storage, device)
}

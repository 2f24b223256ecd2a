//! Instrumented page capabilities.
//!
//! Canvas export and clipboard write are the two entry points a student can
//! use to lift quiz content. On desktop profiles the
//! [`CapabilityTamperDetector`] replaces each with an
//! [`InstrumentedCapability`] that queues a `screenshot` signal and then
//! delegates to the original. Install and restore are paired: teardown puts
//! back the exact original `Arc`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vigil_types::{Clock, Platform, SignalKind, ViolationSignal};

use crate::detector::{Detector, DetectorEnv, DetectorKind};
use crate::error::{DetectError, DetectResult};

/// Patchable capability entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    /// `HTMLCanvasElement.toDataURL` / `toBlob`.
    CanvasExport,
    /// `navigator.clipboard.writeText` / `write`.
    ClipboardWrite,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 2] = [CapabilityKind::CanvasExport, CapabilityKind::ClipboardWrite];

    fn signal_kind(&self) -> SignalKind {
        match self {
            CapabilityKind::CanvasExport => SignalKind::CanvasExport,
            CapabilityKind::ClipboardWrite => SignalKind::ClipboardWrite,
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityKind::CanvasExport => write!(f, "canvas_export"),
            CapabilityKind::ClipboardWrite => write!(f, "clipboard_write"),
        }
    }
}

/// A callable page capability.
pub trait Capability: Send + Sync {
    fn invoke(&self, input: &str) -> DetectResult<String>;
}

/// The page's capability slots. All callers go through [`CapabilityTable::invoke`],
/// so whatever is installed is the sole call path.
#[derive(Default)]
pub struct CapabilityTable {
    slots: DashMap<CapabilityKind, Arc<dyn Capability>>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style install for setup code.
    pub fn with(self, kind: CapabilityKind, capability: Arc<dyn Capability>) -> Self {
        self.slots.insert(kind, capability);
        self
    }

    /// Install an implementation, returning the one it replaced.
    pub fn install(
        &self,
        kind: CapabilityKind,
        capability: Arc<dyn Capability>,
    ) -> Option<Arc<dyn Capability>> {
        self.slots.insert(kind, capability)
    }

    /// Currently installed implementation.
    pub fn get(&self, kind: CapabilityKind) -> Option<Arc<dyn Capability>> {
        self.slots.get(&kind).map(|slot| Arc::clone(slot.value()))
    }

    /// Whether the installed implementation is exactly `capability`.
    pub fn is_installed(&self, kind: CapabilityKind, capability: &Arc<dyn Capability>) -> bool {
        self.get(kind)
            .map(|current| Arc::ptr_eq(&current, capability))
            .unwrap_or(false)
    }

    /// Call a capability through whatever is installed.
    pub fn invoke(&self, kind: CapabilityKind, input: &str) -> DetectResult<String> {
        let capability = self
            .get(kind)
            .ok_or(DetectError::CapabilityUnavailable(kind))?;
        capability.invoke(input)
    }
}

impl fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<CapabilityKind> = self.slots.iter().map(|e| *e.key()).collect();
        f.debug_struct("CapabilityTable").field("installed", &kinds).finish()
    }
}

/// Queue for signals raised outside the event path.
#[derive(Debug, Clone, Default)]
pub struct SignalQueue {
    inner: Arc<Mutex<VecDeque<ViolationSignal>>>,
}

impl SignalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, signal: ViolationSignal) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(signal);
    }

    /// Take every queued signal in emission order.
    pub fn drain(&self) -> Vec<ViolationSignal> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decorator reporting every invocation before delegating.
pub struct InstrumentedCapability {
    kind: CapabilityKind,
    original: Arc<dyn Capability>,
    queue: SignalQueue,
    clock: Arc<dyn Clock>,
    platform: Platform,
}

impl InstrumentedCapability {
    pub fn new(
        kind: CapabilityKind,
        original: Arc<dyn Capability>,
        queue: SignalQueue,
        clock: Arc<dyn Clock>,
        platform: Platform,
    ) -> Self {
        Self {
            kind,
            original,
            queue,
            clock,
            platform,
        }
    }
}

impl Capability for InstrumentedCapability {
    fn invoke(&self, input: &str) -> DetectResult<String> {
        let signal = ViolationSignal::new(self.kind.signal_kind(), self.clock.now(), self.platform)
            .with_detail(format!("{} bytes", input.len()));
        self.queue.push(signal);
        debug!(capability = %self.kind, "Instrumented capability invoked");
        self.original.invoke(input)
    }
}

/// Desktop-only detector instrumenting canvas export and clipboard write.
pub struct CapabilityTamperDetector {
    platform: Platform,
    queue: SignalQueue,
    originals: Vec<(CapabilityKind, Arc<dyn Capability>)>,
}

impl CapabilityTamperDetector {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            queue: SignalQueue::new(),
            originals: Vec::new(),
        }
    }

    /// Capabilities currently wrapped.
    pub fn instrumented(&self) -> Vec<CapabilityKind> {
        self.originals.iter().map(|(kind, _)| *kind).collect()
    }
}

impl fmt::Debug for CapabilityTamperDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityTamperDetector")
            .field("platform", &self.platform)
            .field("instrumented", &self.instrumented())
            .field("queued", &self.queue.len())
            .finish()
    }
}

impl Detector for CapabilityTamperDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::CapabilityTamper
    }

    fn mount(&mut self, env: &DetectorEnv, _now: DateTime<Utc>) -> Vec<ViolationSignal> {
        if !self.originals.is_empty() {
            return Vec::new();
        }
        for kind in CapabilityKind::ALL {
            let Some(original) = env.capabilities.get(kind) else {
                continue;
            };
            let wrapper = InstrumentedCapability::new(
                kind,
                Arc::clone(&original),
                self.queue.clone(),
                Arc::clone(&env.clock),
                self.platform,
            );
            env.capabilities.install(kind, Arc::new(wrapper));
            self.originals.push((kind, original));
        }
        info!(instrumented = ?self.instrumented(), "Capability instrumentation installed");
        Vec::new()
    }

    fn poll(&mut self, _now: DateTime<Utc>) -> Vec<ViolationSignal> {
        self.queue.drain()
    }

    fn teardown(&mut self, env: &DetectorEnv) {
        for (kind, original) in self.originals.drain(..) {
            env.capabilities.install(kind, original);
        }
        self.queue.drain();
        debug!("Capability instrumentation restored");
    }
}

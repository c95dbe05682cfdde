//! Egress instances - the ordered list of output backends.
//!
//! Each egress owns a contiguous pixel range of the global frame; its
//! offset is the prefix sum of the counts of all egresses before it, so
//! `sum(count) == frame.len()` holds after every command. Removal shifts
//! every subsequent offset down and cascades index adjustments through
//! the whole engine via the `ledsRemoved` hook.

use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::color::Led;
use crate::stream::StreamSegment;

new_key_type! {
    /// Handle for egress instances.
    pub struct EgressKey;
}

pub type StreamSchema = SmallVec<[StreamSegment; 4]>;

/// Everything an egress backend needs to encode and transmit one frame.
pub struct EgressFlush<'a> {
    /// The full `egress` buffer; this instance's pixels start at `offset`.
    pub leds: &'a [Led],
    pub offset: u32,
    pub count: u32,
    /// The active stream schema, empty when none was defined.
    pub streams: &'a [StreamSegment],
}

/// One output backend implementation. `Send` so the owning engine value
/// can move between threads.
pub trait EgressBehavior: Send {
    fn flush(&mut self, ctx: &EgressFlush<'_>);
}

pub struct EgressInstance {
    pub ident: String,
    pub instance_name: String,
    pub count: u32,
    pub active: bool,
    pub(crate) behavior: Box<dyn EgressBehavior>,
    /// Schema visible to the backend.
    pub streams: StreamSchema,
    /// Schema staged by `streams_define`, promoted at module flush.
    pub streams_staged: Option<StreamSchema>,
}

/// Ordered list of egress instances.
#[derive(Default)]
pub struct EgressList {
    pub(crate) map: SlotMap<EgressKey, EgressInstance>,
    pub(crate) order: Vec<EgressKey>,
    names: FxHashMap<String, EgressKey>,
}

impl EgressList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn find(&self, instance_name: &str) -> Option<EgressKey> {
        self.names.get(instance_name).copied()
    }

    #[must_use]
    pub fn get(&self, key: EgressKey) -> Option<&EgressInstance> {
        self.map.get(key)
    }

    #[must_use]
    pub fn get_mut(&mut self, key: EgressKey) -> Option<&mut EgressInstance> {
        self.map.get_mut(key)
    }

    /// Pixel offset of an instance: prefix sum of prior counts.
    #[must_use]
    pub fn offset_of(&self, key: EgressKey) -> u32 {
        let mut offset = 0;
        for &k in &self.order {
            if k == key {
                break;
            }
            if let Some(inst) = self.map.get(k) {
                offset += inst.count;
            }
        }
        offset
    }

    /// Total pixel count across all instances.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.order
            .iter()
            .filter_map(|&k| self.map.get(k))
            .map(|inst| inst.count)
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EgressKey, &EgressInstance)> {
        self.order.iter().filter_map(|&k| self.map.get(k).map(|inst| (k, inst)))
    }

    /// Appends an instance; the caller is responsible for growing the
    /// frame and firing `ledsAdded`.
    pub fn push(
        &mut self,
        ident: impl Into<String>,
        instance_name: impl Into<String>,
        count: u32,
        behavior: Box<dyn EgressBehavior>,
    ) -> EgressKey {
        let instance_name = instance_name.into();
        let key = self.map.insert(EgressInstance {
            ident: ident.into(),
            instance_name: instance_name.clone(),
            count,
            active: true,
            behavior,
            streams: SmallVec::new(),
            streams_staged: None,
        });
        self.order.push(key);
        self.names.insert(instance_name, key);
        key
    }

    /// Removes an instance, returning its `(offset, count)`; the caller
    /// cascades the `ledsRemoved` adjustments.
    pub fn remove(&mut self, key: EgressKey) -> Option<(u32, u32)> {
        let offset = self.offset_of(key);
        let inst = self.map.remove(key)?;
        self.order.retain(|&k| k != key);
        self.names.remove(&inst.instance_name);
        Some((offset, inst.count))
    }

    pub fn set_active(&mut self, key: EgressKey, active: bool) {
        if let Some(inst) = self.map.get_mut(key) {
            inst.active = active;
        }
    }

    /// Promotes staged stream schemas.
    pub fn promote_streams(&mut self) {
        for inst in self.map.values_mut() {
            if let Some(schema) = inst.streams_staged.take() {
                inst.streams = schema;
            }
        }
    }

    /// Instance names in list order.
    #[must_use]
    pub fn instance_names(&self) -> Vec<String> {
        self.iter().map(|(_, inst)| inst.instance_name.clone()).collect()
    }
}

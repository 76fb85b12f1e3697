//! The converter contract (tag ↔ native type) and the two-phase
//! deserialization protocol cyclic object graphs need.
//!
//! A "generator" in the original coroutine-based design becomes an explicit
//! state machine here: a [`PendingConversion`] produces a shell value
//! immediately (so other converters can capture a reference to it before it
//! is fully built), then is polled again once the rest of the tree has had
//! a chance to resolve.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use asdf_tree::NodeRef;

use crate::block_access::{BlockAllocator, BlockReader};
use crate::error::ExtResult;

/// An application's native value, held opaquely by the extension registry
/// and engine — this crate only moves it around and preserves identity; it
/// never inspects the contents.
pub struct NativeValue(Box<dyn Any + Send + Sync>, &'static str);

impl NativeValue {
    /// Wrap a concrete native value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Box::new(value), std::any::type_name::<T>())
    }

    /// The concrete type's fully-qualified name, as recorded at
    /// construction — used by [`crate::registry::ExtensionRegistry::select_converter_for_type`]
    /// on the write path, where no generic parameter is otherwise in scope.
    pub fn type_name(&self) -> &'static str {
        self.1
    }

    /// Borrow the underlying value as `T`, if it is one.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Consume and recover the underlying value as `T`, if it is one.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let type_name = self.1;
        match self.0.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(boxed) => Err(Self(boxed, type_name)),
        }
    }

    /// An opaque identity for this value's allocation, stable for as long
    /// as the value is not moved out of its box. Used to detect when two
    /// references in the native graph point at the same object.
    pub fn identity(&self) -> usize {
        (self.0.as_ref() as *const dyn Any).cast::<()>() as usize
    }
}

/// One step of a deferred conversion: either it finished immediately, or it
/// needs to be resumed later (the generator-replacement state machine).
pub enum ConversionOutcome<T> {
    /// The conversion completed in one step.
    Done(T),
    /// The conversion produced a shell value and must be resumed once the
    /// rest of the traversal has made progress.
    Pending(Box<dyn PendingConversion<T>>),
}

/// A suspended conversion. `shell` is called once, immediately, to obtain a
/// placeholder that other in-progress conversions may reference (breaking
/// the cycle); `finish` is polled by the engine's drain loop until it
/// returns `Some`.
pub trait PendingConversion<T> {
    /// Produce the not-yet-complete placeholder value.
    fn shell(&mut self) -> T;

    /// Attempt to complete the conversion now that other pending work may
    /// have resolved. Returns `Ok(None)` if still blocked.
    fn finish(&mut self, ctx: &mut ConversionContext) -> ExtResult<Option<T>>;
}

/// Shared mutable state threaded through one open/write traversal: the
/// identity map that lets aliased nodes resolve to the same native object
/// (and vice versa), plus the queues of conversions still in flight.
#[derive(Default)]
pub struct ConversionContext {
    from_yaml_identity: HashMap<usize, NativeValue>,
    to_yaml_identity: HashMap<usize, NodeRef>,
    read_pending: Vec<Box<dyn PendingConversion<NativeValue>>>,
    write_pending: Vec<Box<dyn PendingConversion<NodeRef>>>,
    block_reader: Option<Rc<RefCell<dyn BlockReader>>>,
    block_allocator: Option<Rc<RefCell<dyn BlockAllocator>>>,
}

impl ConversionContext {
    /// A fresh, empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `node` converted (or is converting, via its shell) to
    /// `value`, so a later alias to the same node reuses it.
    pub fn remember_native(&mut self, node: &NodeRef, value: NativeValue) {
        self.from_yaml_identity.insert(Rc::as_ptr(node) as usize, value);
    }

    /// Recall the native value previously registered for `node`, if any.
    pub fn recall_native(&self, node: &NodeRef) -> Option<&NativeValue> {
        self.from_yaml_identity.get(&(Rc::as_ptr(node) as usize))
    }

    /// Record that the native value identified by `identity` converted (or
    /// is converting) to `node`.
    pub fn remember_node(&mut self, identity: usize, node: NodeRef) {
        self.to_yaml_identity.insert(identity, node);
    }

    /// Recall the tagged node previously registered for a native value's
    /// identity, if any.
    pub fn recall_node(&self, identity: usize) -> Option<&NodeRef> {
        self.to_yaml_identity.get(&identity)
    }

    /// Queue a deferred read-direction (tagged tree → native) conversion.
    pub fn defer_read(&mut self, pending: Box<dyn PendingConversion<NativeValue>>) {
        self.read_pending.push(pending);
    }

    /// Queue a deferred write-direction (native → tagged tree) conversion.
    pub fn defer_write(&mut self, pending: Box<dyn PendingConversion<NodeRef>>) {
        self.write_pending.push(pending);
    }

    /// Drain every queued read-direction conversion that can currently
    /// finish, in insertion order, possibly looping as newly finished
    /// values unblock others. Returns the values that finished; anything
    /// still blocked remains queued (inspect [`Self::has_pending_reads`]).
    pub fn drain_reads(&mut self) -> ExtResult<Vec<NativeValue>> {
        let mut finished = Vec::new();
        loop {
            let queue = std::mem::take(&mut self.read_pending);
            let mut progressed = false;
            let mut still_pending = Vec::with_capacity(queue.len());
            for mut pending in queue {
                match pending.finish(self)? {
                    Some(value) => {
                        finished.push(value);
                        progressed = true;
                    }
                    None => still_pending.push(pending),
                }
            }
            self.read_pending = still_pending;
            if !progressed || self.read_pending.is_empty() {
                break;
            }
        }
        Ok(finished)
    }

    /// Write-direction counterpart to [`Self::drain_reads`].
    pub fn drain_writes(&mut self) -> ExtResult<Vec<NodeRef>> {
        let mut finished = Vec::new();
        loop {
            let queue = std::mem::take(&mut self.write_pending);
            let mut progressed = false;
            let mut still_pending = Vec::with_capacity(queue.len());
            for mut pending in queue {
                match pending.finish(self)? {
                    Some(value) => {
                        finished.push(value);
                        progressed = true;
                    }
                    None => still_pending.push(pending),
                }
            }
            self.write_pending = still_pending;
            if !progressed || self.write_pending.is_empty() {
                break;
            }
        }
        Ok(finished)
    }

    /// True if any read-direction conversion is still stuck after draining
    /// — the engine should report `UnresolvedReferenceCycle`.
    pub fn has_pending_reads(&self) -> bool {
        !self.read_pending.is_empty()
    }

    /// Write-direction counterpart to [`Self::has_pending_reads`].
    pub fn has_pending_writes(&self) -> bool {
        !self.write_pending.is_empty()
    }

    /// Number of read-direction conversions still stuck, for error reporting.
    pub fn pending_read_count(&self) -> usize {
        self.read_pending.len()
    }

    /// Number of write-direction conversions still stuck, for error reporting.
    pub fn pending_write_count(&self) -> usize {
        self.write_pending.len()
    }

    /// Wire in read-direction block access for this traversal. The document
    /// engine calls this before running `to_native` on a document that may
    /// contain block-backed converters (e.g. `core/ndarray`).
    pub fn set_block_reader(&mut self, reader: Rc<RefCell<dyn BlockReader>>) {
        self.block_reader = Some(reader);
    }

    /// The read-direction block access wired in for this traversal, if any.
    pub fn block_reader(&self) -> Option<&Rc<RefCell<dyn BlockReader>>> {
        self.block_reader.as_ref()
    }

    /// Write-direction counterpart to [`Self::set_block_reader`].
    pub fn set_block_allocator(&mut self, allocator: Rc<RefCell<dyn BlockAllocator>>) {
        self.block_allocator = Some(allocator);
    }

    /// The write-direction block access wired in for this traversal, if any.
    pub fn block_allocator(&self) -> Option<&Rc<RefCell<dyn BlockAllocator>>> {
        self.block_allocator.as_ref()
    }
}

/// Translates between tagged tree nodes and one family of native types.
/// Installed into an [`crate::registry::ExtensionRegistry`] as part of an
/// [`crate::extension::Extension`].
pub trait Converter: Send + Sync {
    /// Tag URI glob patterns (`*`/`**`) this converter claims.
    fn tags(&self) -> &[String];

    /// Fully-qualified native type names this converter produces on read
    /// and accepts on write.
    fn types(&self) -> &[&'static str];

    /// Choose a tag for `value` from `candidates`, or `None` to defer to
    /// the next converter whose `types` also match.
    fn select_tag(&self, value: &NativeValue, candidates: &[String], ctx: &ConversionContext) -> Option<String>;

    /// Build the tagged node for `value` under `tag`.
    fn to_yaml_tree(&self, value: &NativeValue, tag: &str, ctx: &mut ConversionContext) -> ExtResult<ConversionOutcome<NodeRef>>;

    /// Build the native value for `node` tagged `tag`.
    fn from_yaml_tree(&self, node: &NodeRef, tag: &str, ctx: &mut ConversionContext) -> ExtResult<ConversionOutcome<NativeValue>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_value_roundtrips_through_downcast() {
        let value = NativeValue::new(42u32);
        assert_eq!(value.downcast_ref::<u32>(), Some(&42));
        let recovered = value.downcast::<u32>().unwrap();
        assert_eq!(recovered, 42);
    }

    #[test]
    fn downcast_failure_returns_original() {
        let value = NativeValue::new(42u32);
        let err = value.downcast::<String>().unwrap_err();
        assert_eq!(err.downcast_ref::<u32>(), Some(&42));
    }

    struct TwoStep {
        step: u32,
    }

    impl PendingConversion<NativeValue> for TwoStep {
        fn shell(&mut self) -> NativeValue {
            NativeValue::new(0u32)
        }

        fn finish(&mut self, _ctx: &mut ConversionContext) -> ExtResult<Option<NativeValue>> {
            self.step += 1;
            if self.step < 2 {
                Ok(None)
            } else {
                Ok(Some(NativeValue::new(99u32)))
            }
        }
    }

    #[test]
    fn drain_reads_resolves_once_unblocked() {
        let mut ctx = ConversionContext::new();
        ctx.defer_read(Box::new(TwoStep { step: 0 }));
        let first = ctx.drain_reads().unwrap();
        assert!(first.is_empty());
        assert!(ctx.has_pending_reads());
        let second = ctx.drain_reads().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].downcast_ref::<u32>(), Some(&99));
        assert!(!ctx.has_pending_reads());
    }
}

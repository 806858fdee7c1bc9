//! Collection episodes.
//!
//! - [`MinorCollector`]: promotes the live nursery into the semispace
//! - [`MajorCollector`]: scavenges the semispace, after emptying the nursery

pub mod major;
pub mod minor;

pub use major::{MajorCollector, MajorResult};
pub use minor::{verify_no_nursery_refs, MinorCollector, MinorResult};

use crate::error::{GcError, GcResult};
use crate::heap::GcHeap;
use crate::object::{Address, Object};
use crate::roots::RootProvider;

/// Allocate `object`, running a minor collection and retrying once if the
/// nursery is exhausted.
///
/// Roots are rewritten by the collection, so handles not reachable from
/// `roots` are invalid afterwards.
pub fn alloc_or_collect(
    heap: &mut GcHeap,
    roots: &mut dyn RootProvider,
    object: impl Into<Object>,
) -> GcResult<Address> {
    let object = object.into();
    match heap.alloc(object) {
        Err(GcError::OutOfMemory { .. }) => {
            log::debug!("nursery exhausted, collecting before retry");
            MinorCollector::new().collect(heap, roots)?;
            heap.alloc(object)
        }
        other => other,
    }
}

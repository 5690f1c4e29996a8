//! # Trace output

use crate::platform::Handoff;
use log::info;

pub fn trace_handoff(handoff: &Handoff) {
    info!(
        target: "handoff",
        "entry = {}, r1 (machine) = {:#x}, r2 (tags) = {} ({} bytes)",
        handoff.entry,
        handoff.machine_type,
        handoff.tags,
        handoff.tags_len
    );
    info!(target: "handoff", "  kernel  = {:?}", handoff.kernel);
    info!(target: "handoff", "  ramdisk = {:?}", handoff.ramdisk);
    if !handoff.second.is_empty() {
        info!(target: "handoff", "  second  = {:?}", handoff.second);
    }
}

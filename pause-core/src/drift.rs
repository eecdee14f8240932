//! Drift detection between a paused snapshot and the live resource.

use crate::resource::ManagedResource;

/// Regions compared, in order. Any difference in any of them is drift.
const COMPARED_REGIONS: [&[&str]; 3] = [
    &["spec"],
    &["metadata", "annotations"],
    &["metadata", "labels"],
];

/// Whether `current` changed relative to `snapshot` in a way the external
/// controller has not seen.
///
/// The pause marker and pause state annotation are removed from both sides
/// first, so the engine's own writes never count as drift. A region present
/// on one side and missing on the other is a difference.
pub fn is_updated(snapshot: &ManagedResource, current: &ManagedResource) -> bool {
    let old = snapshot.without_markers();
    let new = current.without_markers();

    COMPARED_REGIONS.iter().any(|path| {
        let before = old.region(path);
        let after = new.region(path);
        if before == after {
            return false;
        }
        tracing::debug!(
            field = %path.join("."),
            before = %render(before),
            after = %render(after),
            "Field changed since pause"
        );
        true
    })
}

fn render(value: Option<&serde_json::Value>) -> String {
    value.map_or_else(|| "<absent>".to_string(), ToString::to_string)
}

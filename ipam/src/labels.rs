use std::collections::BTreeMap;

use crate::CONTROLLER_NAME;

/// Labels that indicate the resource is managed by the allocator.
pub fn managed_labels() -> Option<BTreeMap<String, String>> {
    Some(BTreeMap::from_iter(vec![(
        "managed-by".to_owned(),
        CONTROLLER_NAME.to_owned(),
    )]))
}

//! Name derivation for snapshots, restored targets and aliases

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

use crate::error::{ActionError, ActionResult};

/// Restored index name for `source`; the only way a target name is ever produced
pub fn target_name(source: &str, suffix: &str) -> String {
    format!("{}{}", source, suffix)
}

/// Snapshot name used for one index in per-index mode
pub fn snapshot_name_for_index(base: &str, index: &str) -> String {
    if base.ends_with('-') || base.ends_with('_') {
        format!("{}{}", base, index)
    } else {
        format!("{}_{}", base, index)
    }
}

/// Alias to create for a converted index
pub fn alias_for<'a>(source: &'a str, alias_name: Option<&'a str>) -> &'a str {
    alias_name.unwrap_or(source)
}

/// Expand strftime escapes in a snapshot name pattern
pub fn expand_snapshot_name(pattern: &str, now: DateTime<Utc>) -> ActionResult<String> {
    let items = StrftimeItems::new(pattern);
    if items.clone().any(|item| matches!(item, Item::Error)) {
        return Err(ActionError::Configuration(format!(
            "invalid date pattern in snapshot name {:?}",
            pattern
        )));
    }
    Ok(now.format_with_items(items).to_string())
}

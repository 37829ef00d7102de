//! Reading the declared license out of a definition payload.
//!
//! Definitions are JSON documents; the only path this crate interprets is
//! `licensed.declared`, which carries the SPDX expression ClearlyDefined
//! settled on for the component. Everything else in the payload is opaque
//! here and left to downstream consumers of the cached body.

use serde_json::Value;

use crate::component::Component;

/// Property name under which the declared license lands on the component
pub const LICENSE_PROPERTY: &str = "clearly-defined";

/// Annotate `component` with the declared license found in `body`, if any.
///
/// A payload that cannot be interpreted is logged and otherwise ignored: the
/// body was already worth caching, and a missing annotation is an acceptable
/// degradation for the generated bill of materials.
pub(crate) fn annotate<C: Component>(component: &mut C, body: &str) {
    if let Some(declared) = declared_license(body) {
        component.add_property(LICENSE_PROPERTY, &declared);
    }
}

/// Extract `licensed.declared` when present and a string.
#[must_use]
pub fn declared_license(body: &str) -> Option<String> {
    let json: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(e) => {
            log::warn!("Bad definition payload: {e}");
            return None;
        }
    };

    let Some(licensed) = json.get("licensed") else {
        log::warn!("Definition payload has no `licensed` section");
        return None;
    };
    if !licensed.is_object() {
        log::warn!("Definition payload `licensed` section is not an object: {licensed}");
        return None;
    }

    match licensed.get("declared") {
        Some(Value::String(declared)) => Some(declared.clone()),
        Some(other) => {
            log::warn!("Declared license is not a string: {other}");
            None
        }
        // Definitions without a declared license are common; nothing to log.
        None => None,
    }
}

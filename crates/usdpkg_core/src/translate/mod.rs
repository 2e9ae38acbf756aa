//! Scene translation between USD stages and Unity asset graphs.
//!
//! Unity is Y-up, measured in meters, and left-handed. Every local
//! transform is mirrored across X when it crosses over, and root-level
//! transforms additionally carry the stage's up-axis and unit correction:
//!
//! ```text
//! unity_root  = F * (C * usd_root) * F
//! unity_child = F * usd_child * F
//! ```
//!
//! where `F = diag(-1, 1, 1)` and `C` is [`StageBasis::root_correction`].
//! The prefab `.meta` records the source basis so the inverse path can
//! restore it.

pub mod unity_to_usd;
pub mod usd_to_unity;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use usdpkg_math::{StageBasis, UpAxis};

pub use unity_to_usd::{import_source, UnitySource, UsdImport};
pub use usd_to_unity::{export_stage, UnityExport};

/// Source stage conventions, stored as JSON in the prefab `.meta` `userData`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub stage: String,
    pub up_axis: UpAxis,
    pub meters_per_unit: f64,

    /// The prefab root GameObject wraps several USD root prims
    pub synthetic_root: bool,
}

impl Provenance {
    pub fn basis(&self) -> StageBasis {
        StageBasis::new(self.up_axis, self.meters_per_unit)
    }

    pub fn to_user_data(&self) -> String {
        // A struct of strings, bools and finite floats always serializes
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Read provenance from `userData`; `None` for anything else.
    pub fn from_user_data(user_data: &str) -> Option<Self> {
        match serde_json::from_str::<Provenance>(user_data) {
            Ok(provenance) => Some(provenance),
            Err(e) => {
                log::debug!("userData is not provenance: {}", e);
                None
            }
        }
    }
}

/// Make a name usable as a USD prim identifier and as a file name.
///
/// Characters outside `[A-Za-z0-9_]` become `_`, and a leading digit gets
/// a `_` prefix.
pub fn sanitize_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() {
        out.push('_');
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Hands out names that are unique within one scope by appending `_1`, `_2`, ...
#[derive(Debug, Default)]
pub struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, name: &str) -> String {
        let base = sanitize_name(name);
        if self.taken.insert(base.clone()) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

//! Profiles shipped with the engine.

use crate::config::Profile;
use crate::error::ReconError;

const BUILTIN: &[(&str, &str)] = &[
    ("zomato", include_str!("../profiles/zomato.toml")),
    ("zomato-consolidated", include_str!("../profiles/zomato-consolidated.toml")),
    ("swiggy", include_str!("../profiles/swiggy.toml")),
    ("swiggy-dineout", include_str!("../profiles/swiggy-dineout.toml")),
    ("zomato-pay", include_str!("../profiles/zomato-pay.toml")),
    ("paytm", include_str!("../profiles/paytm.toml")),
];

/// Names of the built-in profiles, in display order.
pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTIN.iter().map(|(name, _)| *name)
}

/// Raw TOML of a built-in profile.
pub fn source(name: &str) -> Option<&'static str> {
    BUILTIN.iter().find(|(n, _)| *n == name).map(|(_, toml)| *toml)
}

pub fn builtin(name: &str) -> Result<Profile, ReconError> {
    let toml = source(name).ok_or_else(|| ReconError::UnknownProfile(name.to_string()))?;
    Profile::from_toml(toml)
}

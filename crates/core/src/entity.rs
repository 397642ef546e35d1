//! Species entities and the endpoint names derived from them.
//!
//! Every species has its own batch endpoint, named `{site}-{normalized}` and,
//! when the deployment carries a uid, suffixed with `-{uid}`. Remote naming
//! rules cap the full name at [`ENDPOINT_NAME_MAX_LEN`] characters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::value_object::ValueObject;

/// Maximum length (in characters) of a remote endpoint name.
pub const ENDPOINT_NAME_MAX_LEN: usize = 32;

/// Maximum length of a deployment uid suffix.
const UID_MAX_LEN: usize = 16;

/// Normalize a species name into an endpoint-safe fragment.
///
/// Trims, lower-cases and replaces every whitespace character with `-`.
/// Deterministic; does not truncate.
pub fn normalize(name: &str) -> String {
    name.trim()
        .chars()
        .flat_map(|c| {
            if c.is_whitespace() {
                vec!['-']
            } else {
                c.to_lowercase().collect()
            }
        })
        .collect()
}

/// A named class (species) for which a dedicated model endpoint exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity {
    name: String,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The name exactly as read from the input.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn normalized(&self) -> String {
        normalize(&self.name)
    }
}

impl core::fmt::Display for Entity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Site prefix shared by all endpoints of one deployment (e.g. `cherrypt`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteName(String);

impl SiteName {
    /// Validate and lower-case a site name.
    ///
    /// Allowed: ASCII letters, digits and `-`; must leave room for at least
    /// one species character in an endpoint name.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let site = raw.trim().to_ascii_lowercase();
        if site.is_empty() {
            return Err(CoreError::validation("site name must not be empty"));
        }
        if !site.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(CoreError::validation(format!(
                "site name {site:?} may only contain letters, digits and '-'"
            )));
        }
        if site.len() > ENDPOINT_NAME_MAX_LEN - 2 {
            return Err(CoreError::validation(format!(
                "site name {site:?} is longer than {} characters",
                ENDPOINT_NAME_MAX_LEN - 2
            )));
        }
        Ok(Self(site))
    }
}

impl ValueObject for SiteName {
    fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SiteName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-deployment uid appended to endpoint names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentUid(String);

impl DeploymentUid {
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let uid = raw.trim();
        if uid.is_empty() || uid.len() > UID_MAX_LEN {
            return Err(CoreError::validation(format!(
                "deployment uid must be 1-{UID_MAX_LEN} characters, got {uid:?}"
            )));
        }
        if !uid
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(CoreError::validation(format!(
                "deployment uid {uid:?} may only contain lowercase letters and digits"
            )));
        }
        Ok(Self(uid.to_string()))
    }
}

impl ValueObject for DeploymentUid {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// Name of the remote batch endpoint serving one species.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointName(String);

impl EndpointName {
    /// Derive the endpoint name for `entity` at `site`.
    ///
    /// The `{site}-{normalized}` base is cut so the whole name (uid suffix
    /// included) fits in [`ENDPOINT_NAME_MAX_LEN`] characters. A `-` left
    /// dangling by the cut is dropped.
    pub fn derive(site: &SiteName, entity: &Entity, uid: Option<&DeploymentUid>) -> Self {
        let base = Self::base(site, entity);
        let mut name: String = base.chars().take(Self::budget(uid)).collect();
        while name.ends_with('-') {
            name.pop();
        }

        if let Some(uid) = uid {
            name.push('-');
            name.push_str(uid.as_str());
        }
        Self(name)
    }

    /// Whether [`EndpointName::derive`] has to cut the `{site}-{normalized}`
    /// base to stay within [`ENDPOINT_NAME_MAX_LEN`].
    pub fn is_shortened(site: &SiteName, entity: &Entity, uid: Option<&DeploymentUid>) -> bool {
        Self::base(site, entity).chars().count() > Self::budget(uid)
    }

    fn base(site: &SiteName, entity: &Entity) -> String {
        format!("{}-{}", site.as_str(), entity.normalized())
    }

    /// Characters left for the base once the uid suffix is reserved.
    fn budget(uid: Option<&DeploymentUid>) -> usize {
        match uid {
            Some(uid) => ENDPOINT_NAME_MAX_LEN - 1 - uid.as_str().chars().count(),
            None => ENDPOINT_NAME_MAX_LEN,
        }
    }
}

impl ValueObject for EndpointName {
    fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for EndpointName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Distinct species names that were mapped onto the same endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointCollision {
    pub endpoint: EndpointName,
    pub entities: Vec<String>,
}

/// Find endpoints claimed by more than one *distinct* species name.
///
/// Repeated occurrences of the same species are not collisions.
pub fn find_collisions<'a, I>(pairs: I) -> Vec<EndpointCollision>
where
    I: IntoIterator<Item = (&'a Entity, &'a EndpointName)>,
{
    let mut by_endpoint: BTreeMap<&EndpointName, Vec<&str>> = BTreeMap::new();
    for (entity, endpoint) in pairs {
        let names = by_endpoint.entry(endpoint).or_default();
        if !names.contains(&entity.name()) {
            names.push(entity.name());
        }
    }

    by_endpoint
        .into_iter()
        .filter(|(_, names)| names.len() > 1)
        .map(|(endpoint, names)| {
            let mut entities: Vec<String> = names.into_iter().map(str::to_string).collect();
            entities.sort();
            EndpointCollision {
                endpoint: endpoint.clone(),
                entities,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn site(s: &str) -> SiteName {
        SiteName::parse(s).unwrap()
    }

    #[test]
    fn normalize_lowercases_and_replaces_spaces() {
        assert_eq!(normalize("Abies lasiocarpa"), "abies-lasiocarpa");
        assert_eq!(normalize("  Pinus contorta "), "pinus-contorta");
        assert_eq!(normalize("Abies-lasiocarpa"), "abies-lasiocarpa");
    }

    #[test]
    fn derives_site_prefixed_names() {
        let cherry = site("cherrypt");
        assert_eq!(
            EndpointName::derive(&cherry, &Entity::new("Abies-lasiocarpa"), None).as_str(),
            "cherrypt-abies-lasiocarpa"
        );
        assert_eq!(
            EndpointName::derive(&cherry, &Entity::new("Pinus-contorta"), None).as_str(),
            "cherrypt-pinus-contorta"
        );
    }

    #[test]
    fn long_names_are_truncated_without_dangling_dash() {
        let cherry = site("cherrypt");
        // "cherrypt-melanitta-perspicillata" is exactly 32 characters.
        let exact = EndpointName::derive(&cherry, &Entity::new("Melanitta perspicillata"), None);
        assert_eq!(exact.as_str(), "cherrypt-melanitta-perspicillata");

        let cut = EndpointName::derive(&cherry, &Entity::new("Pseudotsuga menziesii-x glauca"), None);
        assert_eq!(cut.as_str(), "cherrypt-pseudotsuga-menziesii-x");
        // Here the 32nd character is a '-'.
        let dangling = EndpointName::derive(&cherry, &Entity::new("Pseudotsugaaa menziesi glauca"), None);
        assert_eq!(dangling.as_str(), "cherrypt-pseudotsugaaa-menziesi");
    }

    #[test]
    fn uid_suffix_fits_in_budget() {
        let uid = DeploymentUid::parse("a1b2c3").unwrap();
        let name = EndpointName::derive(
            &site("cherrypt"),
            &Entity::new("Melanitta perspicillata"),
            Some(&uid),
        );
        assert_eq!(name.as_str(), "cherrypt-melanitta-perspi-a1b2c3");
        assert!(name.as_str().chars().count() <= ENDPOINT_NAME_MAX_LEN);
    }

    #[test]
    fn reports_when_a_name_is_shortened() {
        let cherry = site("cherrypt");
        let uid = DeploymentUid::parse("a1b2c3").unwrap();
        let exact = Entity::new("Melanitta perspicillata");
        let long = Entity::new("Pseudotsuga menziesii-x glauca");

        assert!(!EndpointName::is_shortened(&cherry, &Entity::new("Pinus contorta"), None));
        assert!(!EndpointName::is_shortened(&cherry, &exact, None));
        assert!(EndpointName::is_shortened(&cherry, &exact, Some(&uid)));
        assert!(EndpointName::is_shortened(&cherry, &long, None));
    }

    #[test]
    fn site_name_validation() {
        assert_eq!(site(" CherryPt ").as_str(), "cherrypt");
        assert!(SiteName::parse("").is_err());
        assert!(SiteName::parse("cherry pt").is_err());
        assert!(SiteName::parse(&"x".repeat(31)).is_err());
    }

    #[test]
    fn uid_validation() {
        assert!(DeploymentUid::parse("abc123").is_ok());
        assert!(DeploymentUid::parse("ABC").is_err());
        assert!(DeploymentUid::parse("").is_err());
        assert!(DeploymentUid::parse(&"a".repeat(17)).is_err());
    }

    #[test]
    fn collisions_only_between_distinct_names() {
        let cherry = site("cherrypt");
        let entities = vec![
            Entity::new("Abies lasiocarpa"),
            Entity::new("Abies lasiocarpa"),
            Entity::new("abies-lasiocarpa"),
            Entity::new("Pinus contorta"),
        ];
        let endpoints: Vec<_> = entities
            .iter()
            .map(|e| EndpointName::derive(&cherry, e, None))
            .collect();

        let collisions = find_collisions(entities.iter().zip(endpoints.iter()));
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].endpoint.as_str(), "cherrypt-abies-lasiocarpa");
        assert_eq!(
            collisions[0].entities,
            vec!["Abies lasiocarpa".to_string(), "abies-lasiocarpa".to_string()]
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        /// Property: endpoint names never exceed the remote limit.
        #[test]
        fn endpoint_name_never_exceeds_limit(
            species in "\\PC{0,80}",
            site_raw in "[a-z0-9]{1,30}",
            uid_raw in proptest::option::of("[a-z0-9]{1,16}"),
        ) {
            let site = SiteName::parse(&site_raw).unwrap();
            let uid = uid_raw.map(|u| DeploymentUid::parse(&u).unwrap());
            let name = EndpointName::derive(&site, &Entity::new(species), uid.as_ref());
            prop_assert!(name.as_str().chars().count() <= ENDPOINT_NAME_MAX_LEN);
        }

        /// Property: same site + species always yields the same endpoint.
        #[test]
        fn endpoint_name_is_deterministic(
            species in "[A-Za-z][A-Za-z -]{0,60}",
            site_raw in "[a-z]{1,12}",
        ) {
            let site = SiteName::parse(&site_raw).unwrap();
            let a = EndpointName::derive(&site, &Entity::new(species.clone()), None);
            let b = EndpointName::derive(&site, &Entity::new(species), None);
            prop_assert_eq!(a, b);
        }
    }
}

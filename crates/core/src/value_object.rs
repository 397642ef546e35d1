//! Value object trait: equality by value, not identity.

/// Marker trait for immutable, validated values compared by their contents.
///
/// Names derived from configuration (site names, endpoint names) are value
/// objects: two `EndpointName`s built from the same site and species are the
/// same endpoint. To "change" one, build a new value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {
    /// The canonical string form of the value.
    fn as_str(&self) -> &str;
}

//! Provider collection and finalization

use super::{Provider, ProviderRecord, RawVirtuals, ResolvedVirtuals};
use crate::atom::AnyOf;
use crate::repo::Package;

/// Provider records declared by `packages`
///
/// Each package contributes one record per virtual its provides expression
/// yields under the package's enabled options. The virtual name is the
/// package part of the provided atom.
pub fn provider_records<'a, P, I>(packages: I) -> impl Iterator<Item = ProviderRecord> + 'a
where
    P: Package + 'a,
    I: IntoIterator<Item = &'a P>,
    I::IntoIter: 'a,
{
    packages.into_iter().flat_map(|pkg| {
        pkg.provided_virtuals()
            .into_iter()
            .map(move |provided| ProviderRecord {
                virtual_name: provided.package().to_string(),
                version: pkg.full_version().to_string(),
                atom: pkg.versioned_atom().clone(),
            })
    })
}

/// Accumulate the providers declared by `packages` into `raw`
///
/// Safe to call repeatedly on the same map to merge several sources.
pub fn collect<'a, P, I>(raw: &mut RawVirtuals, packages: I)
where
    P: Package + 'a,
    I: IntoIterator<Item = &'a P>,
    I::IntoIter: 'a,
{
    raw.extend(provider_records(packages));
}

/// Turn accumulated records into the immutable resolved map
///
/// A bucket with one atom resolves to that atom; a bucket with several
/// resolves to an order-preserving [`AnyOf`].
pub fn finalize(raw: RawVirtuals) -> ResolvedVirtuals {
    let map = raw
        .into_inner()
        .into_iter()
        .map(|(name, buckets)| {
            let buckets = buckets
                .into_iter()
                .filter_map(|(version, mut atoms)| {
                    let provider = match atoms.len() {
                        0 => return None,
                        1 => Provider::Single(atoms.remove(0)),
                        _ => Provider::AnyOf(AnyOf::new(atoms)),
                    };
                    Some((version, provider))
                })
                .collect();
            (name, buckets)
        })
        .collect();

    ResolvedVirtuals::from_map(map)
}

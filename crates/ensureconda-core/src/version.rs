//! Candidate ordering.
//!
//! The package index republishes the same version with incremented build
//! numbers or rebuilt timestamps, so a plain version compare is not enough:
//! ties break on build number, then timestamp. An unparsable version is a
//! fatal error rather than being skipped - a silently dropped record could
//! change which artifact is "latest".

use semver::Version;

use crate::registry::{PackageRecord, ResolveError};

/// Total-order sort key for one package record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CandidateKey {
    version: Version,
    build_number: i32,
    timestamp: u64,
}

/// Parse a record's sort key. Fails on a version `semver` cannot parse.
pub fn candidate_key(record: &PackageRecord) -> Result<CandidateKey, ResolveError> {
    let version = Version::parse(&record.version).map_err(|source| ResolveError::BadVersion {
        version: record.version.clone(),
        source,
    })?;
    Ok(CandidateKey {
        version,
        build_number: record.attrs.build_number,
        timestamp: record.attrs.timestamp,
    })
}

/// Sort records ascending by `(version, build_number, timestamp)`.
///
/// Keys are parsed up front so that one bad version fails the whole
/// resolution instead of producing an arbitrary order.
pub fn sort_candidates(records: Vec<PackageRecord>) -> Result<Vec<PackageRecord>, ResolveError> {
    let mut keyed = records
        .into_iter()
        .map(|record| Ok((candidate_key(&record)?, record)))
        .collect::<Result<Vec<_>, ResolveError>>()?;
    keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(keyed.into_iter().map(|(_, record)| record).collect())
}

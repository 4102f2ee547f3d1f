//! Semantic-version resolution against the manifest index.

use semver::Version;

use crate::{ManifestIndex, MetadataError, ModelHeader, VersionedModelId, LATEST_VERSION};

/// Parses a dot-separated numeric version.
///
/// Manifest entries occasionally carry incomplete versions like `"2"` or
/// `"2.1"`; those are padded with zeroes before parsing so that comparisons
/// stay numeric.
pub(crate) fn parse_version(raw: &str) -> Result<Version, MetadataError> {
    let normalized = match raw.split('.').count() {
        1 => format!("{raw}.0.0"),
        2 => format!("{raw}.0"),
        _ => raw.to_owned(),
    };
    Version::parse(&normalized).map_err(|_| MetadataError::InvalidVersion(raw.to_owned()))
}

/// Selects the manifest entry satisfying `requested`, given the caller's
/// library version.
///
/// Only entries whose `min_version` is at or below `library_version` can be
/// returned. Entries above it are still consulted, but strictly to produce a
/// diagnostic error telling the caller which library version they would have
/// to upgrade to.
pub(crate) fn select_header<'a>(
    index: &'a ManifestIndex,
    requested: &VersionedModelId,
    library_version: &Version,
) -> Result<&'a ModelHeader, MetadataError> {
    let mut compatible = Vec::new();
    let mut incompatible = Vec::new();
    for header in index
        .values()
        .filter(|header| header.model_id == requested.model_id())
    {
        let min_version = parse_version(&header.min_version)?;
        if min_version <= *library_version {
            compatible.push(header);
        } else {
            incompatible.push((header, min_version));
        }
    }

    if compatible.is_empty() && incompatible.is_empty() {
        let hint = match nearest_model_id(index, requested.model_id()) {
            Some(nearest) => format!("unknown model id, did you mean '{nearest}'?"),
            None => "unknown model id".to_owned(),
        };
        return Err(not_found(requested, hint));
    }

    if let Some(header) = pick(&compatible, requested)? {
        return Ok(header);
    }

    // No compatible match. If an incompatible entry would have matched, tell
    // the caller which library version unlocks it.
    if let Some((header, min_version)) = pick_incompatible(&incompatible, requested)? {
        let hint = format!(
            "version '{}' requires library version >= {min_version}, please upgrade",
            header.version
        );
        return Err(not_found(requested, hint));
    }

    let mut available: Vec<&str> = compatible
        .iter()
        .map(|header| header.version.as_str())
        .collect();
    available.sort_unstable();
    let hint = format!("available versions: {}", available.join(", "));
    Err(not_found(requested, hint))
}

fn not_found(requested: &VersionedModelId, hint: String) -> MetadataError {
    MetadataError::NotFound {
        model_id: requested.model_id().to_owned(),
        version: requested.version().to_owned(),
        hint,
    }
}

/// Picks the best entry among `candidates` for the requested constraint:
/// the numerically greatest version for [`LATEST_VERSION`], an exact numeric
/// match otherwise.
fn pick<'a>(
    candidates: &[&'a ModelHeader],
    requested: &VersionedModelId,
) -> Result<Option<&'a ModelHeader>, MetadataError> {
    if requested.version() == LATEST_VERSION {
        let mut best: Option<(&ModelHeader, Version)> = None;
        for header in candidates {
            let version = parse_version(&header.version)?;
            if best.as_ref().map_or(true, |(_, current)| version > *current) {
                best = Some((header, version));
            }
        }
        Ok(best.map(|(header, _)| header))
    } else {
        let wanted = parse_version(requested.version())?;
        for header in candidates {
            if parse_version(&header.version)? == wanted {
                return Ok(Some(header));
            }
        }
        Ok(None)
    }
}

/// Like [`pick`], but over the incompatible entries, keeping the parsed
/// minimum library version for the diagnostic.
fn pick_incompatible<'a>(
    candidates: &'a [(&'a ModelHeader, Version)],
    requested: &VersionedModelId,
) -> Result<Option<(&'a ModelHeader, &'a Version)>, MetadataError> {
    if requested.version() == LATEST_VERSION {
        let mut best: Option<(usize, Version)> = None;
        for (position, (header, _)) in candidates.iter().enumerate() {
            let version = parse_version(&header.version)?;
            if best.as_ref().map_or(true, |(_, current)| version > *current) {
                best = Some((position, version));
            }
        }
        Ok(best.map(|(position, _)| {
            let (header, min_version) = &candidates[position];
            (*header, min_version)
        }))
    } else {
        let wanted = parse_version(requested.version())?;
        for (header, min_version) in candidates {
            if parse_version(&header.version)? == wanted {
                return Ok(Some((header, min_version)));
            }
        }
        Ok(None)
    }
}

/// Finds the model id in the index closest to `model_id` by edit distance.
///
/// Only ids within an edit distance of half the requested id's length are
/// suggested, so wildly unrelated ids never show up in error messages.
fn nearest_model_id<'a>(index: &'a ManifestIndex, model_id: &str) -> Option<&'a str> {
    let cutoff = model_id.len().div_ceil(2).max(3);
    index
        .values()
        .map(|header| header.model_id.as_str())
        .map(|candidate| (candidate, edit_distance(model_id, candidate)))
        .filter(|(_, distance)| *distance <= cutoff)
        .min_by_key(|(candidate, distance)| (*distance, candidate.to_owned()))
        .map(|(candidate, _)| candidate)
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

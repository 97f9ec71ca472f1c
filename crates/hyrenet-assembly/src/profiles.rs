//! Profile binding.
//!
//! A profile is only bound when its index is the snapshot index: same name,
//! same length, same timestamps in the same order. Anything else is a
//! [`NetworkError::ProfileIndexMismatch`]; profiles are never resampled.
//! An unavailable profile file binds nothing and leaves the component's
//! own values in place.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use hyrenet_core::{IndexMismatch, Network, NetworkError, NetworkResult, Snapshots, TimeSeries};
use hyrenet_io::{ConfigRepository, ProfileTable};
use tracing::{debug, warn};

use crate::config::ProfileConfig;

/// Loads profiles once per `(type, id)` and binds their columns.
#[derive(Debug, Default)]
pub struct ProfileBinder {
    cache: BTreeMap<(String, String), ProfileTable>,
}

impl ProfileBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `column` of `profiles/<profile_type>/<profile_id>.csv` for `entity`.
    ///
    /// Returns `Ok(None)` when the profile file is unavailable.
    pub fn bind(
        &mut self,
        repo: &mut ConfigRepository,
        snapshots: &Snapshots,
        entity: &str,
        profile_type: &str,
        profile_id: &str,
        column: &str,
    ) -> NetworkResult<Option<TimeSeries>> {
        let profile = self.profile(repo, profile_type, profile_id)?;
        if profile.is_empty() {
            warn!(entity, profile_id, "profile unavailable, keeping static values");
            return Ok(None);
        }
        let series = profile
            .series(column)
            .ok_or_else(|| NetworkError::ProfileIndexMismatch {
                entity: entity.to_string(),
                mismatch: IndexMismatch::MissingColumn {
                    column: column.to_string(),
                },
            })?;
        check_alignment(entity, &series, snapshots)?;
        Ok(Some(series))
    }

    /// Same as [`bind`](Self::bind) but an absent column is not an error.
    pub fn bind_optional(
        &mut self,
        repo: &mut ConfigRepository,
        snapshots: &Snapshots,
        entity: &str,
        profile_type: &str,
        profile_id: &str,
        column: &str,
    ) -> NetworkResult<Option<TimeSeries>> {
        let Some(series) = self.profile(repo, profile_type, profile_id)?.series(column) else {
            return Ok(None);
        };
        check_alignment(entity, &series, snapshots)?;
        Ok(Some(series))
    }

    /// Bind every load and generator that names a `profile_id`.
    ///
    /// Loads take `p_set` (and `q_set` when present) from the load profile
    /// type; generators take `p_max_pu` from the generator profile type.
    /// Returns the number of components that received at least one series.
    pub fn bind_network(
        &mut self,
        repo: &mut ConfigRepository,
        network: &mut Network,
        config: &ProfileConfig,
    ) -> NetworkResult<usize> {
        let snapshots = network.snapshots.clone();
        let mut bound = 0;

        for load in network.loads.values_mut() {
            let Some(profile_id) = load.profile_id.clone() else {
                continue;
            };
            let ptype = config.load_profile_type.as_str();
            if let Some(p_set) = self.bind(repo, &snapshots, &load.name, ptype, &profile_id, "p_set")? {
                load.series.insert("p_set".to_string(), p_set.values);
                if let Some(q_set) =
                    self.bind_optional(repo, &snapshots, &load.name, ptype, &profile_id, "q_set")?
                {
                    load.series.insert("q_set".to_string(), q_set.values);
                }
                bound += 1;
            }
        }

        for generator in network.generators.values_mut() {
            let Some(profile_id) = generator.profile_id.clone() else {
                continue;
            };
            let ptype = config.generator_profile_type.as_str();
            if let Some(p_max_pu) =
                self.bind(repo, &snapshots, &generator.name, ptype, &profile_id, "p_max_pu")?
            {
                generator
                    .series
                    .insert("p_max_pu".to_string(), p_max_pu.values);
                bound += 1;
            }
        }

        debug!(bound, cached = self.cache.len(), "profiles bound");
        Ok(bound)
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    fn profile(
        &mut self,
        repo: &mut ConfigRepository,
        profile_type: &str,
        profile_id: &str,
    ) -> NetworkResult<&ProfileTable> {
        let key = (profile_type.to_string(), profile_id.to_string());
        let profile = match self.cache.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(repo.load_profile(profile_type, profile_id)?),
        };
        Ok(profile)
    }
}

fn check_alignment(entity: &str, series: &TimeSeries, snapshots: &Snapshots) -> NetworkResult<()> {
    series
        .aligned_with(snapshots)
        .map_err(|mismatch| NetworkError::ProfileIndexMismatch {
            entity: entity.to_string(),
            mismatch,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use hyrenet_core::ErrorKind;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn snapshots(periods: usize) -> Snapshots {
        let start = NaiveDate::from_ymd_opt(2024, 10, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        Snapshots::hourly(start, periods).unwrap()
    }

    fn write_profile(root: &Path, ptype: &str, id: &str, body: &str) {
        let dir = root.join("profiles").join(ptype);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.csv", id)), body).unwrap();
    }

    #[test]
    fn test_aligned_profile_binds() {
        let dir = tempdir().unwrap();
        write_profile(
            dir.path(),
            "load_profiles",
            "household",
            "snapshot,p_set\n2024-10-01 00:00:00,1.0\n2024-10-01 01:00:00,2.0\n",
        );
        let mut repo = ConfigRepository::new(dir.path());
        let mut binder = ProfileBinder::new();

        let series = binder
            .bind(&mut repo, &snapshots(2), "L1", "load_profiles", "household", "p_set")
            .unwrap()
            .unwrap();
        assert_eq!(series.values, vec![1.0, 2.0]);
        assert_eq!(binder.cached(), 1);

        let q_set = binder
            .bind_optional(&mut repo, &snapshots(2), "L1", "load_profiles", "household", "q_set")
            .unwrap();
        assert!(q_set.is_none());
        assert_eq!(binder.cached(), 1);

        binder.clear();
        assert_eq!(binder.cached(), 0);
    }

    #[test]
    fn test_mismatch_kinds() {
        let dir = tempdir().unwrap();
        write_profile(
            dir.path(),
            "generator_profiles",
            "renamed",
            "time,p_max_pu\n2024-10-01 00:00:00,0.1\n2024-10-01 01:00:00,0.2\n",
        );
        write_profile(
            dir.path(),
            "generator_profiles",
            "short",
            "snapshot,p_max_pu\n2024-10-01 00:00:00,0.1\n",
        );
        write_profile(
            dir.path(),
            "generator_profiles",
            "shifted",
            "snapshot,p_max_pu\n2024-10-01 00:00:00,0.1\n2024-10-01 02:00:00,0.2\n",
        );
        let mut repo = ConfigRepository::new(dir.path());
        let mut binder = ProfileBinder::new();
        let snaps = snapshots(2);

        let mismatch = |binder: &mut ProfileBinder, repo: &mut ConfigRepository, id: &str, column: &str| {
            match binder.bind(repo, &snaps, "G1", "generator_profiles", id, column) {
                Err(NetworkError::ProfileIndexMismatch { entity, mismatch }) => {
                    assert_eq!(entity, "G1");
                    mismatch
                }
                other => panic!("expected index mismatch, got {:?}", other),
            }
        };

        assert!(matches!(
            mismatch(&mut binder, &mut repo, "renamed", "p_max_pu"),
            IndexMismatch::Name { .. }
        ));
        assert_eq!(
            mismatch(&mut binder, &mut repo, "short", "p_max_pu"),
            IndexMismatch::Length { expected: 2, found: 1 }
        );
        assert!(matches!(
            mismatch(&mut binder, &mut repo, "shifted", "p_max_pu"),
            IndexMismatch::Values { position: 1, .. }
        ));
        assert!(matches!(
            mismatch(&mut binder, &mut repo, "shifted", "p_set"),
            IndexMismatch::MissingColumn { .. }
        ));
    }

    #[test]
    fn test_unavailable_profile_binds_nothing() {
        let dir = tempdir().unwrap();
        let mut repo = ConfigRepository::new(dir.path());
        let mut binder = ProfileBinder::new();

        let bound = binder
            .bind(&mut repo, &snapshots(2), "L1", "load_profiles", "missing", "p_set")
            .unwrap();
        assert!(bound.is_none());
        assert!(repo.diagnostics().has_errors());

        let err = binder
            .bind(&mut repo, &snapshots(2), "L1", "weather", "missing", "p_set")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisallowedSource);
    }
}

use crate::config::ObservationType;
use crate::error::{CliError, Result};
use num_complex::Complex64;
use serde::{Deserialize, Deserializer, Serialize};
use sigmaa::core::models::cell::UnitCell;
use sigmaa::core::models::miller::MillerIndex;
use sigmaa::core::models::reflections::{MillerArray, ObservedData, ReflectionSet};
use sigmaa::engine::error::EngineError;
use sigmaa::workflows::estimate::SigmaaEstimate;
use std::path::Path;
use tracing::{debug, info};

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" => Ok(true),
        "0" | "false" | "f" | "no" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid flag '{other}', expected 0/1 or true/false"
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct InputRow {
    h: i32,
    k: i32,
    l: i32,
    obs: f64,
    calc_amplitude: f64,
    /// Degrees.
    calc_phase: f64,
    #[serde(deserialize_with = "deserialize_flag")]
    free: bool,
    #[serde(deserialize_with = "deserialize_flag")]
    centric: bool,
    #[serde(default)]
    epsilon: Option<f64>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    h: i32,
    k: i32,
    l: i32,
    d_star_cubed: f64,
    sigmaa: f64,
    alpha: f64,
    beta: f64,
    fom: f64,
}

/// The three aligned arrays the estimation workflow consumes.
#[derive(Debug)]
pub struct ReflectionTable {
    pub observed: ObservedData,
    pub calculated: MillerArray<Complex64>,
    pub free_flags: MillerArray<bool>,
}

impl ReflectionTable {
    pub fn read_from_path(
        path: &Path,
        cell: &UnitCell,
        observation_type: ObservationType,
    ) -> Result<Self> {
        info!("Reading reflection table from {:?}", path);
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;

        let mut indices = Vec::new();
        let mut centric = Vec::new();
        let mut epsilons = Vec::new();
        let mut observed = Vec::new();
        let mut calculated = Vec::new();
        let mut free = Vec::new();

        for record in reader.deserialize() {
            let row: InputRow = record?;
            indices.push(MillerIndex::new(row.h, row.k, row.l));
            centric.push(row.centric);
            epsilons.push(row.epsilon.unwrap_or(1.0));
            observed.push(row.obs);
            calculated.push(Complex64::from_polar(
                row.calc_amplitude,
                row.calc_phase.to_radians(),
            ));
            free.push(row.free);
        }

        if indices.is_empty() {
            return Err(CliError::FileParsing {
                path: path.to_path_buf(),
                source: anyhow::anyhow!("the reflection table has no rows"),
            });
        }
        debug!(
            n_reflections = indices.len(),
            n_free = free.iter().filter(|&&f| f).count(),
            "Reflection table parsed."
        );

        let set = ReflectionSet::new(cell.clone(), indices, centric)
            .and_then(|set| set.with_epsilons(epsilons))
            .map_err(EngineError::from)?;

        let observed = MillerArray::new(set.clone(), observed).map_err(EngineError::from)?;
        let observed = match observation_type {
            ObservationType::Amplitude => ObservedData::Amplitudes(observed),
            ObservationType::Intensity => ObservedData::Intensities(observed),
        };
        let calculated = MillerArray::new(set.clone(), calculated).map_err(EngineError::from)?;
        let free_flags = MillerArray::new(set, free).map_err(EngineError::from)?;

        Ok(Self {
            observed,
            calculated,
            free_flags,
        })
    }
}

/// Writes one row per reflection of `estimate`.
pub fn write_estimate(path: &Path, estimate: &SigmaaEstimate) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for (i, index) in estimate.indices().iter().enumerate() {
        writer.serialize(OutputRow {
            h: index.h,
            k: index.k,
            l: index.l,
            d_star_cubed: estimate.d_star_cubed()[i],
            sigmaa: estimate.sigmaa()[i],
            alpha: estimate.alpha()[i],
            beta: estimate.beta()[i],
            fom: estimate.fom()[i],
        })?;
    }
    writer.flush()?;
    info!("Wrote {} reflections to {:?}", estimate.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const TABLE: &str = "\
h,k,l,obs,calc_amplitude,calc_phase,free,centric,epsilon
1,0,0,10.0,8.0,0.0,1,true,1
0,1,2,20.0,5.0,90.0,0,false,2
-1,2,3,4.0,2.0,180.0,false,0,
";

    fn write_table(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("reflections.csv");
        fs::write(&path, content).unwrap();
        path
    }

    fn cell() -> UnitCell {
        UnitCell::cubic(30.0).unwrap()
    }

    #[test]
    fn reads_all_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(&dir, TABLE);

        let table =
            ReflectionTable::read_from_path(&path, &cell(), ObservationType::Amplitude).unwrap();

        let ObservedData::Amplitudes(observed) = &table.observed else {
            panic!("expected amplitudes, got {}", table.observed.kind());
        };
        assert_eq!(observed.data(), &[10.0, 20.0, 4.0]);
        assert_eq!(observed.indices()[2], MillerIndex::new(-1, 2, 3));
        assert_eq!(observed.set().centric_flags(), &[true, false, false]);
        assert_eq!(observed.set().epsilons(), &[1.0, 2.0, 1.0]);
        assert_eq!(table.free_flags.data(), &[true, false, false]);

        let phased = table.calculated.data();
        assert!((phased[0] - Complex64::new(8.0, 0.0)).norm() < 1e-12);
        assert!((phased[1] - Complex64::new(0.0, 5.0)).norm() < 1e-12);
        assert!((phased[2] - Complex64::new(-2.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn epsilon_column_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(
            &dir,
            "h,k,l,obs,calc_amplitude,calc_phase,free,centric\n1,1,1,9.0,3.0,45.0,1,0\n",
        );

        let table =
            ReflectionTable::read_from_path(&path, &cell(), ObservationType::Intensity).unwrap();

        assert!(matches!(table.observed, ObservedData::Intensities(_)));
        assert_eq!(table.observed.set().epsilons(), &[1.0]);
    }

    #[test]
    fn invalid_flags_are_csv_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(
            &dir,
            "h,k,l,obs,calc_amplitude,calc_phase,free,centric\n1,1,1,9.0,3.0,45.0,maybe,0\n",
        );
        let result = ReflectionTable::read_from_path(&path, &cell(), ObservationType::Amplitude);
        assert!(matches!(result, Err(CliError::Csv(_))));
    }

    #[test]
    fn epsilon_below_one_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(
            &dir,
            "h,k,l,obs,calc_amplitude,calc_phase,free,centric,epsilon\n1,1,1,9.0,3.0,45.0,1,0,0.5\n",
        );
        let result = ReflectionTable::read_from_path(&path, &cell(), ObservationType::Amplitude);
        assert!(matches!(
            result,
            Err(CliError::Core(EngineError::Reflection { .. }))
        ));
    }

    #[test]
    fn empty_table_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(&dir, "h,k,l,obs,calc_amplitude,calc_phase,free,centric\n");
        let result = ReflectionTable::read_from_path(&path, &cell(), ObservationType::Amplitude);
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }
}

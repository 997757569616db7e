/*!
# Saving selection summaries to CSV

Writes one row per coefficient of a [`SelectionSummary`]. Enable via the `csv` feature.
*/

use std::fs::File;
use std::path::Path;

use csv::Writer;
use ndarray::Array1;

use crate::core::SelectionSummary;
use crate::error::Result;

fn cell(values: Option<&Array1<f64>>, i: usize) -> String {
    values
        .and_then(|v| v.get(i))
        .map(|x| x.to_string())
        .unwrap_or_default()
}

/**
Saves a selection summary as a CSV file.

The header is `index,kind,pip,beta,beta_std,conditional_beta,rhat`. The first
`P` rows are the selectable covariates (`kind = covariate`), followed by one
row per always-included column (`kind = assumed`) when coefficients were
computed. Quantities that were not computed are left empty; assumed columns
have `pip = 1`.

# Examples

```rust
use mini_bvs::core::SelectionSummary;
use mini_bvs::io::csv::save_summary_csv;
use ndarray::array;

let summary = SelectionSummary {
    pip: array![0.9, 0.1],
    beta: None,
    beta_std: None,
    conditional_beta: None,
    h_mean: None,
    mean_num_active: 1.0,
    rhat: None,
    chain_stats: vec![],
    n_samples: 10,
};
save_summary_csv(&summary, "/tmp/summary.csv")?;
# Ok::<(), mini_bvs::error::SelectionError>(())
```
*/
pub fn save_summary_csv<P: AsRef<Path>>(summary: &SelectionSummary, filename: P) -> Result<()> {
    let mut wtr = Writer::from_writer(File::create(filename)?);
    wtr.write_record([
        "index",
        "kind",
        "pip",
        "beta",
        "beta_std",
        "conditional_beta",
        "rhat",
    ])?;

    let p = summary.pip.len();
    let n_rows = summary.beta.as_ref().map_or(p, |b| b.len().max(p));
    for i in 0..n_rows {
        let (kind, pip) = if i < p {
            ("covariate", summary.pip[i].to_string())
        } else {
            ("assumed", 1.0.to_string())
        };
        wtr.write_record([
            i.to_string(),
            kind.to_string(),
            pip,
            cell(summary.beta.as_ref(), i),
            cell(summary.beta_std.as_ref(), i),
            cell(summary.conditional_beta.as_ref(), i),
            cell(summary.rhat.as_ref(), i),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use csv::Reader;
    use ndarray::array;
    use std::fs;
    use tempfile::NamedTempFile;

    fn summary(with_beta: bool) -> SelectionSummary {
        SelectionSummary {
            pip: array![0.75, 0.5],
            beta: with_beta.then(|| array![1.5, 0.0, -2.0]),
            beta_std: with_beta.then(|| array![0.25, 0.0, 0.5]),
            conditional_beta: with_beta.then(|| array![2.0, 0.0, -2.0]),
            h_mean: None,
            mean_num_active: 1.25,
            rhat: Some(array![1.0, 1.5]),
            chain_stats: vec![],
            n_samples: 4,
        }
    }

    #[test]
    fn test_save_summary_without_betas() {
        let file = NamedTempFile::new().expect("Could not create temp file");
        save_summary_csv(&summary(false), file.path()).unwrap();

        let contents = fs::read_to_string(file.path()).unwrap();
        let expected = "\
index,kind,pip,beta,beta_std,conditional_beta,rhat
0,covariate,0.75,,,,1
1,covariate,0.5,,,,1.5";
        assert_eq!(contents.trim(), expected);
    }

    #[test]
    fn test_save_summary_with_assumed_rows() {
        let file = NamedTempFile::new().expect("Could not create temp file");
        save_summary_csv(&summary(true), file.path()).unwrap();

        let mut rdr = Reader::from_path(file.path()).unwrap();
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][3], "1.5");
        assert_eq!(&rows[2][1], "assumed");
        assert_eq!(&rows[2][2], "1");
        assert_eq!(&rows[2][3], "-2");
        assert_eq!(&rows[2][6], "");
    }

    #[test]
    fn test_unwritable_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("summary.csv");
        assert!(matches!(
            save_summary_csv(&summary(false), path),
            Err(crate::error::SelectionError::Io(_))
        ));
    }
}

//! Final result aggregation: one table built by the elected rank after
//! shutdown, persisted as CSV.

use std::path::Path;

use serde::{Deserialize, Serialize};

use hv_types::{HvError, HvResult, SearchSpace, ShapeError, Value};

use crate::history::History;

/// The run's sole externally visible result artifact.
///
/// Columns are the declared parameter names, then `objective` (restored to
/// the user's original sign convention), then every accumulated info key in
/// first-observed order. Rows follow final history insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    headers: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultTable {
    /// Merge the locally-visible history into one table.
    pub fn from_history(space: &SearchSpace, history: &History) -> HvResult<Self> {
        let (points, objectives, infos) = history.infos(None)?;

        let mut headers: Vec<String> = space.names().iter().map(|n| n.to_string()).collect();
        headers.push("objective".to_string());
        headers.extend(infos.keys.iter().cloned());

        let mut rows = Vec::with_capacity(points.len());
        for (j, point) in points.iter().enumerate() {
            if point.len() != space.len() {
                return Err(ShapeError::PointArity {
                    expected: space.len(),
                    actual: point.len(),
                }
                .into());
            }
            let mut row = point.clone();
            // Internal objectives are negated for maximization; undo here.
            row.push(Value::Float(-objectives[j]));
            row.extend(infos.columns.iter().map(|col| col[j]));
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One column by header name.
    pub fn column(&self, name: &str) -> Option<Vec<Value>> {
        let index = self.headers.iter().position(|h| h == name)?;
        Some(self.rows.iter().map(|row| row[index]).collect())
    }

    /// The row with the best (highest) objective value.
    pub fn best_row(&self) -> Option<&Vec<Value>> {
        let index = self.headers.iter().position(|h| h == "objective")?;
        self.rows.iter().max_by(|a, b| {
            a[index]
                .as_f64()
                .partial_cmp(&b[index].as_f64())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    /// Persist as CSV with a header row.
    pub fn write_csv(&self, path: &Path) -> HvResult<()> {
        let mut writer = csv::Writer::from_path(path).map_err(|e| HvError::Csv(e.to_string()))?;
        writer
            .write_record(&self.headers)
            .map_err(|e| HvError::Csv(e.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(|v| v.to_string()))
                .map_err(|e| HvError::Csv(e.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (SearchSpace, History) {
        let space = SearchSpace::new().add_float("x", 0.0, 1.0).add_int("n", 1, 4);
        let mut history = History::new();
        history.append_info_keys(&["worker_rank"]);
        history
            .append(
                vec![Value::Float(0.25), Value::Int(2)],
                -0.25,
                vec![Value::Int(0)],
            )
            .unwrap();
        history
            .append(
                vec![Value::Float(0.75), Value::Int(3)],
                -0.75,
                vec![Value::Int(1)],
            )
            .unwrap();
        (space, history)
    }

    #[test]
    fn table_restores_the_user_sign_convention() {
        let (space, history) = sample();
        let table = ResultTable::from_history(&space, &history).unwrap();
        assert_eq!(table.headers(), &["x", "n", "objective", "worker_rank"]);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.column("objective").unwrap(),
            vec![Value::Float(0.25), Value::Float(0.75)]
        );
        assert_eq!(
            table.column("worker_rank").unwrap(),
            vec![Value::Int(0), Value::Int(1)]
        );
    }

    #[test]
    fn best_row_has_highest_objective() {
        let (space, history) = sample();
        let table = ResultTable::from_history(&space, &history).unwrap();
        let best = table.best_row().unwrap();
        assert_eq!(best[0], Value::Float(0.75));
    }

    #[test]
    fn csv_round_trips_headers_and_rows() {
        let (space, history) = sample();
        let table = ResultTable::from_history(&space, &history).unwrap();

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("results.csv");
        table.write_csv(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), "x,n,objective,worker_rank");
        assert_eq!(lines.next().unwrap(), "0.25,2,0.25,0");
        assert_eq!(lines.next().unwrap(), "0.75,3,0.75,1");
    }

    #[test]
    fn point_arity_mismatch_is_rejected() {
        let space = SearchSpace::new().add_float("x", 0.0, 1.0);
        let mut history = History::new();
        history.append_info_keys(&["worker_rank"]);
        history
            .append(
                vec![Value::Float(0.1), Value::Float(0.2)],
                0.0,
                vec![Value::Int(0)],
            )
            .unwrap();
        let err = ResultTable::from_history(&space, &history).unwrap_err();
        assert!(matches!(err, HvError::Shape(ShapeError::PointArity { .. })));
    }
}

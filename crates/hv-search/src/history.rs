//! Append-only per-rank evaluation history with unflushed-record bookkeeping.

use hv_types::{HvResult, InfoTable, Point, ShapeError, Value};

/// The ordered log of every evaluation this rank knows about.
///
/// Insertion order is arrival order (local production or peer receipt), not
/// global time order. Records are never removed or reordered; the buffer
/// counter only tracks how many records have not yet been flushed to peers.
#[derive(Debug, Default)]
pub struct History {
    points: Vec<Point>,
    objectives: Vec<f64>,
    info_keys: Vec<String>,
    infos: Vec<Vec<Value>>,
    unflushed: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register info-key names. The first registration fixes the schema;
    /// re-registering an existing key is a no-op, so keys are appended
    /// exactly once on first occurrence. Records appended before a key
    /// existed are backfilled with a NaN cell for it, so every row always
    /// matches the current schema arity.
    pub fn append_info_keys(&mut self, keys: &[&str]) {
        for key in keys {
            if !self.info_keys.iter().any(|k| k == key) {
                self.info_keys.push((*key).to_string());
                for row in &mut self.infos {
                    row.push(Value::Float(f64::NAN));
                }
            }
        }
    }

    pub fn info_keys(&self) -> &[String] {
        &self.info_keys
    }

    /// Append one record. A record may carry fewer info values than the
    /// schema holds keys — it was produced before the schema grew, and the
    /// missing trailing cells are recorded as NaN. More values than keys is
    /// an arity violation.
    pub fn append(&mut self, point: Point, objective: f64, mut info: Vec<Value>) -> HvResult<()> {
        if !self.info_keys.is_empty() {
            if info.len() > self.info_keys.len() {
                return Err(ShapeError::InfoArity {
                    expected: self.info_keys.len(),
                    actual: info.len(),
                }
                .into());
            }
            info.resize(self.info_keys.len(), Value::Float(f64::NAN));
        }
        self.points.push(point);
        self.objectives.push(objective);
        self.infos.push(info);
        self.unflushed += 1;
        Ok(())
    }

    /// Bulk append of N records with a columnar info block; every info
    /// column must hold exactly N values.
    pub fn extend(
        &mut self,
        points: Vec<Point>,
        objectives: Vec<f64>,
        infos: &InfoTable,
    ) -> HvResult<()> {
        let n = points.len();
        if objectives.len() != n {
            return Err(ShapeError::ColumnLength {
                key: "objective".into(),
                expected: n,
                actual: objectives.len(),
            }
            .into());
        }
        infos.validate(n)?;

        if self.info_keys.is_empty() {
            self.info_keys = infos.keys.clone();
        } else if infos.keys != self.info_keys {
            return Err(ShapeError::SchemaMismatch {
                expected: self.info_keys.clone(),
                actual: infos.keys.clone(),
            }
            .into());
        }

        self.points.extend(points);
        self.objectives.extend(objectives);
        self.infos.extend(infos.rows(n));
        self.unflushed += n;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Records appended (locally or from peers) since the last flush.
    pub fn unflushed(&self) -> usize {
        self.unflushed
    }

    /// Read-only snapshot of (points, objectives) in insertion order — the
    /// feed for the surrogate model.
    pub fn value(&self) -> (&[Point], &[f64]) {
        (&self.points, &self.objectives)
    }

    /// Points, objectives, and the columnar info block, restricted to the
    /// last `k` records when `k` is given.
    pub fn infos(&self, k: Option<usize>) -> HvResult<(Vec<Point>, Vec<f64>, InfoTable)> {
        let len = self.len();
        let k = k.unwrap_or(len);
        if k > len {
            return Err(ShapeError::Window { requested: k, len }.into());
        }
        let start = len - k;

        let columns = (0..self.info_keys.len())
            .map(|i| self.infos[start..].iter().map(|row| row[i]).collect())
            .collect();

        Ok((
            self.points[start..].to_vec(),
            self.objectives[start..].to_vec(),
            InfoTable::new(self.info_keys.clone(), columns),
        ))
    }

    /// Zero the unflushed counter. Records are kept; flushing never
    /// truncates.
    pub fn reset_buffer(&mut self) {
        self.unflushed = 0;
    }
}

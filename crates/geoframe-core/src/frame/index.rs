//! Row index: one or more named levels of labels.

use std::collections::HashMap;

use crate::value::Label;

use super::error::{FrameError, FrameResult};

/// A row (or column-axis) index.
///
/// Keys are stored row-major: `keys[i]` holds one label per level.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    names: Vec<Option<String>>,
    keys: Vec<Vec<Label>>,
}

impl Index {
    /// Default `0..len` index.
    pub fn range(len: usize) -> Self {
        Self {
            names: vec![None],
            keys: (0..len as i64).map(|i| vec![Label::Int(i)]).collect(),
        }
    }

    /// Single-level index.
    pub fn from_labels(name: Option<String>, labels: Vec<Label>) -> Self {
        Self {
            names: vec![name],
            keys: labels.into_iter().map(|l| vec![l]).collect(),
        }
    }

    /// Multi-level index from row-major keys. Every key must have one label
    /// per name.
    pub fn from_keys(names: Vec<Option<String>>, keys: Vec<Vec<Label>>) -> FrameResult<Self> {
        if let Some(bad) = keys.iter().find(|k| k.len() != names.len()) {
            return Err(FrameError::LengthMismatch {
                what: "index key".to_string(),
                expected: names.len(),
                found: bad.len(),
            });
        }
        Ok(Self { names, keys })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of levels.
    pub fn nlevels(&self) -> usize {
        self.names.len()
    }

    /// Level names.
    pub fn names(&self) -> &[Option<String>] {
        &self.names
    }

    /// Rename levels.
    pub fn set_names(&mut self, names: Vec<Option<String>>) -> FrameResult<()> {
        if names.len() != self.nlevels() {
            return Err(FrameError::LengthMismatch {
                what: "index names".to_string(),
                expected: self.nlevels(),
                found: names.len(),
            });
        }
        self.names = names;
        Ok(())
    }

    /// All keys.
    pub fn keys(&self) -> &[Vec<Label>] {
        &self.keys
    }

    /// Key at position `i`.
    pub fn key(&self, i: usize) -> Option<&[Label]> {
        self.keys.get(i).map(Vec::as_slice)
    }

    /// Labels of one level.
    pub fn level(&self, level: usize) -> FrameResult<Vec<Label>> {
        self.check_level(level)?;
        Ok(self.keys.iter().map(|k| k[level].clone()).collect())
    }

    fn check_level(&self, level: usize) -> FrameResult<()> {
        if level >= self.nlevels() {
            return Err(FrameError::LevelOutOfRange {
                level,
                nlevels: self.nlevels(),
            });
        }
        Ok(())
    }

    /// Whether this is exactly the default range index.
    pub fn is_range(&self) -> bool {
        self.nlevels() == 1
            && self.names[0].is_none()
            && self
                .keys
                .iter()
                .enumerate()
                .all(|(i, k)| matches!(k[0], Label::Int(v) if v == i as i64))
    }

    /// Whether every key is distinct.
    pub fn is_unique(&self) -> bool {
        let mut seen = std::collections::HashSet::with_capacity(self.len());
        self.keys.iter().all(|k| seen.insert(k))
    }

    /// Gather entries by position.
    pub fn take(&self, positions: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            keys: positions
                .iter()
                .filter_map(|&p| self.keys.get(p).cloned())
                .collect(),
        }
    }

    /// Add a level after the existing ones.
    pub fn append_level(&self, name: Option<String>, labels: Vec<Label>) -> FrameResult<Self> {
        if labels.len() != self.len() {
            return Err(FrameError::LengthMismatch {
                what: "index level".to_string(),
                expected: self.len(),
                found: labels.len(),
            });
        }
        let mut names = self.names.clone();
        names.push(name);
        let keys = self
            .keys
            .iter()
            .zip(labels)
            .map(|(k, l)| {
                let mut k = k.clone();
                k.push(l);
                k
            })
            .collect();
        Ok(Self { names, keys })
    }

    /// Remove one level. The last remaining level can not be dropped.
    pub fn drop_level(&self, level: usize) -> FrameResult<Self> {
        self.check_level(level)?;
        if self.nlevels() == 1 {
            return Err(FrameError::LevelOutOfRange {
                level,
                nlevels: 1,
            });
        }
        let mut names = self.names.clone();
        names.remove(level);
        let keys = self
            .keys
            .iter()
            .map(|k| {
                let mut k = k.clone();
                k.remove(level);
                k
            })
            .collect();
        Ok(Self { names, keys })
    }

    /// Stack indexes end to end. Level names survive only where every
    /// input agrees.
    pub fn concat(parts: &[&Index]) -> FrameResult<Self> {
        let Some(first) = parts.first() else {
            return Ok(Index::range(0));
        };
        let nlevels = first.nlevels();
        if let Some(bad) = parts.iter().find(|p| p.nlevels() != nlevels) {
            return Err(FrameError::LevelOutOfRange {
                level: nlevels.saturating_sub(1),
                nlevels: bad.nlevels(),
            });
        }
        let names = (0..nlevels)
            .map(|l| {
                let name = &first.names[l];
                parts
                    .iter()
                    .all(|p| &p.names[l] == name)
                    .then(|| name.clone())
                    .flatten()
            })
            .collect();
        let keys = parts.iter().flat_map(|p| p.keys.iter().cloned()).collect();
        Ok(Self { names, keys })
    }

    /// Positions of every key, for alignment. Requires unique keys.
    pub fn positions(&self, operation: &'static str) -> FrameResult<HashMap<&[Label], usize>> {
        let mut map = HashMap::with_capacity(self.len());
        for (i, k) in self.keys.iter().enumerate() {
            if map.insert(k.as_slice(), i).is_some() {
                return Err(FrameError::DuplicateLabels { operation });
            }
        }
        Ok(map)
    }

    /// Column names used when the index is turned into columns.
    pub fn column_names(&self) -> Vec<String> {
        let single = self.nlevels() == 1;
        self.names
            .iter()
            .enumerate()
            .map(|(i, n)| match n {
                Some(n) => n.clone(),
                None if single => "index".to_string(),
                None => format!("level_{i}"),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_index_is_detected() {
        assert!(Index::range(3).is_range());
        let shifted = Index::range(3).take(&[1, 2]);
        assert!(!shifted.is_range());
    }

    #[test]
    fn appending_and_dropping_levels() -> FrameResult<()> {
        let idx = Index::range(2).append_level(None, vec![Label::Int(0), Label::Int(1)])?;
        assert_eq!(idx.nlevels(), 2);
        assert_eq!(idx.key(1), Some(&[Label::Int(1), Label::Int(1)][..]));
        assert_eq!(idx.column_names(), vec!["level_0", "level_1"]);
        let back = idx.drop_level(1)?;
        assert_eq!(back, Index::range(2));
        assert!(back.drop_level(0).is_err());
        Ok(())
    }

    #[test]
    fn duplicate_keys_are_rejected_for_alignment() {
        let idx = Index::from_labels(None, vec![Label::Int(0), Label::Int(0)]);
        assert!(!idx.is_unique());
        assert!(matches!(
            idx.positions("align"),
            Err(FrameError::DuplicateLabels { .. })
        ));
    }
}

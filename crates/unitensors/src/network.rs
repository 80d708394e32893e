//! Contraction scheduling over named tensor slots.
//!
//! A [`Network`] is built once from a label script, caches a pairwise
//! contraction plan, and then binds concrete tensors to its slots for any
//! number of launches. The default value is the uninitialized state;
//! every operation on it errors rather than misbehaving.

use log::debug;

use crate::contract::contract;
use crate::error::{Result, UniTensorError};
use crate::scalar::Scalar;
use crate::unitensor::UniTensor;

/// One line of a label script: a slot name and the labels its tensor's
/// bonds will carry, in bond order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRecord {
    pub name: String,
    pub labels: Vec<i64>,
}

impl NetworkRecord {
    pub fn new(name: impl Into<String>, labels: Vec<i64>) -> Self {
        Self {
            name: name.into(),
            labels,
        }
    }
}

#[derive(Debug, Clone)]
struct NetworkState<ElT: Scalar> {
    records: Vec<NetworkRecord>,
    out_labels: Vec<i64>,
    /// Pairs of working-list positions; each step contracts the pair,
    /// stores the result at the lower position and removes the higher.
    plan: Vec<(usize, usize)>,
    slots: Vec<Option<UniTensor<ElT>>>,
}

/// Scheduler executing a fixed contraction script over bound tensors.
///
/// # Examples
///
/// ```
/// use unitensors::{Bond, Network, NetworkRecord, UniTensor};
///
/// let net: Network<f64> = Network::from_records(
///     vec![
///         NetworkRecord::new("A", vec![0, 1]),
///         NetworkRecord::new("B", vec![1, 2]),
///     ],
///     vec![0, 2],
/// ).unwrap();
/// assert!(net.is_initialized());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Network<ElT: Scalar> {
    state: Option<NetworkState<ElT>>,
}

impl<ElT: Scalar> Network<ElT> {
    /// Build a network from a label script and cache its contraction
    /// plan.
    ///
    /// Labels appearing in exactly two records are contracted away;
    /// labels appearing once are external and, when `out_labels` is
    /// nonempty, must cover it exactly.
    pub fn from_records(
        records: Vec<NetworkRecord>,
        out_labels: Vec<i64>,
    ) -> Result<Self> {
        if records.is_empty() {
            return Err(UniTensorError::InvalidScript {
                reason: "no records given".into(),
            });
        }
        for (i, r) in records.iter().enumerate() {
            if records[..i].iter().any(|p| p.name == r.name) {
                return Err(UniTensorError::InvalidScript {
                    reason: format!("duplicated slot name {}", r.name),
                });
            }
            let mut sorted = r.labels.clone();
            sorted.sort_unstable();
            if sorted.windows(2).any(|w| w[0] == w[1]) {
                return Err(UniTensorError::InvalidScript {
                    reason: format!("slot {} repeats a label", r.name),
                });
            }
        }

        let mut counts: Vec<(i64, usize)> = Vec::new();
        for r in &records {
            for &l in &r.labels {
                match counts.iter_mut().find(|(x, _)| *x == l) {
                    Some((_, c)) => *c += 1,
                    None => counts.push((l, 1)),
                }
            }
        }
        if let Some((l, c)) = counts.iter().find(|(_, c)| *c > 2) {
            return Err(UniTensorError::InvalidScript {
                reason: format!("label {l} appears {c} times, at most 2 allowed"),
            });
        }
        let mut external: Vec<i64> = counts
            .iter()
            .filter(|(_, c)| *c == 1)
            .map(|(l, _)| *l)
            .collect();
        if !out_labels.is_empty() {
            let mut wanted = out_labels.clone();
            wanted.sort_unstable();
            external.sort_unstable();
            if wanted != external {
                return Err(UniTensorError::InvalidScript {
                    reason: format!(
                        "out labels {out_labels:?} do not match the external labels"
                    ),
                });
            }
        }

        let plan = build_plan(&records);
        debug!("network plan over {} slots: {:?}", records.len(), plan);
        let nslots = records.len();
        Ok(Self {
            state: Some(NetworkState {
                records,
                out_labels,
                plan,
                slots: vec![None; nslots],
            }),
        })
    }

    /// Whether a script has been loaded.
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Slot names in script order.
    pub fn names(&self) -> Result<Vec<&str>> {
        let state = self.state()?;
        Ok(state.records.iter().map(|r| r.name.as_str()).collect())
    }

    /// Bind `tensor` to the named slot, taking ownership.
    pub fn put_tensor(&mut self, slot: &str, tensor: UniTensor<ElT>) -> Result<()> {
        let idx = self.slot_index(slot)?;
        self.put_tensor_at(idx, tensor)
    }

    /// Bind a deep copy, leaving the caller's tensor untouched by any
    /// launch-internal relabeling.
    pub fn put_tensor_clone(&mut self, slot: &str, tensor: &UniTensor<ElT>) -> Result<()> {
        self.put_tensor(slot, tensor.clone())
    }

    /// Bind by slot position instead of name.
    pub fn put_tensor_at(&mut self, idx: usize, tensor: UniTensor<ElT>) -> Result<()> {
        let state = self.state_mut("put_tensor")?;
        let record = state.records.get(idx).ok_or(UniTensorError::UnknownSlot {
            slot: idx.to_string(),
        })?;
        if tensor.rank() != record.labels.len() {
            return Err(UniTensorError::SlotRankMismatch {
                slot: record.name.clone(),
                expected: record.labels.len(),
                actual: tensor.rank(),
            });
        }
        state.slots[idx] = Some(tensor);
        Ok(())
    }

    /// Run the cached plan over the bound tensors.
    ///
    /// The bindings are not consumed; repeated launches with the same
    /// bindings give identical results. The result is permuted to the
    /// script's output label order when one was declared.
    pub fn launch(&self) -> Result<UniTensor<ElT>> {
        let state = self.state_op("launch")?;
        let mut working: Vec<UniTensor<ElT>> = Vec::with_capacity(state.records.len());
        for (record, slot) in state.records.iter().zip(state.slots.iter()) {
            let tensor = slot.as_ref().ok_or(UniTensorError::UnboundSlot {
                slot: record.name.clone(),
            })?;
            let mut t = tensor.clone();
            t.set_labels(record.labels.clone())?;
            working.push(t);
        }

        for &(i, j) in &state.plan {
            debug!("launch step: contract working[{i}] with working[{j}]");
            let tb = working.remove(j);
            let ta = working.remove(i);
            let r = contract(&ta, &tb)?;
            working.insert(i, r);
        }
        let mut result = working.pop().ok_or(UniTensorError::InvalidScript {
            reason: "empty plan produced no result".into(),
        })?;

        if !state.out_labels.is_empty() {
            let mapper = state
                .out_labels
                .iter()
                .map(|&l| {
                    result
                        .label_index(l)
                        .ok_or(UniTensorError::LabelNotFound { label: l })
                })
                .collect::<Result<Vec<usize>>>()?;
            result = result.permute(&mapper, None)?;
            result.contiguous_();
        }
        Ok(result)
    }

    /// Unbind every slot, keeping the plan.
    pub fn clear(&mut self) -> Result<()> {
        let state = self.state_mut("clear")?;
        for slot in &mut state.slots {
            *slot = None;
        }
        Ok(())
    }

    /// Duplicate the script and plan with all slots empty.
    pub fn clone_plan(&self) -> Result<Self> {
        let state = self.state_op("clone")?;
        Ok(Self {
            state: Some(NetworkState {
                records: state.records.clone(),
                out_labels: state.out_labels.clone(),
                plan: state.plan.clone(),
                slots: vec![None; state.records.len()],
            }),
        })
    }

    fn slot_index(&self, slot: &str) -> Result<usize> {
        let state = self.state_op("put_tensor")?;
        state
            .records
            .iter()
            .position(|r| r.name == slot)
            .ok_or(UniTensorError::UnknownSlot {
                slot: slot.to_string(),
            })
    }

    fn state(&self) -> Result<&NetworkState<ElT>> {
        self.state_op("access")
    }

    fn state_op(&self, op: &'static str) -> Result<&NetworkState<ElT>> {
        self.state
            .as_ref()
            .ok_or(UniTensorError::UninitializedNetwork { op })
    }

    fn state_mut(&mut self, op: &'static str) -> Result<&mut NetworkState<ElT>> {
        self.state
            .as_mut()
            .ok_or(UniTensorError::UninitializedNetwork { op })
    }
}

/// Greedy pairwise reduction: repeatedly contract the first pair of
/// working entries sharing a label, falling back to an outer product of
/// the first two when nothing is shared.
fn build_plan(records: &[NetworkRecord]) -> Vec<(usize, usize)> {
    let mut working: Vec<Vec<i64>> = records.iter().map(|r| r.labels.clone()).collect();
    let mut plan = Vec::new();
    while working.len() > 1 {
        let mut pick = None;
        'outer: for i in 0..working.len() {
            for j in (i + 1)..working.len() {
                if working[i].iter().any(|l| working[j].contains(l)) {
                    pick = Some((i, j));
                    break 'outer;
                }
            }
        }
        let (i, j) = pick.unwrap_or((0, 1));
        let lj = working.remove(j);
        let li = working.remove(i);
        let mut merged: Vec<i64> = li.iter().filter(|l| !lj.contains(l)).copied().collect();
        merged.extend(lj.iter().filter(|l| !li.contains(l)));
        working.insert(i, merged);
        plan.push((i, j));
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bond::Bond;

    fn abc_script() -> Vec<NetworkRecord> {
        vec![
            NetworkRecord::new("A", vec![0, 1]),
            NetworkRecord::new("B", vec![1, 2]),
            NetworkRecord::new("C", vec![2, 3]),
        ]
    }

    #[test]
    fn test_from_records_validates() {
        assert!(matches!(
            Network::<f64>::from_records(Vec::new(), Vec::new()),
            Err(UniTensorError::InvalidScript { .. })
        ));
        let dup = vec![
            NetworkRecord::new("A", vec![0, 1]),
            NetworkRecord::new("A", vec![1, 2]),
        ];
        assert!(matches!(
            Network::<f64>::from_records(dup, Vec::new()),
            Err(UniTensorError::InvalidScript { .. })
        ));
        let triple = vec![
            NetworkRecord::new("A", vec![0, 1]),
            NetworkRecord::new("B", vec![1, 2]),
            NetworkRecord::new("C", vec![1, 3]),
        ];
        assert!(matches!(
            Network::<f64>::from_records(triple, Vec::new()),
            Err(UniTensorError::InvalidScript { .. })
        ));
    }

    #[test]
    fn test_out_labels_must_cover_external() {
        assert!(Network::<f64>::from_records(abc_script(), vec![0, 3]).is_ok());
        assert!(matches!(
            Network::<f64>::from_records(abc_script(), vec![0, 2]),
            Err(UniTensorError::InvalidScript { .. })
        ));
    }

    #[test]
    fn test_uninitialized_errors() {
        let mut net: Network<f64> = Network::default();
        assert!(!net.is_initialized());
        let t = UniTensor::from_bonds(vec![Bond::new(2)], 1).unwrap();
        assert!(matches!(
            net.put_tensor("A", t),
            Err(UniTensorError::UninitializedNetwork { .. })
        ));
        assert!(matches!(
            net.launch(),
            Err(UniTensorError::UninitializedNetwork { .. })
        ));
        assert!(matches!(
            net.clear(),
            Err(UniTensorError::UninitializedNetwork { .. })
        ));
        assert!(matches!(
            net.clone_plan(),
            Err(UniTensorError::UninitializedNetwork { .. })
        ));
    }

    #[test]
    fn test_unknown_slot_and_rank_mismatch() {
        let mut net: Network<f64> = Network::from_records(abc_script(), vec![0, 3]).unwrap();
        let t = UniTensor::from_bonds(vec![Bond::new(2), Bond::new(2)], 1).unwrap();
        assert!(matches!(
            net.put_tensor("Z", t.clone()),
            Err(UniTensorError::UnknownSlot { .. })
        ));
        let wrong = UniTensor::<f64>::from_bonds(vec![Bond::new(2)], 1).unwrap();
        assert!(matches!(
            net.put_tensor("A", wrong),
            Err(UniTensorError::SlotRankMismatch { .. })
        ));
        assert!(net.put_tensor("A", t).is_ok());
    }

    #[test]
    fn test_launch_requires_all_slots() {
        let mut net: Network<f64> = Network::from_records(abc_script(), vec![0, 3]).unwrap();
        let t = UniTensor::from_bonds(vec![Bond::new(2), Bond::new(2)], 1).unwrap();
        net.put_tensor("A", t.clone()).unwrap();
        net.put_tensor("B", t.clone()).unwrap();
        assert!(matches!(
            net.launch(),
            Err(UniTensorError::UnboundSlot { .. })
        ));
    }

    #[test]
    fn test_plan_shape() {
        let plan = build_plan(&abc_script());
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0], (0, 1));
    }

    #[test]
    fn test_plan_outer_product_fallback() {
        let records = vec![
            NetworkRecord::new("A", vec![0]),
            NetworkRecord::new("B", vec![1]),
        ];
        let plan = build_plan(&records);
        assert_eq!(plan, vec![(0, 1)]);
    }

    #[test]
    fn test_clone_plan_has_empty_slots() {
        let mut net: Network<f64> = Network::from_records(abc_script(), vec![0, 3]).unwrap();
        let t = UniTensor::from_bonds(vec![Bond::new(2), Bond::new(2)], 1).unwrap();
        net.put_tensor("A", t).unwrap();
        let copy = net.clone_plan().unwrap();
        assert!(copy.is_initialized());
        assert!(matches!(
            copy.launch(),
            Err(UniTensorError::UnboundSlot { .. })
        ));
    }

    #[test]
    fn test_names() {
        let net: Network<f64> = Network::from_records(abc_script(), vec![0, 3]).unwrap();
        assert_eq!(net.names().unwrap(), vec!["A", "B", "C"]);
    }
}

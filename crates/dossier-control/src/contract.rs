//! Static section contracts.
//!
//! A contract describes one section's place in the processing order:
//! its predecessors, the evidence tags it wants, and its rerun budget.
//! Contracts are loaded once (from TOML or the builtin set) and are
//! immutable at runtime.

use dossier_types::SectionId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

fn default_max_reruns() -> u32 {
    2
}

/// Static configuration for one section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionContract {
    /// Section this contract configures.
    pub section_id: SectionId,
    /// Human-readable title used in the assembled document.
    pub title: String,
    /// Sections that must be `approved` before this one may run.
    #[serde(default)]
    pub predecessors: Vec<SectionId>,
    /// Evidence tags this section asks the locker to filter by.
    /// Empty means "everything assigned to the section".
    #[serde(default)]
    pub required_evidence_tags: Vec<String>,
    /// Revision rounds allowed before the controller forces a halt.
    #[serde(default = "default_max_reruns")]
    pub max_reruns: u32,
}

/// Validated, immutable set of section contracts.
///
/// Construction rejects duplicate ids, unknown predecessors, and
/// dependency cycles, so the controller can trust the graph at runtime.
#[derive(Debug, Clone)]
pub struct ContractSet {
    contracts: BTreeMap<SectionId, SectionContract>,
}

impl ContractSet {
    /// Builds a set from a contract list.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found: a duplicate
    /// section id, a predecessor that no contract defines, or a cycle in
    /// the dependency graph.
    pub fn new(contracts: Vec<SectionContract>) -> Result<Self, String> {
        let mut map = BTreeMap::new();
        for contract in contracts {
            let id = contract.section_id.clone();
            if map.insert(id.clone(), contract).is_some() {
                return Err(format!("duplicate section contract: {id}"));
            }
        }

        for contract in map.values() {
            for pred in &contract.predecessors {
                if !map.contains_key(pred) {
                    return Err(format!(
                        "section {} declares unknown predecessor {}",
                        contract.section_id, pred
                    ));
                }
            }
        }

        let set = Self { contracts: map };
        set.check_acyclic()?;
        Ok(set)
    }

    /// The builtin contract set for the standard report layout.
    ///
    /// ```text
    /// section_1 (intake)
    ///   ├── section_2 (subject research)  ── section_3 (surveillance log)
    ///   │                                        ├── section_6 (billing)
    ///   ├── section_4 (correspondence) ──────────┤
    ///   ├── section_5 (interviews) ──────────────┼── section_7 (conclusions)
    ///   └── section_8 (photo & media exhibits) ──┘
    /// ```
    #[must_use]
    pub fn standard() -> Self {
        fn section(id: &str) -> SectionId {
            SectionId::new(id).expect("builtin section ids are non-empty")
        }
        fn contract(id: &str, title: &str, predecessors: &[&str]) -> SectionContract {
            SectionContract {
                section_id: section(id),
                title: title.to_string(),
                predecessors: predecessors.iter().map(|p| section(p)).collect(),
                required_evidence_tags: Vec::new(),
                max_reruns: default_max_reruns(),
            }
        }

        Self::new(vec![
            contract("section_1", "Case Intake & Objectives", &[]),
            contract("section_2", "Subject Research", &["section_1"]),
            contract("section_3", "Surveillance Log", &["section_2"]),
            contract("section_4", "Correspondence", &["section_1"]),
            contract("section_5", "Interviews & Statements", &["section_1"]),
            contract("section_6", "Billing & Expenses", &["section_3"]),
            contract(
                "section_7",
                "Conclusions",
                &["section_3", "section_4", "section_5", "section_6"],
            ),
            contract("section_8", "Photo & Media Exhibits", &["section_1"]),
        ])
        .expect("builtin contract set is valid")
    }

    /// Looks up one contract.
    #[must_use]
    pub fn get(&self, id: &SectionId) -> Option<&SectionContract> {
        self.contracts.get(id)
    }

    /// Iterates contracts in section-id order.
    pub fn iter(&self) -> impl Iterator<Item = &SectionContract> {
        self.contracts.values()
    }

    /// Number of contracts in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Returns `true` if the set holds no contracts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Depth-first cycle check over the predecessor graph.
    fn check_acyclic(&self) -> Result<(), String> {
        let mut finished: HashSet<SectionId> = HashSet::new();
        let mut in_stack: HashSet<SectionId> = HashSet::new();

        fn visit(
            id: &SectionId,
            contracts: &BTreeMap<SectionId, SectionContract>,
            finished: &mut HashSet<SectionId>,
            in_stack: &mut HashSet<SectionId>,
        ) -> Result<(), String> {
            if finished.contains(id) {
                return Ok(());
            }
            if !in_stack.insert(id.clone()) {
                return Err(format!("dependency cycle involving {id}"));
            }
            if let Some(contract) = contracts.get(id) {
                for pred in &contract.predecessors {
                    visit(pred, contracts, finished, in_stack)?;
                }
            }
            in_stack.remove(id);
            finished.insert(id.clone());
            Ok(())
        }

        for id in self.contracts.keys() {
            visit(id, &self.contracts, &mut finished, &mut in_stack)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str) -> SectionId {
        SectionId::new(id).unwrap()
    }

    fn contract(id: &str, predecessors: &[&str]) -> SectionContract {
        SectionContract {
            section_id: section(id),
            title: id.to_string(),
            predecessors: predecessors.iter().map(|p| section(p)).collect(),
            required_evidence_tags: vec![],
            max_reruns: 2,
        }
    }

    #[test]
    fn standard_set_is_valid() {
        let set = ContractSet::standard();
        assert_eq!(set.len(), 8);
        assert!(set.get(&section("section_7")).is_some());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let result = ContractSet::new(vec![contract("a", &[]), contract("a", &[])]);
        assert!(result.unwrap_err().contains("duplicate"));
    }

    #[test]
    fn unknown_predecessor_rejected() {
        let result = ContractSet::new(vec![contract("a", &["ghost"])]);
        assert!(result.unwrap_err().contains("unknown predecessor"));
    }

    #[test]
    fn cycle_rejected() {
        let result = ContractSet::new(vec![
            contract("a", &["b"]),
            contract("b", &["c"]),
            contract("c", &["a"]),
        ]);
        assert!(result.unwrap_err().contains("cycle"));
    }

    #[test]
    fn self_cycle_rejected() {
        let result = ContractSet::new(vec![contract("a", &["a"])]);
        assert!(result.unwrap_err().contains("cycle"));
    }

    #[test]
    fn max_reruns_defaults_from_toml() {
        let parsed: SectionContract = toml_like_json(
            r#"{"section_id": "section_1", "title": "Intake"}"#,
        );
        assert_eq!(parsed.max_reruns, 2);
        assert!(parsed.predecessors.is_empty());
    }

    fn toml_like_json(json: &str) -> SectionContract {
        serde_json::from_str(json).unwrap()
    }
}

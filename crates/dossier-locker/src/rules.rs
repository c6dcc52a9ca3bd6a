//! Classification rule table.
//!
//! Rules are applied in a fixed order so classification is deterministic
//! given the same input and table:
//!
//! 1. file-extension → section/type table
//! 2. filename/content keyword heuristics
//! 3. confidence scoring combining the strengths of everything that matched
//!
//! When both rule kinds match, keywords win the section assignment (they
//! are more specific than an extension) and the extension contributes the
//! evidence type plus a related-section entry.

use dossier_types::SectionId;
use serde::{Deserialize, Serialize};

use crate::evidence::{Classification, ClassificationMethod, EvidenceType};

/// Maps file extensions to a section and evidence type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionRule {
    /// Extensions this rule covers, lowercase, without the dot.
    pub extensions: Vec<String>,
    /// Section assigned on match.
    pub section: SectionId,
    /// Evidence type assigned on match.
    pub evidence_type: EvidenceType,
    /// Tags contributed on match.
    pub tags: Vec<String>,
    /// Rule strength in `0.0..=1.0`.
    pub strength: f64,
}

/// Maps filename/content keywords to a section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Keywords this rule matches, lowercase.
    pub keywords: Vec<String>,
    /// Section assigned (or related) on match.
    pub section: SectionId,
    /// Tags contributed on match.
    pub tags: Vec<String>,
    /// Rule strength in `0.0..=1.0`.
    pub strength: f64,
}

/// Ordered classification rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTable {
    extension_rules: Vec<ExtensionRule>,
    keyword_rules: Vec<KeywordRule>,
}

impl RuleTable {
    /// Creates a table from explicit rule lists.
    #[must_use]
    pub fn new(extension_rules: Vec<ExtensionRule>, keyword_rules: Vec<KeywordRule>) -> Self {
        Self {
            extension_rules,
            keyword_rules,
        }
    }

    /// The built-in rule table covering the standard report sections.
    ///
    /// | Input | Section |
    /// |-------|---------|
    /// | jpg, png, heic, ... | `section_8` (photo exhibits) |
    /// | mp4, mp3, wav, ... | `section_8` (media exhibits) |
    /// | pdf, doc, docx | `section_3` (records) |
    /// | xls, xlsx, csv | `section_6` (billing) |
    /// | eml, msg | `section_4` (correspondence) |
    /// | txt, md | `section_5` (notes/statements) |
    /// | "invoice", "receipt", "mileage" | `section_6` |
    /// | "interview", "statement", "witness" | `section_5` |
    /// | "surveillance", "field_log" | `section_3` |
    /// | "contract", "intake", "retainer" | `section_1` |
    /// | "registration", "license" | `section_2` |
    #[must_use]
    pub fn builtin() -> Self {
        fn section(id: &str) -> SectionId {
            SectionId::new(id).expect("builtin section ids are non-empty")
        }
        fn strs(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| (*s).to_string()).collect()
        }

        let extension_rules = vec![
            ExtensionRule {
                extensions: strs(&["jpg", "jpeg", "png", "gif", "heic", "bmp", "tiff"]),
                section: section("section_8"),
                evidence_type: EvidenceType::Photo,
                tags: strs(&["photo"]),
                strength: 0.8,
            },
            ExtensionRule {
                extensions: strs(&["mp4", "mov", "avi", "mp3", "wav", "m4a"]),
                section: section("section_8"),
                evidence_type: EvidenceType::Recording,
                tags: strs(&["media"]),
                strength: 0.8,
            },
            ExtensionRule {
                extensions: strs(&["pdf", "doc", "docx"]),
                section: section("section_3"),
                evidence_type: EvidenceType::Document,
                tags: strs(&["document"]),
                strength: 0.5,
            },
            ExtensionRule {
                extensions: strs(&["xls", "xlsx", "csv"]),
                section: section("section_6"),
                evidence_type: EvidenceType::Spreadsheet,
                tags: strs(&["tabular"]),
                strength: 0.6,
            },
            ExtensionRule {
                extensions: strs(&["eml", "msg"]),
                section: section("section_4"),
                evidence_type: EvidenceType::Correspondence,
                tags: strs(&["correspondence"]),
                strength: 0.8,
            },
            ExtensionRule {
                extensions: strs(&["txt", "md"]),
                section: section("section_5"),
                evidence_type: EvidenceType::Note,
                tags: strs(&["note"]),
                strength: 0.4,
            },
        ];

        let keyword_rules = vec![
            KeywordRule {
                keywords: strs(&["invoice", "billing", "receipt", "mileage"]),
                section: section("section_6"),
                tags: strs(&["billing"]),
                strength: 0.8,
            },
            KeywordRule {
                keywords: strs(&["interview", "statement", "witness"]),
                section: section("section_5"),
                tags: strs(&["testimony"]),
                strength: 0.7,
            },
            KeywordRule {
                keywords: strs(&["surveillance", "field_log", "stakeout"]),
                section: section("section_3"),
                tags: strs(&["surveillance"]),
                strength: 0.7,
            },
            KeywordRule {
                keywords: strs(&["contract", "intake", "retainer", "agreement"]),
                section: section("section_1"),
                tags: strs(&["intake"]),
                strength: 0.7,
            },
            KeywordRule {
                keywords: strs(&["registration", "license", "plate"]),
                section: section("section_2"),
                tags: strs(&["records"]),
                strength: 0.5,
            },
            KeywordRule {
                keywords: strs(&["exhibit"]),
                section: section("section_8"),
                tags: strs(&["exhibit"]),
                strength: 0.6,
            },
        ];

        Self::new(extension_rules, keyword_rules)
    }

    /// Classifies a file by name and optional content sample.
    ///
    /// Returns `None` when no rule matches; the caller turns that into a
    /// manual-review flag.
    #[must_use]
    pub fn classify(&self, file_name: &str, content_sample: Option<&str>) -> Option<Classification> {
        let lower_name = file_name.to_lowercase();
        let extension = lower_name.rsplit_once('.').map(|(_, ext)| ext.to_string());

        let ext_hit = extension.as_deref().and_then(|ext| {
            self.extension_rules
                .iter()
                .find(|rule| rule.extensions.iter().any(|e| e == ext))
        });

        let mut haystack = lower_name.clone();
        if let Some(sample) = content_sample {
            haystack.push('\n');
            haystack.push_str(&sample.to_lowercase());
        }

        let keyword_hits: Vec<&KeywordRule> = self
            .keyword_rules
            .iter()
            .filter(|rule| rule.keywords.iter().any(|kw| haystack.contains(kw.as_str())))
            .collect();

        match (ext_hit, keyword_hits.split_first()) {
            (Some(ext), Some((first_kw, rest_kw))) => {
                let mut related = Vec::new();
                if ext.section != first_kw.section {
                    related.push(ext.section.clone());
                }
                let mut tags = ext.tags.clone();
                let mut confidence = combine(ext.strength, first_kw.strength);
                push_tags(&mut tags, &first_kw.tags);
                for kw in rest_kw {
                    if kw.section != first_kw.section && !related.contains(&kw.section) {
                        related.push(kw.section.clone());
                    }
                    push_tags(&mut tags, &kw.tags);
                    confidence = combine(confidence, kw.strength);
                }
                Some(Classification {
                    assigned_section: first_kw.section.clone(),
                    related_sections: related,
                    evidence_type: ext.evidence_type,
                    tags,
                    confidence,
                    method: ClassificationMethod::Combined,
                })
            }
            (Some(ext), None) => Some(Classification {
                assigned_section: ext.section.clone(),
                related_sections: Vec::new(),
                evidence_type: ext.evidence_type,
                tags: ext.tags.clone(),
                confidence: ext.strength,
                method: ClassificationMethod::Extension,
            }),
            (None, Some((first_kw, rest_kw))) => {
                let mut related = Vec::new();
                let mut tags = first_kw.tags.clone();
                let mut confidence = first_kw.strength;
                for kw in rest_kw {
                    if kw.section != first_kw.section && !related.contains(&kw.section) {
                        related.push(kw.section.clone());
                    }
                    push_tags(&mut tags, &kw.tags);
                    confidence = combine(confidence, kw.strength);
                }
                Some(Classification {
                    assigned_section: first_kw.section.clone(),
                    related_sections: related,
                    evidence_type: EvidenceType::Other,
                    tags,
                    confidence,
                    method: ClassificationMethod::Keyword,
                })
            }
            (None, None) => None,
        }
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Combines two independent rule strengths into one confidence.
fn combine(a: f64, b: f64) -> f64 {
    (1.0 - (1.0 - a) * (1.0 - b)).clamp(0.0, 1.0)
}

fn push_tags(tags: &mut Vec<String>, extra: &[String]) {
    for tag in extra {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }
}

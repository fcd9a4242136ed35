//! Action taxonomy: leaf buckets of edit-summary action codes plus named
//! composite buckets built as unions of leaves.
//!
//! Only leaf buckets are classification targets. Composite buckets
//! (`allclaims`, `terms`, `allsitelinks`) exist for broader filtering.
//! Each action code is expected to appear in at most one leaf bucket; this is
//! a precondition on the taxonomy data and is not checked. When it is
//! violated, the bucket declared first wins.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::{WdpdError, WdpdResult};
use crate::models::BroadCategory;

pub const ALL_CLAIMS: &str = "allclaims";
pub const TERMS: &str = "terms";
pub const ALL_SITELINKS: &str = "allsitelinks";

/// Composite buckets the reporting layer depends on.
const REQUIRED_COMPOSITES: &[&str] = &[ALL_CLAIMS, TERMS, ALL_SITELINKS];

/// Built-in Wikidata taxonomy, in tie-break order.
const WIKIDATA_LEAVES: &[(BroadCategory, &[&str])] = &[
    (
        BroadCategory::Claim,
        &[
            "wbsetclaim",
            "wbsetclaim-create",
            "wbsetclaim-update",
            "wbsetclaimvalue",
            "wbcreateclaim-create",
            "wbcreateclaim-novalue",
            "wbcreateclaim-somevalue",
            "wbremoveclaims",
            "wbremoveclaims-remove",
            "wbsetclaim-update-rank",
            "wbsetstatementrank",
            "wbsetstatementrank-deprecated",
            "wbsetstatementrank-normal",
            "wbsetstatementrank-preferred",
        ],
    ),
    (
        BroadCategory::Qualifier,
        &[
            "wbsetqualifier",
            "wbsetqualifier-add",
            "wbsetqualifier-update",
            "wbsetclaim-update-qualifiers",
            "wbremovequalifiers",
        ],
    ),
    (
        BroadCategory::Reference,
        &[
            "wbsetreference",
            "wbsetreference-add",
            "wbsetclaim-update-references",
            "wbremovereferences",
            "wbremovereferences-remove",
        ],
    ),
    (
        BroadCategory::Sitelink,
        &["wbsetsitelink-add", "wbsetsitelink-remove", "wbsetsitelink-set"],
    ),
    (
        BroadCategory::SitelinkMove,
        &["clientsitelink-update", "clientsitelink-remove"],
    ),
    (
        BroadCategory::Label,
        &["wbsetlabel-add", "wbsetlabel-remove", "wbsetlabel-set"],
    ),
    (
        BroadCategory::Description,
        &[
            "wbsetdescription-add",
            "wbsetdescription-remove",
            "wbsetdescription-set",
        ],
    ),
    (
        BroadCategory::Alias,
        &[
            "wbsetaliases-add",
            "wbsetaliases-remove",
            "wbsetaliases-set",
            "wbsetaliases-update",
        ],
    ),
    (BroadCategory::AnyTerms, &["wbsetlabeldescriptionaliases"]),
    (
        BroadCategory::LinkTitles,
        &["wblinktitles-create", "wblinktitles-connect"],
    ),
    (
        BroadCategory::EditEntity,
        &[
            "wbeditentity-create",
            "wbeditentity-create-item",
            "wbeditentity-override",
            "wbeditentity-update",
            "wbeditentity-update-languages",
            "wbeditentity-update-languages-short",
            "wbeditentity-update-languages-and-other-short",
        ],
    ),
    (
        BroadCategory::Merge,
        &["wbmergeitems-to", "wbmergeitems-from", "wbcreateredirect"],
    ),
    (BroadCategory::Revert, &["undo", "restore"]),
    (BroadCategory::NoneAction, &["None"]),
];

const WIKIDATA_COMPOSITES: &[(&str, &[BroadCategory])] = &[
    (
        ALL_CLAIMS,
        &[
            BroadCategory::Claim,
            BroadCategory::Qualifier,
            BroadCategory::Reference,
        ],
    ),
    (
        TERMS,
        &[
            BroadCategory::Label,
            BroadCategory::Description,
            BroadCategory::Alias,
            BroadCategory::AnyTerms,
        ],
    ),
    (
        ALL_SITELINKS,
        &[BroadCategory::Sitelink, BroadCategory::SitelinkMove],
    ),
];

/// On-disk TOML layout:
///
/// ```toml
/// [leaves]
/// claim = ["wbsetclaim", "wbsetclaim-create"]
/// qualifier = ["wbsetqualifier"]
///
/// [composites]
/// allclaims = ["claim", "qualifier"]
/// ```
#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    leaves: IndexMap<String, Vec<String>>,
    #[serde(default)]
    composites: IndexMap<String, Vec<String>>,
}

// ---------------------------------------------------------------------------
// ActionTaxonomy
// ---------------------------------------------------------------------------

/// Category name -> member action codes, loaded once per run and passed
/// explicitly to every component that needs it.
#[derive(Clone, Debug)]
pub struct ActionTaxonomy {
    leaves: IndexMap<BroadCategory, Vec<String>>,
    composites: IndexMap<String, Vec<BroadCategory>>,
    /// Action code -> first leaf declaring it.
    lookup: HashMap<String, BroadCategory>,
}

impl ActionTaxonomy {
    /// Build a taxonomy from leaf and composite definitions.
    ///
    /// Fails when a leaf is `NO_CAT`, when a composite references a category
    /// that is not a declared leaf, or when a required composite is missing.
    pub fn new(
        leaves: IndexMap<BroadCategory, Vec<String>>,
        composites: IndexMap<String, Vec<BroadCategory>>,
    ) -> WdpdResult<Self> {
        if leaves.contains_key(&BroadCategory::NoCat) {
            return Err(WdpdError::Taxonomy(
                "NO_CAT is the fallback, not a leaf bucket".to_string(),
            ));
        }
        for (name, members) in &composites {
            if let Some(missing) = members.iter().find(|c| !leaves.contains_key(*c)) {
                return Err(WdpdError::Taxonomy(format!(
                    "composite {name:?} references undeclared leaf {missing}"
                )));
            }
        }
        for required in REQUIRED_COMPOSITES {
            if !composites.contains_key(*required) {
                return Err(WdpdError::Taxonomy(format!(
                    "missing composite bucket {required:?}"
                )));
            }
        }

        let mut lookup = HashMap::new();
        for (category, actions) in &leaves {
            for action in actions {
                lookup.entry(action.clone()).or_insert(*category);
            }
        }

        Ok(Self {
            leaves,
            composites,
            lookup,
        })
    }

    /// The hand-curated Wikidata taxonomy.
    pub fn wikidata() -> Self {
        let leaves = WIKIDATA_LEAVES
            .iter()
            .map(|(cat, actions)| (*cat, actions.iter().map(|a| a.to_string()).collect()))
            .collect();
        let composites = WIKIDATA_COMPOSITES
            .iter()
            .map(|(name, members)| (name.to_string(), members.to_vec()))
            .collect();
        // The built-in tables satisfy every check in `new`.
        match Self::new(leaves, composites) {
            Ok(taxonomy) => taxonomy,
            Err(e) => unreachable!("built-in taxonomy is invalid: {e}"),
        }
    }

    pub fn from_toml_str(content: &str) -> WdpdResult<Self> {
        let file: TaxonomyFile = toml::from_str(content)?;
        let mut leaves = IndexMap::new();
        for (name, actions) in file.leaves {
            leaves.insert(name.parse::<BroadCategory>()?, actions);
        }
        let mut composites = IndexMap::new();
        for (name, members) in file.composites {
            let members = members
                .iter()
                .map(|m| m.parse::<BroadCategory>())
                .collect::<WdpdResult<Vec<_>>>()?;
            composites.insert(name, members);
        }
        Self::new(leaves, composites)
    }

    /// Load a taxonomy file, or the built-in one when `path` is `None`.
    pub fn load(path: Option<&Path>) -> WdpdResult<Self> {
        let Some(path) = path else {
            debug!("using built-in Wikidata taxonomy");
            return Ok(Self::wikidata());
        };
        let content = std::fs::read_to_string(path).map_err(|e| {
            WdpdError::Taxonomy(format!("cannot read {}: {e}", path.display()))
        })?;
        let taxonomy = Self::from_toml_str(&content)?;
        info!(path = %path.display(), leaves = taxonomy.leaves.len(), "loaded taxonomy");
        Ok(taxonomy)
    }

    // -- lookups --------------------------------------------------------------

    /// Leaf bucket declaring `action`, first declaration wins.
    pub fn leaf_of(&self, action: &str) -> Option<BroadCategory> {
        self.lookup.get(action).copied()
    }

    /// Leaf buckets in declaration order.
    pub fn leaves(&self) -> impl Iterator<Item = (BroadCategory, &[String])> {
        self.leaves.iter().map(|(c, a)| (*c, a.as_slice()))
    }

    pub fn leaf_members(&self, category: BroadCategory) -> &[String] {
        self.leaves
            .get(&category)
            .map(|a| a.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `action` is listed under the leaf `category`.
    pub fn in_leaf(&self, category: BroadCategory, action: &str) -> bool {
        self.leaf_members(category).iter().any(|a| a == action)
    }

    /// Whether `action` is listed under any leaf of composite `name`.
    pub fn in_composite(&self, name: &str, action: &str) -> bool {
        self.composites
            .get(name)
            .is_some_and(|members| members.iter().any(|c| self.in_leaf(*c, action)))
    }

    /// Expanded action list of a composite bucket.
    pub fn composite_members(&self, name: &str) -> Vec<&str> {
        self.composites
            .get(name)
            .map(|members| {
                members
                    .iter()
                    .flat_map(|c| self.leaf_members(*c).iter().map(|a| a.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Claim, qualifier and reference actions: the ones whose free text
    /// carries a `[[Property:Pxxx]]: value` pair.
    pub fn is_claim_like(&self, action: &str) -> bool {
        self.in_composite(ALL_CLAIMS, action)
    }

    /// Write `<bucket>\t<a>, <b>, ...` lines, leaves first.
    pub fn dump<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for (category, actions) in &self.leaves {
            writeln!(out, "{}\t{}", category, actions.join(", "))?;
        }
        for name in self.composites.keys() {
            writeln!(out, "{}\t{}", name, self.composite_members(name).join(", "))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

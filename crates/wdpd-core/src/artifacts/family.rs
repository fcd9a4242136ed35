//! Artifact families and their file naming.

use std::path::PathBuf;

use crate::artifacts::table::RenderMode;

/// A set of category-keyed artifacts sharing one directory and naming scheme:
/// `<directory>/<prefix>-<value><suffix>-<mode>.tsv`.
///
/// The name is a function of the category value, never the other way round;
/// the artifact index records which category a file belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArtifactFamily {
    pub name: &'static str,
    pub directory: &'static str,
    pub prefix: &'static str,
    pub suffix: &'static str,
}

impl ArtifactFamily {
    pub fn relative_path(&self, category: &str, mode: RenderMode) -> PathBuf {
        PathBuf::from(self.directory).join(format!(
            "{}-{}{}-{}.tsv",
            self.prefix,
            sanitize_category(category),
            self.suffix,
            mode.as_str()
        ))
    }
}

/// Make a category value safe as a single path component.
pub fn sanitize_category(value: &str) -> String {
    let mut out: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect();
    if out.starts_with('.') {
        out.replace_range(0..1, "_");
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

pub const TERM: ArtifactFamily = ArtifactFamily {
    name: "term",
    directory: "term",
    prefix: "worklist",
    suffix: "-terms",
};

pub const TERM_IN_EDITENTITY: ArtifactFamily = ArtifactFamily {
    name: "termee",
    directory: "termee",
    prefix: "worklist",
    suffix: "-terms-in-editentity",
};

pub const TERM_IN_EDITENTITY_CREATE: ArtifactFamily = ArtifactFamily {
    name: "termeec",
    directory: "termeec",
    prefix: "worklist",
    suffix: "-terms-in-editentity-create",
};

pub const PAGE: ArtifactFamily = ArtifactFamily {
    name: "page",
    directory: "page",
    prefix: "worklist",
    suffix: "-page",
};

pub const PAGEMOVE: ArtifactFamily = ArtifactFamily {
    name: "pagemove",
    directory: "pagemove",
    prefix: "worklist",
    suffix: "-pagemove",
};

pub const PAGEREMOVAL: ArtifactFamily = ArtifactFamily {
    name: "pageremoval",
    directory: "pageremoval",
    prefix: "worklist",
    suffix: "-pageremoval",
};

pub const EDITENTITY: ArtifactFamily = ArtifactFamily {
    name: "editentity",
    directory: "editentity",
    prefix: "worklist",
    suffix: "",
};

pub const PROPERTY: ArtifactFamily = ArtifactFamily {
    name: "property",
    directory: "property",
    prefix: "worklist",
    suffix: "",
};

pub const NOT_NS0: ArtifactFamily = ArtifactFamily {
    name: "not_ns0",
    directory: "not_ns0",
    prefix: "worklist",
    suffix: "",
};

pub const PATROLLERS: ArtifactFamily = ArtifactFamily {
    name: "patrollers",
    directory: "progress_patrollers_by_lang",
    prefix: "patrollers",
    suffix: "",
};

pub const PATROL_DELAY: ArtifactFamily = ArtifactFamily {
    name: "patrol-delay",
    directory: "progress_by_lang",
    prefix: "delay",
    suffix: "",
};

pub const ALL_FAMILIES: [ArtifactFamily; 11] = [
    TERM,
    TERM_IN_EDITENTITY,
    TERM_IN_EDITENTITY_CREATE,
    PAGE,
    PAGEMOVE,
    PAGEREMOVAL,
    EDITENTITY,
    PROPERTY,
    NOT_NS0,
    PATROLLERS,
    PATROL_DELAY,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naming_scheme() {
        assert_eq!(
            TERM.relative_path("de", RenderMode::Head),
            PathBuf::from("term/worklist-de-terms-head.tsv")
        );
        assert_eq!(
            PROPERTY.relative_path("P31", RenderMode::Full),
            PathBuf::from("property/worklist-P31-full.tsv")
        );
        assert_eq!(
            NOT_NS0.relative_path("Property talk", RenderMode::Head),
            PathBuf::from("not_ns0/worklist-Property_talk-head.tsv")
        );
        assert_eq!(
            PATROLLERS.relative_path("en", RenderMode::Full),
            PathBuf::from("progress_patrollers_by_lang/patrollers-en-full.tsv")
        );
    }

    #[test]
    fn sanitizing_keeps_values_in_one_component() {
        assert_eq!(sanitize_category("zh-hant"), "zh-hant");
        assert_eq!(sanitize_category("../etc"), "_._etc");
        assert_eq!(sanitize_category("a b/c"), "a_b_c");
        assert_eq!(sanitize_category(""), "_");
    }

    #[test]
    fn family_names_and_directories_are_unique() {
        for (i, a) in ALL_FAMILIES.iter().enumerate() {
            for b in &ALL_FAMILIES[i + 1..] {
                assert_ne!(a.name, b.name);
                assert_ne!(a.directory, b.directory);
            }
        }
    }
}

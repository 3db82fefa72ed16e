//! Fragment Store: knowledge files indexed by id and topic.

use crate::error::{LoomError, Result};
use crate::markdown::{split_frontmatter, Heading};
use crate::paths;
use crate::types::FragmentCategory;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

// ---------------------------------------------------------------------------
// Fragment
// ---------------------------------------------------------------------------

/// Optional YAML frontmatter of a knowledge file.
#[derive(Debug, Clone, Default, Deserialize)]
struct FragmentMeta {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    category: Option<FragmentCategory>,
    #[serde(default)]
    languages: Vec<String>,
    #[serde(default)]
    heading: Option<Heading>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: String,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub category: FragmentCategory,
    /// Target languages; empty means language-neutral.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    /// Heading to append the fragment under when no insertion marker claims it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<Heading>,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

impl Fragment {
    pub fn new(id: impl Into<String>, topic: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            title: None,
            tags: Vec::new(),
            category: FragmentCategory::General,
            languages: Vec::new(),
            heading: None,
            body: body.into(),
            source: None,
        }
    }

    pub fn with_heading(mut self, heading: Heading) -> Self {
        self.heading = Some(heading);
        self
    }

    pub fn with_languages(mut self, languages: &[&str]) -> Self {
        self.languages = languages.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Build a fragment from file content.
    ///
    /// `rel_id` is the path-derived id (`languages/python`), used unless the
    /// frontmatter overrides it. Topic defaults to the last id segment and
    /// category to the first directory segment.
    pub fn parse(rel_id: &str, content: &str, source: Option<&Path>) -> Result<Self> {
        let (fm, body) = split_frontmatter(content);
        let meta: FragmentMeta = match fm {
            Some(fm) if !fm.trim().is_empty() => {
                serde_yaml::from_str(fm).map_err(|e| LoomError::InvalidFrontmatter {
                    path: source
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| rel_id.to_string()),
                    reason: e.to_string(),
                })?
            }
            _ => FragmentMeta::default(),
        };

        let stem = rel_id.rsplit('/').next().unwrap_or(rel_id);
        let category = meta.category.unwrap_or_else(|| match rel_id.split_once('/') {
            Some((dir, _)) => FragmentCategory::from_dir_name(dir),
            None => FragmentCategory::General,
        });

        Ok(Self {
            id: meta.id.unwrap_or_else(|| rel_id.to_string()),
            topic: meta.topic.unwrap_or_else(|| stem.to_string()),
            title: meta.title,
            tags: meta.tags,
            category,
            languages: meta.languages,
            heading: meta.heading,
            body: body.to_string(),
            source: source.map(Path::to_path_buf),
        })
    }

    /// Topic, tag or id equality.
    pub fn matches(&self, query: &str) -> bool {
        self.id == query || self.topic == query || self.tags.iter().any(|t| t == query)
    }

    /// Language-neutral, or shares a language with `languages` (case-insensitive).
    pub fn targets_any(&self, languages: &[String]) -> bool {
        self.languages.is_empty()
            || languages.is_empty()
            || self
                .languages
                .iter()
                .any(|l| languages.iter().any(|w| w.eq_ignore_ascii_case(l)))
    }

    /// Human title: explicit `title`, else the topic in title case.
    pub fn display_title(&self) -> String {
        if let Some(t) = &self.title {
            return t.clone();
        }
        self.topic
            .split(['-', '_', ' '])
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ---------------------------------------------------------------------------
// FragmentStore
// ---------------------------------------------------------------------------

/// Read-mostly index of fragments. Populated at startup, then shared immutably.
#[derive(Debug, Clone, Default)]
pub struct FragmentStore {
    base: PathBuf,
    fragments: BTreeMap<String, Fragment>,
    /// Which id each source file last produced, so a reload whose frontmatter
    /// changed the id does not leave a stale entry behind.
    by_source: HashMap<PathBuf, String>,
}

impl FragmentStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            ..Self::default()
        }
    }

    /// Create a store rooted at `base` and load every Markdown file beneath it.
    pub fn open(base: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self::new(base);
        store.load_dir()?;
        Ok(store)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Load every `*.md` under the base directory.
    pub fn load_dir(&mut self) -> Result<Vec<String>> {
        let files = crate::io::markdown_files(&self.base)?;
        let ids = self.load(&files)?;
        debug!(count = ids.len(), base = %self.base.display(), "loaded knowledge fragments");
        Ok(ids)
    }

    /// Load specific files. Relative paths are taken relative to the base.
    ///
    /// Returns the ids loaded, in input order. A fragment with an existing id
    /// replaces the previous one.
    pub fn load(&mut self, files: &[PathBuf]) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let path = if file.is_absolute() {
                file.clone()
            } else {
                self.base.join(file)
            };
            if !path.is_file() {
                return Err(LoomError::not_found("fragment file", path.display().to_string()));
            }
            let content = std::fs::read_to_string(&path)?;
            let rel_id = paths::relative_id(&self.base, &path);
            let fragment = Fragment::parse(&rel_id, &content, Some(&path))?;

            if let Some(prev_id) = self.by_source.insert(path.clone(), fragment.id.clone()) {
                if prev_id != fragment.id {
                    self.fragments.remove(&prev_id);
                }
            }
            debug!(id = %fragment.id, topic = %fragment.topic, "loaded fragment");
            ids.push(fragment.id.clone());
            self.insert(fragment);
        }
        Ok(ids)
    }

    /// Insert or replace by id. Returns the replaced fragment, if any.
    pub fn insert(&mut self, fragment: Fragment) -> Option<Fragment> {
        self.fragments.insert(fragment.id.clone(), fragment)
    }

    pub fn get(&self, id: &str) -> Option<&Fragment> {
        self.fragments.get(id)
    }

    /// Every fragment matching `topic` (topic, tag or id), one per id, sorted by id.
    pub fn find(&self, topic: &str) -> Result<Vec<&Fragment>> {
        let found: Vec<&Fragment> = self.fragments.values().filter(|f| f.matches(topic)).collect();
        if found.is_empty() {
            return Err(LoomError::not_found("topic", topic));
        }
        Ok(found)
    }

    /// [`find`](Self::find) narrowed to fragments targeting one of `languages`.
    pub fn find_for(&self, topic: &str, languages: &[String]) -> Result<Vec<&Fragment>> {
        let found: Vec<&Fragment> = self
            .find(topic)?
            .into_iter()
            .filter(|f| f.targets_any(languages))
            .collect();
        if found.is_empty() {
            return Err(LoomError::not_found(
                "topic",
                format!("{topic} (languages: {})", languages.join(", ")),
            ));
        }
        Ok(found)
    }

    pub fn by_category(&self, category: FragmentCategory) -> Vec<&Fragment> {
        self.fragments
            .values()
            .filter(|f| f.category == category)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.values()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let p = dir.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(&p, content).unwrap();
        p
    }

    #[test]
    fn ids_topics_and_categories_from_paths() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "languages/python.md", "# Python\nuse venv\n");
        write(dir.path(), "auth/managed-identity.md", "DefaultAzureCredential\n");
        write(dir.path(), "overview.md", "hello\n");

        let store = FragmentStore::open(dir.path()).unwrap();
        assert_eq!(store.len(), 3);

        let py = store.get("languages/python").unwrap();
        assert_eq!(py.topic, "python");
        assert_eq!(py.category, FragmentCategory::Language);

        let mi = store.get("auth/managed-identity").unwrap();
        assert_eq!(mi.category, FragmentCategory::Auth);
        assert_eq!(mi.display_title(), "Managed Identity");

        assert_eq!(
            store.get("overview").unwrap().category,
            FragmentCategory::General
        );
    }

    #[test]
    fn frontmatter_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "tools/tf.md",
            "---\nid: terraform-state\ntopic: terraform\ntags: [iac]\nlanguages: [hcl]\nheading: \"## Terraform\"\n---\nbackend \"azurerm\" {}\n",
        );
        let store = FragmentStore::open(dir.path()).unwrap();
        let f = store.get("terraform-state").unwrap();
        assert_eq!(f.topic, "terraform");
        assert_eq!(f.category, FragmentCategory::Tool);
        assert_eq!(f.heading, Some(Heading::new(2, "Terraform")));
        assert_eq!(f.body, "backend \"azurerm\" {}\n");
        assert_eq!(store.find("iac").unwrap().len(), 1);
    }

    #[test]
    fn malformed_frontmatter_names_the_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "bad.md", "---\ntags: [unclosed\n---\nbody\n");
        let err = FragmentStore::open(dir.path()).unwrap_err();
        match err {
            LoomError::InvalidFrontmatter { path, .. } => assert!(path.ends_with("bad.md")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reload_replaces_same_id() {
        let dir = TempDir::new().unwrap();
        let p = write(dir.path(), "services/cosmos.md", "v1\n");
        let mut store = FragmentStore::open(dir.path()).unwrap();

        std::fs::write(&p, "v2\n").unwrap();
        store.load(&[p.clone()]).unwrap();
        store.load(&[PathBuf::from("services/cosmos.md")]).unwrap();

        let found = store.find("cosmos").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].body, "v2\n");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn reload_with_changed_id_drops_stale_entry() {
        let dir = TempDir::new().unwrap();
        let p = write(dir.path(), "services/cosmos.md", "v1\n");
        let mut store = FragmentStore::open(dir.path()).unwrap();
        std::fs::write(&p, "---\nid: cosmos-db\n---\nv2\n").unwrap();
        store.load(&[p]).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get("services/cosmos").is_none());
        assert!(store.get("cosmos-db").is_some());
    }

    #[test]
    fn find_missing_topic_is_not_found() {
        let store = FragmentStore::new("/nonexistent");
        assert!(matches!(
            store.find("rust"),
            Err(LoomError::NotFound { kind: "topic", .. })
        ));
    }

    #[test]
    fn find_for_filters_languages() {
        let mut store = FragmentStore::new("/kb");
        store.insert(Fragment::new("auth/python", "auth", "py").with_languages(&["python"]));
        store.insert(Fragment::new("auth/csharp", "auth", "cs").with_languages(&["csharp"]));
        store.insert(Fragment::new("auth/overview", "auth", "any"));

        let py: Vec<&str> = store
            .find_for("auth", &["Python".to_string()])
            .unwrap()
            .iter()
            .map(|f| f.id.as_str())
            .collect();
        assert_eq!(py, vec!["auth/overview", "auth/python"]);

        assert_eq!(store.find("auth").unwrap().len(), 3);

        let mut only_cs = FragmentStore::new("/kb");
        only_cs.insert(Fragment::new("auth/csharp", "auth", "cs").with_languages(&["csharp"]));
        assert!(only_cs.find_for("auth", &["go".to_string()]).is_err());
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut store = FragmentStore::new(dir.path());
        assert!(matches!(
            store.load(&[PathBuf::from("nope.md")]),
            Err(LoomError::NotFound { .. })
        ));
    }
}

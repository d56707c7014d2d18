//! Item catalog
//!
//! Ordered, immutable description of every question in a test. A catalog is
//! static configuration: it is built (or loaded from TOML) once, checked for
//! structural well-formedness, and shared read-only for the process lifetime.

use crate::answer::AnswerKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::info;

/// Stable identifier of a media payload (e.g. a share link)
///
/// Resolution to bytes is the media fetcher's job; the catalog only carries
/// the reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentRef(String);

impl ContentRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One required answer per item in a section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    /// Name used to address the slot and label the persisted column
    pub name: String,
    /// Question shown next to the control
    #[serde(default)]
    pub prompt: String,
    #[serde(flatten)]
    pub kind: AnswerKind,
}

impl Dimension {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>, kind: AnswerKind) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            kind,
        }
    }
}

/// One unit of judgment; identity is its position in the section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub media: Vec<ContentRef>,
}

impl Item {
    pub fn new<I, R>(media: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ContentRef>,
    {
        Self {
            media: media.into_iter().map(Into::into).collect(),
        }
    }
}

/// A group of items sharing one answer shape and set of instructions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub instructions: String,
    pub dimensions: Vec<Dimension>,
    pub items: Vec<Item>,
}

impl Section {
    /// Section with a single answer dimension named after the section
    pub fn single(
        id: impl Into<String>,
        prompt: impl Into<String>,
        kind: AnswerKind,
        items: Vec<Item>,
    ) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            instructions: String::new(),
            dimensions: vec![Dimension::new(id.clone(), prompt, kind)],
            items,
            id,
        }
    }

    /// Resolve a dimension address.
    ///
    /// `None` is only accepted for single-dimension sections; compound
    /// sections must name the dimension.
    pub fn dimension_index(&self, dimension: Option<&str>) -> Result<usize> {
        match dimension {
            None if self.dimensions.len() == 1 => Ok(0),
            None => Err(Error::UnknownDimension {
                section_id: self.id.clone(),
                dimension: String::new(),
            }),
            Some(name) => self
                .dimensions
                .iter()
                .position(|d| d.name == name)
                .ok_or_else(|| Error::UnknownDimension {
                    section_id: self.id.clone(),
                    dimension: name.to_string(),
                }),
        }
    }

    /// Check an item index against this section
    pub fn check_item(&self, item_index: usize) -> Result<&Item> {
        self.items.get(item_index).ok_or_else(|| Error::ItemOutOfRange {
            section_id: self.id.clone(),
            index: item_index,
            len: self.items.len(),
        })
    }

    /// Number of media references each item in this section carries
    pub fn media_width(&self) -> usize {
        self.items.first().map_or(0, |item| item.media.len())
    }

    fn check_well_formed(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Catalog(format!("section {:?}: {}", self.id, msg)));

        if self.id.trim().is_empty() {
            return Err(Error::Catalog("section id must not be blank".to_string()));
        }
        if self.dimensions.is_empty() {
            return fail("declares no answer dimensions".to_string());
        }
        for (i, dim) in self.dimensions.iter().enumerate() {
            if dim.name.trim().is_empty() {
                return fail("dimension name must not be blank".to_string());
            }
            if self.dimensions[..i].iter().any(|d| d.name == dim.name) {
                return fail(format!("duplicate dimension {:?}", dim.name));
            }
            if let Err(msg) = dim.kind.check_well_formed() {
                return fail(format!("dimension {:?}: {}", dim.name, msg));
            }
        }

        let width = self.media_width();
        for (index, item) in self.items.iter().enumerate() {
            if item.media.is_empty() {
                return fail(format!("item {} has no media reference", index + 1));
            }
            if item.media.iter().any(|r| r.as_str().trim().is_empty()) {
                return fail(format!("item {} has a blank media reference", index + 1));
            }
            if item.media.len() != width {
                return fail(format!(
                    "item {} carries {} media references, expected {}",
                    index + 1,
                    item.media.len(),
                    width
                ));
            }
        }
        Ok(())
    }
}

/// On-disk catalog layout
#[derive(Debug, Deserialize)]
struct CatalogFile {
    sections: Vec<Section>,
}

/// Ordered sequence of sections
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Catalog {
    sections: Vec<Section>,
}

impl Catalog {
    /// Build a catalog, rejecting structurally malformed input
    pub fn new(sections: Vec<Section>) -> Result<Self> {
        if sections.is_empty() {
            return Err(Error::Catalog("catalog has no sections".to_string()));
        }
        for (i, section) in sections.iter().enumerate() {
            section.check_well_formed()?;
            if sections[..i].iter().any(|s| s.id == section.id) {
                return Err(Error::Catalog(format!("duplicate section id {:?}", section.id)));
            }
        }
        Ok(Self { sections })
    }

    /// Parse a catalog from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|e| Error::Catalog(format!("Parse catalog failed: {}", e)))?;
        Self::new(file.sections)
    }

    /// Load a catalog from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_toml_str(&content)?;
        info!(
            path = %path.display(),
            sections = catalog.sections.len(),
            items = catalog.item_count(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    /// Same-speaker pairwise test shipped as the default catalog
    pub fn builtin() -> Self {
        let pairs = [(
            "https://drive.google.com/file/d/1NnrKT5cw5p29DzVswZECBA1dJ1tdIuTI/preview",
            "https://drive.google.com/file/d/1-sALpb42wFD5ce8ne1d3gO-IC-djOjgv/preview",
        )];

        let mut section = Section::single(
            "same_speaker",
            "Do these two audios belong to the same speaker?",
            AnswerKind::BinaryChoice,
            pairs.iter().map(|(a, b)| Item::new([*a, *b])).collect(),
        );
        section.title = "Same Speaker Subjective Test".to_string();
        section.instructions =
            "Listen to both recordings of each pair, then answer the question.".to_string();

        Self {
            sections: vec![section],
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Look up a section or fail with `UnknownSection`
    pub fn require_section(&self, id: &str) -> Result<&Section> {
        self.section(id)
            .ok_or_else(|| Error::UnknownSection(id.to_string()))
    }

    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }
}

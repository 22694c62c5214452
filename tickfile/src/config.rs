//! Builder for the metadata sections a new file is created with.
//!
//! A consuming builder: each `with_*` method takes `self` and returns
//! `Self`, so the sections a new file carries read as a single chained
//! expression at the call site.

use std::collections::HashMap;

use crate::schema::ItemSection;
use crate::sections::{ContentDescriptionSection, NameValue, NameValueSection, TagsSection};

/// Describes the sections a new file should be created with.
///
/// `item_section` is mandatory — without it there is no schema to encode
/// records against — every other section is optional.
#[derive(Clone, Debug, Default)]
pub struct TickFileConfig {
  pub(crate) item_section: Option<ItemSection>,
  pub(crate) content_description: Option<ContentDescriptionSection>,
  pub(crate) name_values: Option<NameValueSection>,
  pub(crate) tags: Option<TagsSection>,
}

impl TickFileConfig {
  pub fn new() -> Self {
    TickFileConfig::default()
  }

  /// Sets the record schema. Typically produced by `T::item_section()` for
  /// a `T: TickRecord` generated via `#[derive(TickRecord)]`.
  pub fn with_item_section(mut self, item_section: ItemSection) -> Self {
    self.item_section = Some(item_section);
    self
  }

  pub fn with_content_description<S: Into<String>>(mut self, description: S) -> Self {
    self.content_description = Some(ContentDescriptionSection {
      content_description: description.into(),
    });
    self
  }

  pub fn with_name_values(mut self, name_values: HashMap<String, NameValue>) -> Self {
    self.name_values = Some(NameValueSection { name_values });
    self
  }

  pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
    self.tags = Some(TagsSection { tags });
    self
  }

  pub fn item_section(&self) -> Option<&ItemSection> {
    self.item_section.as_ref()
  }
}

//! Ordered editor for repeatable sub-records (parties, debts, assets, facts, claims,
//! attachments).

use serde::{Deserialize, Serialize};

use super::domain::{Attachment, Collection};

/// An element of a variable-length collection.
pub trait RepeatableItem: Clone {
    /// Kind-specific default shape used by `append_blank`.
    fn blank() -> Self;
}

/// Items whose field set is selected by a discriminator value.
pub trait Discriminated {
    type Kind: Copy + PartialEq;

    fn kind(&self) -> Self::Kind;

    /// Replace the variant body with the blank shape of `kind`.
    fn reset_for(&mut self, kind: Self::Kind);

    /// Switch discriminator. Fields that only applied to the previous kind are dropped;
    /// re-selecting the current kind keeps everything. Returns whether a reset happened.
    fn set_kind(&mut self, kind: Self::Kind) -> bool {
        if self.kind() == kind {
            return false;
        }
        self.reset_for(kind);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListError {
    #[error("{collection:?} has no item at index {index} (length {len})")]
    IndexOutOfRange {
        collection: Collection,
        index: usize,
        len: usize,
    },
    #[error("an attachment named '{0}' already exists")]
    DuplicateName(String),
    #[error("attachment name must not be empty")]
    EmptyName,
}

/// Minimum-count invariant failure for a whole collection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("at least {min} {} item(s) required, found {actual}", .collection.item_label())]
pub struct CardinalityError {
    pub collection: Collection,
    pub min: usize,
    pub actual: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemList<T> {
    items: Vec<T>,
}

impl<T> Default for ItemList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> From<Vec<T>> for ItemList<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T: RepeatableItem> ItemList<T> {
    /// Push at the end and return the new item's index.
    pub fn append(&mut self, item: T) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }

    pub fn append_blank(&mut self) -> usize {
        self.append(T::blank())
    }

    /// Delete the item at `index`; later items shift down by one.
    pub fn remove(&mut self, collection: Collection, index: usize) -> Result<T, ListError> {
        self.check_index(collection, index)?;
        Ok(self.items.remove(index))
    }

    pub fn replace(&mut self, collection: Collection, index: usize, item: T) -> Result<(), ListError> {
        *self.get_mut(collection, index)? = item;
        Ok(())
    }

    pub fn get_mut(&mut self, collection: Collection, index: usize) -> Result<&mut T, ListError> {
        let len = self.items.len();
        self.items
            .get_mut(index)
            .ok_or(ListError::IndexOutOfRange {
                collection,
                index,
                len,
            })
    }

    /// Checked at section-save time only.
    pub fn validate_cardinality(
        &self,
        collection: Collection,
        min: usize,
    ) -> Result<(), CardinalityError> {
        if self.items.len() < min {
            return Err(CardinalityError {
                collection,
                min,
                actual: self.items.len(),
            });
        }
        Ok(())
    }

    fn check_index(&self, collection: Collection, index: usize) -> Result<(), ListError> {
        if index >= self.items.len() {
            return Err(ListError::IndexOutOfRange {
                collection,
                index,
                len: self.items.len(),
            });
        }
        Ok(())
    }
}

impl<T> ItemList<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<'a, T> IntoIterator for &'a ItemList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl ItemList<Attachment> {
    /// Attachments are addressed by display name, so duplicates (ignoring case and
    /// surrounding whitespace) are refused.
    pub fn append_unique(&mut self, attachment: Attachment) -> Result<usize, ListError> {
        let name = attachment.display_name.trim();
        if name.is_empty() {
            return Err(ListError::EmptyName);
        }
        if self.position_of(name).is_some() {
            return Err(ListError::DuplicateName(name.to_string()));
        }
        Ok(self.append(attachment))
    }

    pub fn position_of(&self, display_name: &str) -> Option<usize> {
        let wanted = display_name.trim().to_lowercase();
        self.items
            .iter()
            .position(|existing| existing.display_name.trim().to_lowercase() == wanted)
    }
}

/// Where an index-keyed path ends up after `removed` was deleted from its collection.
/// `None` means the path belonged to the removed item.
pub fn shift_after_removal(index: usize, removed: usize) -> Option<usize> {
    match index.cmp(&removed) {
        std::cmp::Ordering::Less => Some(index),
        std::cmp::Ordering::Equal => None,
        std::cmp::Ordering::Greater => Some(index - 1),
    }
}

//! Presentation model

use serde::{Deserialize, Serialize};

use super::{LibraryError, LibraryResult, check_index};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Presentation {
    #[serde(default)]
    pub slides: Vec<Slide>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Presentation {
    /// Insert a slide at `index`, or append when `index` is None
    pub fn add_slide(&mut self, slide: Slide, index: Option<usize>) -> LibraryResult<usize> {
        match index {
            Some(index) if index > self.slides.len() => Err(LibraryError::Invalid(format!(
                "slide index {} is out of range (count: {})",
                index,
                self.slides.len()
            ))),
            Some(index) => {
                self.slides.insert(index, slide);
                Ok(index)
            }
            None => {
                self.slides.push(slide);
                Ok(self.slides.len() - 1)
            }
        }
    }

    pub fn delete_slide(&mut self, index: usize) -> LibraryResult<Slide> {
        check_index("slide", index, self.slides.len())?;
        Ok(self.slides.remove(index))
    }

    pub fn slide(&self, index: usize) -> LibraryResult<&Slide> {
        check_index("slide", index, self.slides.len())?;
        Ok(&self.slides[index])
    }

    pub fn slide_mut(&mut self, index: usize) -> LibraryResult<&mut Slide> {
        check_index("slide", index, self.slides.len())?;
        Ok(&mut self.slides[index])
    }
}

//! Create/edit flow as a two-state session instead of a modal dialog.
//!
//! `start_create`/`start_edit` move a session to `Editing` with a draft the
//! caller mutates; `submit` checks required fields and hands the draft back
//! as [`FormOutcome::Submitted`], `cancel` yields [`FormOutcome::Cancelled`].

use thiserror::Error;

use crate::models::{Course, Student};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("no edit in progress")]
    NotEditing,
}

/// Required-field checks only. Anything else is the gateway's call.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;

    /// Last chance to tidy the draft before it is submitted.
    fn normalize(&mut self) {}
}

impl Validate for Student {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.full_name.trim().is_empty() {
            return Err(ValidationError::Required("fullName"));
        }
        if self.email.trim().is_empty() {
            return Err(ValidationError::Required("email"));
        }
        Ok(())
    }

    fn normalize(&mut self) {
        if self.gsm_number.as_deref().is_some_and(|g| g.trim().is_empty()) {
            self.gsm_number = None;
        }
    }
}

impl Validate for Course {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Required("name"));
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormOutcome<T> {
    Submitted(T),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditSession<T> {
    Viewing,
    Editing { draft: T, is_new: bool },
}

impl<T> Default for EditSession<T> {
    fn default() -> Self {
        EditSession::Viewing
    }
}

impl<T: Clone + Default + Validate> EditSession<T> {
    pub fn start_create(&mut self) {
        *self = EditSession::Editing {
            draft: T::default(),
            is_new: true,
        };
    }

    /// Edits a copy; `current` is untouched until the caller applies the
    /// submitted value.
    pub fn start_edit(&mut self, current: &T) {
        *self = EditSession::Editing {
            draft: current.clone(),
            is_new: false,
        };
    }

    pub fn is_editing(&self) -> bool {
        matches!(self, EditSession::Editing { .. })
    }

    pub fn is_new(&self) -> bool {
        matches!(self, EditSession::Editing { is_new: true, .. })
    }

    pub fn draft_mut(&mut self) -> Option<&mut T> {
        match self {
            EditSession::Editing { draft, .. } => Some(draft),
            EditSession::Viewing => None,
        }
    }

    pub fn cancel(&mut self) -> FormOutcome<T> {
        *self = EditSession::Viewing;
        FormOutcome::Cancelled
    }

    /// On a validation failure the session stays in `Editing` so the user
    /// can fix the draft.
    pub fn submit(&mut self) -> Result<FormOutcome<T>, ValidationError> {
        let draft = match self {
            EditSession::Editing { draft, .. } => draft,
            EditSession::Viewing => return Err(ValidationError::NotEditing),
        };
        draft.normalize();
        draft.validate()?;
        let submitted = draft.clone();
        *self = EditSession::Viewing;
        Ok(FormOutcome::Submitted(submitted))
    }
}

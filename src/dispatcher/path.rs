//! Path decoding: turns `/dynamic/account/photo/1045.jpg` into a
//! [`DispatchRequest`] naming handler `AccountController`, action `photo` and
//! argument `1045`.
//!
//! The grammar is positional. Splitting on `/` yields a leading empty segment,
//! the dispatch prefix, the handler, the action and an optional argument.
//! Anything shorter is a [`DispatchError::MalformedPath`].

use smallvec::SmallVec;

use super::errors::DispatchError;

/// Segments required before a path is considered decodable
/// (leading empty segment, prefix, handler, action).
pub const MIN_SEGMENTS: usize = 4;

const HANDLER_SEGMENT: usize = 2;
const ACTION_SEGMENT: usize = 3;
const ARGUMENT_SEGMENT: usize = 4;

/// Handler/action/argument triple produced once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    /// Handler name with role suffix applied, e.g. `AccountController`
    pub handler_name: String,
    /// Action name exactly as it appeared in the path
    pub action_name: String,
    /// Trailing argument with the recognized extension removed; empty when absent
    pub argument: String,
}

impl DispatchRequest {
    pub fn new(
        handler_name: impl Into<String>,
        action_name: impl Into<String>,
        argument: impl Into<String>,
    ) -> Self {
        Self {
            handler_name: handler_name.into(),
            action_name: action_name.into(),
            argument: argument.into(),
        }
    }

    /// Positional arguments handed to the action: the argument when present,
    /// nothing otherwise.
    #[must_use]
    pub fn arguments(&self) -> Vec<String> {
        if self.argument.is_empty() {
            Vec::new()
        } else {
            vec![self.argument.clone()]
        }
    }
}

/// Pure parser from request path to [`DispatchRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathDecoder {
    handler_suffix: String,
    stripped_extension: Option<String>,
}

impl Default for PathDecoder {
    fn default() -> Self {
        Self::new("Controller", Some(".jpg"))
    }
}

impl PathDecoder {
    pub fn new(handler_suffix: impl Into<String>, stripped_extension: Option<&str>) -> Self {
        Self {
            handler_suffix: handler_suffix.into(),
            stripped_extension: stripped_extension
                .filter(|ext| !ext.is_empty())
                .map(str::to_string),
        }
    }

    /// Suffix appended to the title-cased handler segment.
    #[must_use]
    pub fn handler_suffix(&self) -> &str {
        &self.handler_suffix
    }

    /// Extension removed from the argument, if any.
    #[must_use]
    pub fn stripped_extension(&self) -> Option<&str> {
        self.stripped_extension.as_deref()
    }

    /// Decode a request path. Any query string is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MalformedPath`] when fewer than
    /// [`MIN_SEGMENTS`] segments are present or the handler/action segment is
    /// empty.
    pub fn decode(&self, path: &str) -> Result<DispatchRequest, DispatchError> {
        let path_only = path.split('?').next().unwrap_or_default();
        let segments: SmallVec<[&str; 8]> = path_only.split('/').collect();

        if segments.len() < MIN_SEGMENTS {
            return Err(malformed(path, "expected /<prefix>/<handler>/<action>[/<argument>]"));
        }

        let handler = segments[HANDLER_SEGMENT];
        if handler.is_empty() {
            return Err(malformed(path, "handler segment is empty"));
        }
        let action = segments[ACTION_SEGMENT];
        if action.is_empty() {
            return Err(malformed(path, "action segment is empty"));
        }

        let raw_argument = segments.get(ARGUMENT_SEGMENT).copied().unwrap_or_default();

        Ok(DispatchRequest {
            handler_name: format!("{}{}", title_case(handler), self.handler_suffix),
            action_name: action.to_string(),
            argument: self.strip_extension(raw_argument).to_string(),
        })
    }

    /// The configured extension when the argument segment of `path` carries
    /// it, i.e. when [`decode`](Self::decode) would strip it.
    #[must_use]
    pub fn matched_extension(&self, path: &str) -> Option<&str> {
        let ext = self.stripped_extension.as_deref()?;
        let path_only = path.split('?').next().unwrap_or_default();
        path_only
            .split('/')
            .nth(ARGUMENT_SEGMENT)
            .filter(|argument| argument.ends_with(ext))
            .map(|_| ext)
    }

    /// Remove exactly one trailing recognized extension.
    #[must_use]
    pub fn strip_extension<'a>(&self, argument: &'a str) -> &'a str {
        match &self.stripped_extension {
            Some(ext) => argument.strip_suffix(ext.as_str()).unwrap_or(argument),
            None => argument,
        }
    }
}

fn malformed(path: &str, reason: &'static str) -> DispatchError {
    DispatchError::MalformedPath {
        path: path.to_string(),
        reason,
    }
}

fn title_case(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

//! Dynamic scope: the chain of schema resources entered during evaluation.

use std::sync::Arc;

use url::Url;

#[derive(Debug)]
struct Frame {
    uri: Url,
    parent: Option<Arc<Frame>>,
    len: usize,
}

/// The base URIs of the schema resources currently being evaluated,
/// outermost first.
///
/// A scope is an immutable value: [`DynamicScope::append`] returns a new
/// scope sharing its prefix with the old one, so sibling branches never see
/// each other's frames.
#[derive(Debug, Clone, Default)]
pub struct DynamicScope {
    head: Option<Arc<Frame>>,
}

impl DynamicScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a scope with `uri` as its innermost frame.
    pub fn append(&self, uri: Url) -> Self {
        let len = self.len() + 1;
        Self {
            head: Some(Arc::new(Frame {
                uri,
                parent: self.head.clone(),
                len,
            })),
        }
    }

    /// The innermost base URI.
    pub fn current(&self) -> Option<&Url> {
        self.head.as_deref().map(|frame| &frame.uri)
    }

    pub fn len(&self) -> usize {
        self.head.as_deref().map_or(0, |frame| frame.len)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// The frames from outermost to innermost.
    pub fn outermost_first(&self) -> Vec<&Url> {
        let mut uris = Vec::with_capacity(self.len());
        let mut frame = self.head.as_deref();
        while let Some(current) = frame {
            uris.push(&current.uri);
            frame = current.parent.as_deref();
        }
        uris.reverse();
        uris
    }
}

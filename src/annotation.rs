//! Forwarding selected state annotations across cross-contract returns.

use std::fmt::Debug;

/// A piece of metadata attached to a `GlobalState` by a plugin. Annotations
/// are opaque to the engine except for the subset that opt into propagation
/// across `DELEGATECALL`/`CALLCODE` returns via [`Annotation::should_propagate`].
pub trait Annotation: Debug {
    /// Whether this annotation survives a `DELEGATECALL`/`CALLCODE` return.
    /// Only mutation annotations do.
    fn should_propagate(&self) -> bool {
        false
    }

    fn clone_box(&self) -> Box<dyn Annotation>;
}

/// Marker annotation for state mutations, the only kind propagated across
/// delegate-style returns.
#[derive(Debug, Clone)]
pub struct MutationAnnotation {
    pub description: String,
}

impl Annotation for MutationAnnotation {
    fn should_propagate(&self) -> bool {
        true
    }

    fn clone_box(&self) -> Box<dyn Annotation> {
        Box::new(self.clone())
    }
}

/// An ordered bag of annotations carried by a `GlobalState`.
#[derive(Debug, Default)]
pub struct AnnotationBag {
    items: Vec<Box<dyn Annotation>>,
}

impl Clone for AnnotationBag {
    fn clone(&self) -> Self {
        Self {
            items: self.items.iter().map(|a| a.clone_box()).collect(),
        }
    }
}

impl AnnotationBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, annotation: Box<dyn Annotation>) {
        self.items.push(annotation);
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Annotation> {
        self.items.iter().map(|a| a.as_ref())
    }

    /// Annotations that opt into propagation, cloned for attachment onto the
    /// return state.
    pub fn propagatable(&self) -> Vec<Box<dyn Annotation>> {
        self.items
            .iter()
            .filter(|a| a.should_propagate())
            .map(|a| a.clone_box())
            .collect()
    }

    pub fn extend(&mut self, annotations: Vec<Box<dyn Annotation>>) {
        self.items.extend(annotations);
    }
}

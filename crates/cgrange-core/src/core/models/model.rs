use super::interaction::{ClassKind, InteractionClassSpec};

/// Ordered list of interaction classes making up a coarse-grained model.
///
/// Class order is significant: it fixes the order of range-file lines and of the
/// per-class inversion blocks.
#[derive(Debug, Clone, Default)]
pub struct InteractionModel {
    pub classes: Vec<InteractionClassSpec>,
}

impl InteractionModel {
    pub fn new(classes: Vec<InteractionClassSpec>) -> Self {
        Self { classes }
    }

    pub fn push(&mut self, class: InteractionClassSpec) {
        self.classes.push(class);
    }

    pub fn class_of_kind(&self, kind: ClassKind) -> Option<&InteractionClassSpec> {
        self.classes.iter().find(|c| c.kind == kind)
    }

    /// True if any class records its sampled parameter distribution.
    pub fn any_active_parameter_distributions(&self) -> bool {
        self.classes.iter().any(|c| c.output.is_enabled())
    }
}

//! Ancestor linearization and rule-table merging for shielded classes.
use super::class::ClassDef;
use crate::store::ClassId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Flattens the ancestry of `bases` into a list where every class appears after all of
/// its own ancestors (root first).
///
/// Bases are visited last-declared first, so when the list is applied in order an
/// earlier-declared base overrides a later one, as it would in the host's MRO.
pub(crate) fn linearize(bases: &[Arc<ClassDef>]) -> Vec<Arc<ClassDef>> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    for base in bases.iter().rev() {
        visit(base, &mut visited, &mut order);
    }
    order
}

fn visit(class: &Arc<ClassDef>, visited: &mut HashSet<ClassId>, order: &mut Vec<Arc<ClassDef>>) {
    // A class is built only after its bases, so the ancestry cannot loop.
    if !visited.insert(class.id()) {
        return;
    }
    for base in class.bases().iter().rev() {
        visit(base, visited, order);
    }
    order.push(class.clone());
}

/// Something declared by one class in a lineage.
pub(crate) trait Owned {
    fn owner(&self) -> ClassId;

    /// Whether replacing `inherited` with `self` changes the enforced contract.
    fn conflicts_with(&self, _inherited: &Self) -> bool {
        false
    }
}

/// Applies `layer` over `merged`; a name already present is replaced.
///
/// An override that changes an inherited attribute's rule is logged at `warn`.
pub(crate) fn overlay<T>(
    merged: &mut HashMap<String, T>,
    layer: &HashMap<String, T>,
    class: &str,
    kind: &str,
) where
    T: Owned + Clone,
{
    for (name, item) in layer {
        let Some(previous) = merged.insert(name.clone(), item.clone()) else {
            continue;
        };
        if item.conflicts_with(&previous) {
            tracing::warn!(class, name = %name, kind, "inherited rule replaced");
        } else if previous.owner() != item.owner() {
            tracing::debug!(class, name = %name, kind, "inherited declaration overridden");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shield::ClassBuilder;

    fn names(classes: &[Arc<ClassDef>]) -> Vec<&str> {
        classes.iter().map(|c| c.name()).collect()
    }

    #[test]
    fn test_diamond_lists_shared_root_once() {
        let a = ClassBuilder::new("A").build().unwrap();
        let b = ClassBuilder::new("B").extends(&a).build().unwrap();
        let c = ClassBuilder::new("C").extends(&a).build().unwrap();

        let order = linearize(&[b.clone(), c.clone()]);
        assert_eq!(names(&order), vec!["A", "C", "B"]);
    }

    #[test]
    fn test_ancestors_precede_descendants() {
        let a = ClassBuilder::new("A").build().unwrap();
        let b = ClassBuilder::new("B").extends(&a).build().unwrap();
        let c = ClassBuilder::new("C").extends(&b).build().unwrap();
        assert_eq!(names(&linearize(&[c])), vec!["A", "B", "C"]);
    }
}

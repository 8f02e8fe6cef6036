//! Arena holding every mounted component and its parent/child links.

use std::fmt::Write as _;

use crate::composer::{Composer, ComposerId, Depth};
use crate::error::TreeError;

struct Entry {
    name: &'static str,
    // `None` while the component is lent out for a render or a hook.
    component: Option<Box<dyn Composer>>,
    parent: Option<ComposerId>,
    children: Vec<ComposerId>,
    depth: Depth,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

#[derive(Default)]
pub struct ComponentTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    roots: Vec<ComposerId>,
}

impl ComponentTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn is_mounted(&self, id: ComposerId) -> bool {
        self.entry(id).is_some()
    }

    pub fn depth(&self, id: ComposerId) -> Option<Depth> {
        self.entry(id).map(|entry| entry.depth)
    }

    pub fn parent(&self, id: ComposerId) -> Option<ComposerId> {
        self.entry(id).and_then(|entry| entry.parent)
    }

    pub fn children(&self, id: ComposerId) -> &[ComposerId] {
        self.entry(id)
            .map(|entry| entry.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn roots(&self) -> &[ComposerId] {
        &self.roots
    }

    pub fn name(&self, id: ComposerId) -> Option<&'static str> {
        self.entry(id).map(|entry| entry.name)
    }

    /// Borrows the component behind `id` as its concrete type.
    pub fn get<T: Composer>(&self, id: ComposerId) -> Result<&T, TreeError> {
        let entry = self.entry(id).ok_or(TreeError::Missing { id })?;
        let component = entry.component.as_deref().ok_or(TreeError::Busy { id })?;
        component
            .as_any()
            .downcast_ref::<T>()
            .ok_or(TreeError::TypeMismatch {
                id,
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn with_component<T: Composer, R>(
        &mut self,
        id: ComposerId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, TreeError> {
        let entry = self.entry_mut(id).ok_or(TreeError::Missing { id })?;
        let component = entry
            .component
            .as_deref_mut()
            .ok_or(TreeError::Busy { id })?;
        let typed = component
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or(TreeError::TypeMismatch {
                id,
                expected: std::any::type_name::<T>(),
            })?;
        Ok(f(typed))
    }

    pub(crate) fn insert(
        &mut self,
        parent: Option<ComposerId>,
        component: Box<dyn Composer>,
        name: &'static str,
    ) -> Result<ComposerId, TreeError> {
        let depth = match parent {
            Some(parent) => self.depth(parent).ok_or(TreeError::Missing { id: parent })? + 1,
            None => 0,
        };
        let entry = Entry {
            name,
            component: Some(component),
            parent,
            children: Vec::new(),
            depth,
        };
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                ComposerId::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                ComposerId::new(index, 0)
            }
        };
        match parent.and_then(|parent| self.entry_mut(parent)) {
            Some(parent) => parent.children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    /// Detaches `id` and its subtree. Returns the components that were
    /// resident, descendants before ancestors.
    pub(crate) fn remove(&mut self, id: ComposerId) -> Vec<Box<dyn Composer>> {
        let parent = match self.entry(id) {
            Some(entry) => entry.parent,
            None => return Vec::new(),
        };
        match parent {
            Some(parent) => {
                if let Some(parent) = self.entry_mut(parent) {
                    parent.children.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }

        let mut order = Vec::new();
        let mut stack = vec![(id, false)];
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                order.push(node);
                continue;
            }
            stack.push((node, true));
            for child in self.children(node).iter().rev() {
                stack.push((*child, false));
            }
        }

        order
            .into_iter()
            .filter_map(|node| self.release(node))
            .filter_map(|entry| entry.component)
            .collect()
    }

    /// Lends the component out. The slot stays reserved until it is restored
    /// or the component is dismounted.
    pub(crate) fn take(&mut self, id: ComposerId) -> Result<Box<dyn Composer>, TreeError> {
        let entry = self.entry_mut(id).ok_or(TreeError::Missing { id })?;
        entry.component.take().ok_or(TreeError::Busy { id })
    }

    /// Puts a lent component back. Hands it back to the caller when `id` was
    /// dismounted in the meantime.
    pub(crate) fn restore(
        &mut self,
        id: ComposerId,
        component: Box<dyn Composer>,
    ) -> Result<(), Box<dyn Composer>> {
        match self.entry_mut(id) {
            Some(entry) if entry.component.is_none() => {
                entry.component = Some(component);
                Ok(())
            }
            _ => Err(component),
        }
    }

    pub fn dump(&self) -> String {
        let mut output = String::new();
        if self.roots.is_empty() {
            output.push_str("(empty)\n");
        }
        for root in &self.roots {
            self.dump_node(&mut output, *root);
        }
        output
    }

    fn dump_node(&self, output: &mut String, id: ComposerId) {
        let Some(entry) = self.entry(id) else {
            return;
        };
        let indent = "  ".repeat(entry.depth);
        let _ = writeln!(output, "{indent}[{id}] {}", entry.name);
        for child in &entry.children {
            self.dump_node(output, *child);
        }
    }

    fn release(&mut self, id: ComposerId) -> Option<Entry> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index() as u32);
        Some(entry)
    }

    fn entry(&self, id: ComposerId) -> Option<&Entry> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entry.as_ref())
    }

    fn entry_mut(&mut self, id: ComposerId) -> Option<&mut Entry> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entry.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::error::RenderError;

    struct Leaf(u32);

    impl Composer for Leaf {
        fn render(&mut self, _ctx: &mut Context<'_>) -> Result<(), RenderError> {
            Ok(())
        }
    }

    struct Other;

    impl Composer for Other {
        fn render(&mut self, _ctx: &mut Context<'_>) -> Result<(), RenderError> {
            Ok(())
        }
    }

    fn leaf(tree: &mut ComponentTree, parent: Option<ComposerId>, value: u32) -> ComposerId {
        tree.insert(parent, Box::new(Leaf(value)), "Leaf")
            .expect("insert leaf")
    }

    #[test]
    fn child_depth_is_parent_depth_plus_one() {
        let mut tree = ComponentTree::new();
        let root = leaf(&mut tree, None, 0);
        let child = leaf(&mut tree, Some(root), 1);
        let grandchild = leaf(&mut tree, Some(child), 2);

        assert_eq!(tree.depth(root), Some(0));
        assert_eq!(tree.depth(child), Some(1));
        assert_eq!(tree.depth(grandchild), Some(2));
        assert_eq!(tree.parent(grandchild), Some(child));
        assert_eq!(tree.children(root), &[child]);
        assert_eq!(tree.roots(), &[root]);
    }

    #[test]
    fn insert_under_unmounted_parent_fails() {
        let mut tree = ComponentTree::new();
        let root = leaf(&mut tree, None, 0);
        tree.remove(root);

        let err = tree
            .insert(Some(root), Box::new(Leaf(1)), "Leaf")
            .expect_err("parent is gone");
        assert_eq!(err, TreeError::Missing { id: root });
    }

    #[test]
    fn remove_detaches_whole_subtree_children_first() {
        let mut tree = ComponentTree::new();
        let root = leaf(&mut tree, None, 0);
        let child = leaf(&mut tree, Some(root), 1);
        leaf(&mut tree, Some(child), 2);
        leaf(&mut tree, Some(root), 3);

        let removed = tree.remove(root);
        let values: Vec<u32> = removed
            .iter()
            .map(|component| {
                (**component)
                    .as_any()
                    .downcast_ref::<Leaf>()
                    .expect("leaf")
                    .0
            })
            .collect();

        assert_eq!(values, vec![2, 1, 3, 0]);
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
        assert!(!tree.is_mounted(child));
    }

    #[test]
    fn recycled_slot_does_not_alias_stale_handle() {
        let mut tree = ComponentTree::new();
        let first = leaf(&mut tree, None, 1);
        tree.remove(first);
        let second = leaf(&mut tree, None, 2);

        assert_ne!(first, second);
        assert!(!tree.is_mounted(first));
        assert_eq!(
            tree.with_component::<Leaf, _>(first, |leaf| leaf.0),
            Err(TreeError::Missing { id: first })
        );
        assert_eq!(tree.get::<Leaf>(second).map(|leaf| leaf.0), Ok(2));
    }

    #[test]
    fn with_component_reports_type_mismatch_and_busy() {
        let mut tree = ComponentTree::new();
        let id = tree
            .insert(None, Box::new(Other), "Other")
            .expect("insert");

        assert!(matches!(
            tree.with_component::<Leaf, _>(id, |_| ()),
            Err(TreeError::TypeMismatch { .. })
        ));

        let lent = tree.take(id).expect("take");
        assert_eq!(
            tree.with_component::<Other, _>(id, |_| ()),
            Err(TreeError::Busy { id })
        );
        assert!(tree.restore(id, lent).is_ok());
        assert!(tree.with_component::<Other, _>(id, |_| ()).is_ok());
    }

    #[test]
    fn restore_after_dismount_hands_component_back() {
        let mut tree = ComponentTree::new();
        let id = leaf(&mut tree, None, 7);
        let lent = tree.take(id).expect("take");

        assert!(tree.remove(id).is_empty());
        assert!(tree.restore(id, lent).is_err());
    }

    #[test]
    fn dump_indents_by_depth() {
        let mut tree = ComponentTree::new();
        assert_eq!(tree.dump(), "(empty)\n");

        let root = leaf(&mut tree, None, 0);
        let child = leaf(&mut tree, Some(root), 1);
        let dump = tree.dump();

        assert_eq!(dump, format!("[{root}] Leaf\n  [{child}] Leaf\n"));
    }
}

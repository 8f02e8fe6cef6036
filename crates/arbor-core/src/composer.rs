use std::any::Any;
use std::fmt;

use crate::context::Context;
use crate::error::RenderError;

/// Distance of a component from the root of its tree. Roots sit at depth 0.
pub type Depth = usize;

/// Stable handle to a mounted component.
///
/// Two handles are equal only when they point at the same mount. Slots are
/// recycled with a bumped generation, so a handle kept past its dismount never
/// resolves to whatever gets mounted in its place later.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComposerId {
    index: u32,
    generation: u32,
}

impl ComposerId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) fn index(self) -> usize {
        self.index as usize
    }

    pub(crate) fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ComposerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Type-erased access to a component, implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A participant in the component tree.
///
/// Depth and mounted state belong to the tree, not to the component value;
/// query them through [`Context::depth`] and [`Context::is_mounted`].
pub trait Composer: AsAny {
    /// Produces the component's current output. Called at most once per
    /// update pass while the component is mounted and pending.
    fn render(&mut self, ctx: &mut Context<'_>) -> Result<(), RenderError>;

    fn on_mount(&mut self, _ctx: &mut Context<'_>) {}

    fn on_dismount(&mut self) {}
}

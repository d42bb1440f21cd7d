//! # Component System
//!
//! Components are plain data attached to entities. Tags are components with
//! no payload: presence or absence is the only information they carry, and
//! they mark which pipeline stage an entity is waiting in.

/// Marker trait for storable component types.
///
/// Components must be:
/// - `Send + Sync`: parallel passes hand out `&mut` to worker threads
/// - `'static`: stores are looked up by `TypeId`
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Debug, Default)]
/// struct Health(u32);
///
/// impl Component for Health {}
/// ```
pub trait Component: Send + Sync + 'static {
    /// Set for zero-payload marker types.
    ///
    /// Consuming passes remove every tag type in their query from each
    /// matched entity after the traversal. Every [`Tag`] has it set.
    /// Registration rejects a flagged type that is not zero-sized.
    const IS_TAG: bool = false;
}

/// Zero-payload stage marker.
///
/// Implementing `Tag` also implements [`Component`] with
/// [`IS_TAG`](Component::IS_TAG) set, so a type used as a pass's output tag
/// is always consumed when a later pass reads it.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Debug, Default)]
/// struct NeedsMesh;
///
/// impl Tag for NeedsMesh {}
/// ```
pub trait Tag: Default + Send + Sync + 'static {}

impl<T: Tag> Component for T {
    const IS_TAG: bool = true;
}

/// Returns the short type name used in errors and logs.
#[must_use]
pub(crate) fn short_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    // Generic arguments keep their paths; only trim the outer path.
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

//! # Component Types
//!
//! A component is any `'static` value type. Each registered type is given a
//! [`ComponentId`], its bit position in a fixed-width [`ComponentMask`].
//! Dependency lists are written as tuples of types ([`ComponentSet`]).

use std::any::{type_name, TypeId};
use std::fmt;

/// Width of [`ComponentMask`]; the hard upper bound on registered types.
pub const MAX_COMPONENTS: usize = 64;

/// Marker trait for ECS components.
///
/// Blanket-implemented: any `'static` type can be stored.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Debug, Default)]
/// struct Position { x: f32, y: f32 }
///
/// world.register::<Position, ()>();
/// ```
pub trait Component: 'static {}

impl<T: 'static> Component for T {}

/// Bit position assigned to a component type at registration.
///
/// Positions are handed out sequentially and never reassigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ComponentId(u8);

impl ComponentId {
    /// Creates a component ID from a bit position.
    ///
    /// # Panics
    ///
    /// Panics if `bit` is not below [`MAX_COMPONENTS`].
    #[inline]
    #[must_use]
    pub const fn new(bit: u8) -> Self {
        assert!((bit as usize) < MAX_COMPONENTS, "Component bit out of range");
        Self(bit)
    }

    /// Returns the bit position.
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u8 {
        self.0
    }

    /// Index into per-type tables.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fixed-width set of component bit positions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ComponentMask(u64);

impl ComponentMask {
    /// The mask with no bits set.
    pub const EMPTY: Self = Self(0);

    /// Creates a mask from raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns this mask with `id` set.
    #[inline]
    #[must_use]
    pub const fn with(self, id: ComponentId) -> Self {
        Self(self.0 | (1 << id.0))
    }

    /// Sets the bit for `id`. Returns `false` if it was already set.
    #[inline]
    pub fn insert(&mut self, id: ComponentId) -> bool {
        let was_clear = !self.contains(id);
        self.0 |= 1 << id.0;
        was_clear
    }

    /// Clears the bit for `id`.
    #[inline]
    pub fn remove(&mut self, id: ComponentId) {
        self.0 &= !(1 << id.0);
    }

    /// Checks if the bit for `id` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, id: ComponentId) -> bool {
        (self.0 & (1 << id.0)) != 0
    }

    /// Checks if every bit of `other` is set in `self`.
    #[inline]
    #[must_use]
    pub const fn contains_all(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Bits set in both masks.
    #[inline]
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Bits set in `self` but not in `other`.
    #[inline]
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Bits set in exactly one of the masks.
    #[inline]
    #[must_use]
    pub const fn symmetric_difference(self, other: Self) -> Self {
        Self(self.0 ^ other.0)
    }

    /// Checks if no bit is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of bits set.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates over the set bit positions, lowest first.
    pub fn iter(self) -> MaskIter {
        MaskIter(self.0)
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentMask({:#b})", self.0)
    }
}

impl fmt::Display for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, id) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{id}")?;
        }
        f.write_str("}")
    }
}

impl FromIterator<ComponentId> for ComponentMask {
    fn from_iter<I: IntoIterator<Item = ComponentId>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl IntoIterator for ComponentMask {
    type Item = ComponentId;
    type IntoIter = MaskIter;

    fn into_iter(self) -> MaskIter {
        self.iter()
    }
}

/// Iterator over the bit positions of a [`ComponentMask`].
#[derive(Clone, Debug)]
pub struct MaskIter(u64);

impl Iterator for MaskIter {
    type Item = ComponentId;

    #[inline]
    fn next(&mut self) -> Option<ComponentId> {
        if self.0 == 0 {
            return None;
        }
        // trailing_zeros of a non-zero u64 is below 64
        let bit = self.0.trailing_zeros() as u8;
        self.0 &= self.0 - 1;
        Some(ComponentId(bit))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for MaskIter {}

/// Compile-time identity of a component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentKey {
    /// Type identity used for registry lookups.
    pub type_id: TypeId,
    /// Type name used in diagnostics.
    pub name: &'static str,
}

impl ComponentKey {
    /// Key for the component type `T`.
    #[inline]
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

/// A list of component types, written as a tuple.
///
/// Used for required lists at registration/attach time and sustained lists
/// at detach time. Implemented for `()` and tuples of up to 8 types.
///
/// ```rust,ignore
/// world.register::<Velocity, (Position,)>();
/// world.register::<Collider, (Position, Shape)>();
/// ```
pub trait ComponentSet: 'static {
    /// Calls `f` with the key of each member type, in order.
    fn visit(f: &mut dyn FnMut(ComponentKey));
}

impl ComponentSet for () {
    #[inline]
    fn visit(_: &mut dyn FnMut(ComponentKey)) {}
}

macro_rules! impl_component_set {
    ($($ty:ident),+) => {
        impl<$($ty: Component),+> ComponentSet for ($($ty,)+) {
            #[inline]
            fn visit(f: &mut dyn FnMut(ComponentKey)) {
                $( f(ComponentKey::of::<$ty>()); )+
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    struct Alpha;
    #[allow(dead_code)]
    struct Beta;

    #[test]
    fn test_mask_insert_remove() {
        let mut mask = ComponentMask::EMPTY;
        let id = ComponentId::new(5);
        assert!(!mask.contains(id));

        assert!(mask.insert(id));
        assert!(!mask.insert(id));
        assert!(mask.contains(id));

        mask.remove(id);
        assert!(!mask.contains(id));
        assert!(mask.is_empty());
    }

    #[test]
    fn test_mask_set_operations() {
        let a: ComponentMask = [0, 1, 2].into_iter().map(ComponentId::new).collect();
        let b: ComponentMask = [1, 63].into_iter().map(ComponentId::new).collect();

        assert_eq!(a.len(), 3);
        assert!(a.contains_all(ComponentMask::EMPTY.with(ComponentId::new(1))));
        assert!(!a.contains_all(b));
        assert_eq!(a.intersection(b).bits(), 0b10);
        assert_eq!(a.difference(b).bits(), 0b101);
        assert_eq!(
            a.symmetric_difference(b).iter().map(ComponentId::bit).collect::<Vec<_>>(),
            vec![0, 2, 63]
        );
    }

    #[test]
    fn test_mask_display() {
        let mask = ComponentMask::EMPTY
            .with(ComponentId::new(4))
            .with(ComponentId::new(0));
        assert_eq!(mask.to_string(), "{#0, #4}");
        assert_eq!(ComponentMask::EMPTY.to_string(), "{}");
    }

    #[test]
    #[should_panic(expected = "Component bit out of range")]
    fn test_component_id_bounds() {
        let _ = ComponentId::new(64);
    }

    #[test]
    fn test_component_set_visits_in_order() {
        let mut seen = Vec::new();
        <(Alpha, Beta)>::visit(&mut |key| seen.push(key));
        assert_eq!(seen, vec![ComponentKey::of::<Alpha>(), ComponentKey::of::<Beta>()]);

        let mut count = 0;
        <()>::visit(&mut |_| count += 1);
        assert_eq!(count, 0);
    }
}

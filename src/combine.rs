//! The value-level `⊕` operation that `UPDATE` messages fold onto standing
//! values.
//!
//! The default value `V₀` a fresh update seeds from is a caller-supplied
//! constructor argument rather than part of this trait, since it is a
//! value of `V`, not a capability of the combinator, and must be
//! suppliable independent of any `V: Default` bound.
pub trait Combine<V> {
    /// Fold `operand` onto `base` (`base ⊕ operand`). Must be associative
    /// in the order messages are replayed (oldest-first at query time);
    /// need not be commutative.
    fn combine(&self, base: V, operand: &V) -> V;
}

/// Blanket impl so a plain closure can serve as a [`Combine`], matching how
/// most callers will want to supply `⊕` for simple value types like string
/// concatenation or numeric addition.
impl<V, F> Combine<V> for F
where
    F: Fn(V, &V) -> V,
{
    fn combine(&self, base: V, operand: &V) -> V {
        self(base, operand)
    }
}

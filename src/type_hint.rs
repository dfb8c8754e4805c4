use std::marker::PhantomData;

/// Zero-sized marker for publishers whose output or failure type appears in no
/// field, such as [`Empty`](crate::publisher::Empty).
///
/// Unlike a bare `PhantomData<T>` it is `Send + Sync` whatever `T` is, since
/// no `T` is ever stored.
pub struct TypeHint<T>(PhantomData<fn() -> T>);

impl<T> TypeHint<T> {
  #[inline]
  pub fn new() -> Self { Self::default() }
}

impl<T> Default for TypeHint<T> {
  fn default() -> Self { TypeHint(PhantomData) }
}

impl<T> Clone for TypeHint<T> {
  #[inline]
  fn clone(&self) -> Self { Self::new() }
}

impl<T> Copy for TypeHint<T> {}

impl<T> std::fmt::Debug for TypeHint<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(std::any::type_name::<T>())
  }
}

/// Rounds `$value` up to the next multiple of `$align`.
///
/// `$align` must be a power of two. This is the size-class rounding used by
/// the pool: with the default alignment of 8, a request of 13 bytes lands in
/// the 16 byte class.
///
/// # Examples
///
/// ```rust
/// use rstl::align_to;
///
/// assert_eq!(align_to!(13usize, 8), 16);
/// assert_eq!(align_to!(16usize, 8), 16);
/// assert_eq!(align_to!(0usize, 8), 0);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    (($value) + ($align) - 1) & !(($align) - 1)
  };
}

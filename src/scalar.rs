//! Element capability bounds for strided traversal.
//!
//! Traversal code is written once against these traits; the element
//! representation (real, complex, boolean, anything `Copy`) decides the rest.

use num_complex::Complex;

/// Shared trait bounds for element types usable with the traversal engine.
pub trait Scalar: Copy + Send + Sync + PartialEq + std::fmt::Debug {}

impl<T> Scalar for T where T: Copy + Send + Sync + PartialEq + std::fmt::Debug {}

/// Element types with a truthiness convention, used by the counting and
/// existence reductions (`any`, `all`, `count_truthy`, ...).
///
/// Numeric types are truthy iff nonzero (NaN compares unequal to zero and is
/// therefore truthy); `bool` is its own truth value; complex numbers are
/// truthy iff either component is nonzero.
pub trait Truthy: Scalar {
    fn is_truthy(&self) -> bool;
}

impl Truthy for bool {
    #[inline]
    fn is_truthy(&self) -> bool {
        *self
    }
}

macro_rules! impl_truthy_numeric {
    ($($t:ty),*) => {
        $(
            impl Truthy for $t {
                #[inline]
                fn is_truthy(&self) -> bool {
                    !num_traits::Zero::is_zero(self)
                }
            }
        )*
    };
}

impl_truthy_numeric!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl<T> Truthy for Complex<T>
where
    T: num_traits::Num + Copy + Send + Sync + std::fmt::Debug,
{
    #[inline]
    fn is_truthy(&self) -> bool {
        !num_traits::Zero::is_zero(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    fn assert_scalar<T: Scalar>() {}

    #[test]
    fn test_standard_types() {
        assert_scalar::<f32>();
        assert_scalar::<f64>();
        assert_scalar::<i32>();
        assert_scalar::<bool>();
        assert_scalar::<Complex64>();
    }

    #[test]
    fn test_truthy_numeric() {
        assert!(3i32.is_truthy());
        assert!((-2i64).is_truthy());
        assert!(!0u8.is_truthy());
        assert!(0.5f64.is_truthy());
        assert!(!0.0f64.is_truthy());
        assert!(f64::NAN.is_truthy());
    }

    #[test]
    fn test_truthy_bool() {
        assert!(true.is_truthy());
        assert!(!false.is_truthy());
    }

    #[test]
    fn test_truthy_complex() {
        assert!(Complex64::new(0.0, 1.0).is_truthy());
        assert!(Complex64::new(1.0, 0.0).is_truthy());
        assert!(!Complex64::new(0.0, 0.0).is_truthy());
    }
}

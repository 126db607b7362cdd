/// Ceiling division helpers for tile counts.
pub(crate) trait DivCeil: Sized {
    fn msrv_div_ceil(self, rhs: Self) -> Self;
}

impl DivCeil for usize {
    #[inline]
    fn msrv_div_ceil(self, rhs: Self) -> Self {
        let d = self / rhs;
        let r = self % rhs;
        if r > 0 {
            d + 1
        } else {
            d
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn div_ceil() {
        assert_eq!(0usize.msrv_div_ceil(4), 0);
        assert_eq!(4usize.msrv_div_ceil(4), 1);
        assert_eq!(5usize.msrv_div_ceil(4), 2);
        assert_eq!(1usize.msrv_div_ceil(1), 1);
    }
}

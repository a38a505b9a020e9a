/// Merge a value with another layer of settings, `other` taking precedence where it has one.
pub trait Coalesce<O = Self> {
    fn coalesce(self, other: &O) -> Self;
}

impl<T: Clone> Coalesce for Option<T> {
    fn coalesce(self, other: &Self) -> Self {
        other.clone().or(self)
    }
}

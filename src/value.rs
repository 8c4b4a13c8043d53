use std::rc::Rc;

/// Change-detection policy for values held in reactive containers.
///
/// `same_as` decides whether a write is a no-op. The default is deliberately
/// conservative: every write counts as a change, even when the new value is
/// an identical clone of the old one. Composite values are routinely mutated
/// in place before being written back, and the engine cannot see inside
/// them, so re-notifying is the safe choice. Primitive-like types override
/// `same_as` with value equality, which is what makes repeated writes of the
/// same number or string free.
///
/// Custom types opt in with an empty impl (conservative) or their own
/// `same_as`:
///
/// ```
/// #[derive(Clone)]
/// struct Profile {
///     name: String,
/// }
/// impl boxcell::Value for Profile {}
/// ```
pub trait Value: Clone + 'static {
    /// Returns `true` if writing `self` over `other` warrants no
    /// notification.
    fn same_as(&self, other: &Self) -> bool {
        let _ = other;
        false
    }
}

macro_rules! value_by_eq {
    ($($t:ty),* $(,)?) => {
        $(
            impl Value for $t {
                fn same_as(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

// `f32`/`f64` use `==`, so a NaN never equals itself and always re-notifies.
value_by_eq!(
    u8, u16, u32, u64, u128, usize,
    i8, i16, i32, i64, i128, isize,
    f32, f64,
    bool, char, (),
    String, &'static str,
);

impl<T: Value> Value for Option<T> {
    fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same_as(b),
            _ => false,
        }
    }
}

// Shared and growable values keep the conservative default: an identical
// handle may hide contents that were mutated in place.
impl<T: 'static> Value for Rc<T> {}
impl<T: Clone + 'static> Value for Vec<T> {}

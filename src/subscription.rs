use std::mem::take;

#[cfg(test)]
mod tests;

/// Handle for an active subscription.
///
/// Dropping the handle unsubscribes, so every subscription is paired with
/// exactly one unsubscription. Hold it for as long as notifications should
/// keep arriving.
#[derive(Default)]
#[must_use]
pub struct Subscription(RawSubscription);

impl Subscription {
    /// A subscription that does nothing when dropped.
    pub fn empty() -> Self {
        Subscription(RawSubscription::Empty)
    }
    /// A subscription that runs `f` when dropped.
    pub fn from_fn(f: impl FnOnce() + 'static) -> Self {
        Subscription(RawSubscription::Fn(Box::new(f)))
    }
}
impl Drop for Subscription {
    fn drop(&mut self) {
        match take(&mut self.0) {
            RawSubscription::Empty => {}
            RawSubscription::Fn(f) => f(),
        }
    }
}

#[derive(Default)]
enum RawSubscription {
    #[default]
    Empty,
    Fn(Box<dyn FnOnce() + 'static>),
}

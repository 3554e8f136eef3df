//! Small helper trait used where the reconciler needs to replace the `Ok`
//! value of a `Result` in place and keep working with a reference to it,
//! mirroring `Option::insert`.

/// Extension of `Result<T, E>` that lets a slot be overwritten with a known
/// good value and immediately handed back by reference, without a second
/// match on the `Result` the caller just wrote.
pub(crate) trait ResultInsert<T, E> {
    /// Overwrite `self` with `Ok(value)` and return a reference to it.
    fn insert_ok(&mut self, value: T) -> &T;
}

impl<T, E> ResultInsert<T, E> for std::result::Result<T, E> {
    fn insert_ok(&mut self, value: T) -> &T {
        *self = Ok(value);
        match self {
            Ok(v) => v,
            Err(_) => unreachable!("just inserted an Ok value"),
        }
    }
}

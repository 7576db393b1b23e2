//! Bounded retry.
//!
//! Crossover, mutation and requirement-driven synthesis all follow the same
//! shape: try an operation a fixed number of times, then fall back. The
//! fallback usually needs the same mutable state as the operation (the RNG,
//! the selection stream), so [`attempt`] reports exhaustion as `None` and
//! leaves the fallback to the caller.

/// Runs `op` up to `max_tries` times.
///
/// `op` receives the zero-based attempt number and returns:
///
/// - `Ok(Some(value))` to finish with `value`,
/// - `Ok(None)` to request another attempt,
/// - `Err(e)` to abort immediately with `e`.
///
/// Returns `Ok(None)` when every attempt asked for a retry.
///
/// # Examples
///
/// ```
/// use u_gpsearch::retry::attempt;
///
/// let found: Result<Option<usize>, ()> = attempt(10, |i| Ok((i == 3).then_some(i)));
/// assert_eq!(found, Ok(Some(3)));
///
/// let fallback = attempt::<usize, ()>(2, |_| Ok(None)).map(|v| v.unwrap_or(99));
/// assert_eq!(fallback, Ok(99));
/// ```
pub fn attempt<T, E>(
    max_tries: usize,
    mut op: impl FnMut(usize) -> Result<Option<T>, E>,
) -> Result<Option<T>, E> {
    for i in 0..max_tries {
        if let Some(value) = op(i)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

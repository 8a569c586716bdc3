/// Thread count asked for on the command line ("auto" or a number).
#[cfg_attr(not(feature = "parallel"), allow(dead_code))]
pub fn thread_count(spec: &str) -> usize {
    if spec.eq_ignore_ascii_case("auto") {
        num_cpus::get()
    } else {
        spec.parse().unwrap_or_else(|_| num_cpus::get())
    }
}

/// Size the global rayon pool used for per-hour evaluation.
///
/// Returns `None` when built without the `parallel` feature, where nothing
/// runs on the pool.
#[cfg(feature = "parallel")]
pub fn configure_threads(spec: &str) -> Option<usize> {
    let count = thread_count(spec);
    let _ = rayon::ThreadPoolBuilder::new().num_threads(count).build_global();
    Some(count)
}

#[cfg(not(feature = "parallel"))]
pub fn configure_threads(_spec: &str) -> Option<usize> {
    None
}

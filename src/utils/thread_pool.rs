use rayon::ThreadPoolBuilder;

/// Build the bounded hashing pool for one capture run.
///
/// # Errors
///
/// Returns an error if the thread pool cannot be created
pub fn build_hash_pool(num_threads: usize) -> anyhow::Result<rayon::ThreadPool> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .thread_name(|i| format!("statediff-hash-{i}"))
        .build()?;
    Ok(pool)
}

use anyhow::Result;

/// One unit of work the batch engine can run for each item.
///
/// Implementations are driven on the engine's own task and never spawned,
/// so they need not be `Send`. Returning `Err` marks the item failed; the
/// engine turns the error into a per-item record instead of stopping.
pub trait Worker<T> {
    type Output;

    async fn process(&self, item: &T) -> Result<Self::Output>;
}

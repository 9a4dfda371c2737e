//! `smem rate`: attach a 1-5 star rating to a stored memory.

use anyhow::Result;

use session_memory_core::retrieval::MemoryApi;

pub async fn run_rate(api: &MemoryApi, id: &str, rating: u8) -> Result<()> {
    api.rate(id, rating).await?;
    println!("Rated {} {}/5", id, rating);
    Ok(())
}

use travelrag_core::settings::ModelSettings;
use travelrag_core::traits::Embedder;
use travelrag_embed::{cosine, get_default_embedder};

fn main() -> anyhow::Result<()> {
    let embedder = get_default_embedder(&ModelSettings::default())?;
    let texts = vec!["When can I check out?".to_string(), "Question: What time is checkout?\nAnswer: 3 PM".to_string()];
    let embs = embedder.embed_batch(&texts)?;
    println!("B={} dim={} cos={:.3}", embs.len(), embedder.dim(), cosine(&embs[0], &embs[1]));
    Ok(())
}

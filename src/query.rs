//! One-shot query commands for the CLI.

use anyhow::Result;

use crate::app::App;
use crate::error::Error;

/// Run the full pipeline for `question` and print the envelope as JSON.
pub async fn run_ask(app: &App, question: &str) -> Result<()> {
    match app.router.ask(question).await {
        Ok(envelope) => println!("{}", serde_json::to_string_pretty(&envelope)?),
        Err(Error::GuardrailRejection(msg)) => {
            println!("{}", serde_json::json!({ "error": msg }));
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Print every neighbour the retriever saw and the resulting decision.
pub async fn run_kb_query(app: &App, question: &str, threshold: Option<f32>) -> Result<()> {
    let retriever = app.router.retriever();
    let threshold = threshold.unwrap_or(retriever.threshold());
    let lookup = retriever.lookup_with_threshold(question, threshold).await?;

    if lookup.candidates.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for c in &lookup.candidates {
        let score = c
            .score
            .map(|s| format!("{:.4}", s))
            .unwrap_or_else(|| "-".to_string());
        println!("{}. [{}] id={}", c.rank + 1, score, c.entry.id);
        println!("    question: \"{}\"", c.entry.question.replace('\n', " ").trim());
        println!();
    }

    if lookup.is_hit() {
        println!("decision: hit (threshold {:.2})", threshold);
    } else {
        println!("decision: miss (threshold {:.2})", threshold);
    }
    Ok(())
}

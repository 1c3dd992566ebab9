use crate::entry::KnowledgeEntry;
use crate::store::SupportStore;
use flama_core::Department;
use tracing::warn;

/// Case-insensitive substring match of `query` against topic, content,
/// and keywords; matches are formatted for prompt injection. Empty string
/// when nothing matches.
pub fn format_grounding(entries: &[KnowledgeEntry], query: &str) -> String {
    let q = query.to_lowercase();
    entries
        .iter()
        .filter(|e| {
            e.topic.to_lowercase().contains(&q)
                || e.content.to_lowercase().contains(&q)
                || e.keywords.to_lowercase().contains(&q)
        })
        .map(|e| format!("Tópico: {} - Info: {}", e.topic, e.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Department-scoped grounding text for a query. Lookup failures degrade
/// to an empty grounding; they never reach the caller.
pub async fn grounding_for(store: &dyn SupportStore, department: Department, query: &str) -> String {
    match store.list_knowledge(department).await {
        Ok(entries) => format_grounding(&entries, query),
        Err(e) => {
            warn!(department = %department, error = %e, "Knowledge lookup failed, using empty grounding");
            String::new()
        }
    }
}

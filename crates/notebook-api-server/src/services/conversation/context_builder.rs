use tracing::debug;

use super::types::RetrievedDocument;
use crate::utils::token_estimator::estimate_tokens;

/// Header line introducing one document in the prompt context.
pub fn document_header(doc: &RetrievedDocument) -> String {
    format!(
        "\n[Document: {} | id: {}]\n",
        doc.title.as_deref().unwrap_or("Untitled"),
        doc.document_id
    )
}

/// Text block for one excerpt; the first excerpt of a document carries its header.
pub fn excerpt_block(doc: &RetrievedDocument, first: bool, excerpt: &str) -> String {
    if first {
        format!("{}{}\n", document_header(doc), excerpt)
    } else {
        format!("{}\n", excerpt)
    }
}

/// Full context text for the documents, in order.
pub fn render_documents(documents: &[RetrievedDocument]) -> String {
    let mut context = String::new();
    for doc in documents {
        if doc.excerpts.is_empty() {
            context.push_str(&document_header(doc));
            continue;
        }
        for (i, excerpt) in doc.excerpts.iter().enumerate() {
            context.push_str(&excerpt_block(doc, i == 0, excerpt));
        }
    }
    context
}

/// Keep the excerpts that fit `max_tokens`, best document first.
///
/// An excerpt that does not fit is skipped and later, smaller ones are still
/// tried. Documents left with no excerpt are dropped, so the result is exactly
/// the set of documents the generation engine will see.
pub fn fit_to_budget(documents: Vec<RetrievedDocument>, max_tokens: usize) -> Vec<RetrievedDocument> {
    let mut used = 0;
    let mut fitted = Vec::with_capacity(documents.len());
    let mut skipped = 0usize;

    for doc in documents {
        if doc.excerpts.is_empty() {
            let cost = estimate_tokens(&document_header(&doc));
            if used + cost <= max_tokens {
                used += cost;
                fitted.push(doc);
            } else {
                skipped += 1;
            }
            continue;
        }

        let mut kept: Vec<String> = Vec::with_capacity(doc.excerpts.len());
        for excerpt in &doc.excerpts {
            let cost = estimate_tokens(&excerpt_block(&doc, kept.is_empty(), excerpt));
            if used + cost > max_tokens {
                skipped += 1;
                continue;
            }
            used += cost;
            kept.push(excerpt.clone());
        }

        if !kept.is_empty() {
            fitted.push(RetrievedDocument {
                excerpts: kept,
                ..doc
            });
        }
    }

    if skipped > 0 {
        debug!(used, max = max_tokens, skipped, "Document context truncated");
    }
    fitted
}

//! Prompt templates for answering and fact-checking.

use crate::retrieval::RetrievedResult;

/// Separator placed between context blocks and search results.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Render retrieved chunks as `Document i:` blocks, each followed by its citation.
pub fn build_context(results: &[RetrievedResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(index, result)| {
            format!(
                "Document {}:\n{}\n{}",
                index + 1,
                result.chunk.text(),
                result.citation()
            )
        })
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// Instruction prompt sent to the answering model.
pub fn answer_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a helpful AI assistant that answers questions based on provided documents.

Context from documents:

{context}

Question: {question}

Instructions:
- Answer based ONLY on the context above
- If the context doesn't contain the answer, say \"I don't have enough information to answer that\"
- Cite your sources (mention the document name)
- Be concise but complete

Answer:"
    )
}

/// Fact-checking prompt sent to the validation model.
pub fn validation_prompt(context: &str, answer: &str) -> String {
    format!(
        "You are a fact-checker. Your job is to verify if an answer is supported by the provided context.

Context from documents:
{context}

Proposed Answer:
{answer}

Question: Is the proposed answer fully supported by the context?

Respond with:
- \"VALID\" if the answer is supported by the context
- \"INVALID: [reason]\" if the answer contains information not in the context or contradicts it
- \"PARTIAL: [explanation]\" if the answer is partially supported

Your response:"
    )
}

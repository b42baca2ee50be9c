//! Prompt templates for grounded generation

use super::PromptContext;

/// Grounded question answering over retrieved articles
pub fn answer_prompt(question: &str, context: &PromptContext) -> String {
    format!(
        "You are a biomedical research assistant. Answer the following question based ONLY on the provided documents. \
        If the documents don't contain enough information, say so. Do not make up information.\n\
        Refer to sources as [Document N].\n\n\
        Question: {}\n\n\
        Documents:\n{}\n\n\
        Answer:",
        question.trim(),
        context.text()
    )
}

/// Summary of caller-supplied articles
pub fn summary_prompt(context: &PromptContext) -> String {
    format!(
        "Summarize the key findings of the following biomedical articles in a few short paragraphs. \
        Mention where the articles agree or disagree. Use only the information given.\n\n\
        {}\n\n\
        Summary:",
        context.text()
    )
}

/// Search overview: a neutral introduction to what a query is about
pub fn overview_prompt(query: &str, context: &PromptContext) -> String {
    format!(
        "You are a helpful search assistant. The user has entered the following query: \"{}\"\n\n\
        Here are the relevant documents:\n{}\n\n\
        Based on these documents and the query, provide a concise, neutral overview of what this query is about. \
        Explain the main topic, possible subtopics and the aspects that might be relevant, \
        synthesizing information from the documents into an informative introduction.",
        query.trim(),
        context.text()
    )
}

/// Free-form prompt, preceded by a context block when one was assembled
pub fn with_context(prompt: &str, context: &PromptContext) -> String {
    if context.is_empty() {
        return prompt.to_string();
    }
    format!("Context:\n{}\n\n{}", context.text(), prompt)
}

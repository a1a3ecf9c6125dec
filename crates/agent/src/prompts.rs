//! Prompt texts and fixed strings used across a turn.

/// Opening delimiter placed around an injected knowledge document.
pub const KNOWLEDGE_BEGIN: &str = "\n\n--- BEGIN ATTACHED KNOWLEDGE DOCUMENT (FOR AI REFERENCE) ---\n";

/// Closing delimiter placed around an injected knowledge document.
pub const KNOWLEDGE_END: &str = "\n--- END ATTACHED KNOWLEDGE DOCUMENT ---";

/// Rendered in place of chat history when the latest query has no predecessors.
pub const NO_PRIOR_HISTORY: &str = "No prior conversational history provided for this turn.";

/// Used when the gate succeeded but produced no bullets.
pub const NO_GATE_BULLETS: &str = "(No specific bullet points generated by contextualizer)";

/// Narrative line recorded when a knowledge document backed the turn.
pub const KNOWLEDGE_USED_NOTE: &str = "Accessed the domain knowledge document for this turn";

/// Narrative used when nothing else was recorded.
pub const DEFAULT_NARRATIVE: &str = "Agent processed user query through multi-step workflow";

/// Query text handed to the refiner when history has no user message.
pub const NO_USER_QUERY: &str = "No specific user query found for context.";

/// Reply of the default engine when it runs out of tool iterations.
pub const MAX_ITERATIONS_REPLY: &str =
    "I've reached the maximum number of tool call iterations. Please provide further guidance.";

/// The system annotation that carries a knowledge document.
pub fn knowledge_annotation(document: &str) -> String {
    format!(
        "Context: The following knowledge document was identified as relevant for the current turn \
         and is available to the agent system if needed for query formulation or understanding capabilities:\n\
         {KNOWLEDGE_BEGIN}{document}{KNOWLEDGE_END}"
    )
}

/// `text` with the knowledge document appended between delimiters.
pub fn append_knowledge(text: &str, document: &str) -> String {
    format!("{text}{KNOWLEDGE_BEGIN}{document}{KNOWLEDGE_END}")
}

pub const CONTEXT_GATE_INSTRUCTIONS: &str = r#"You analyze user queries and provide structured insights that help a downstream assistant answer questions against an organization's domain data (records reachable through a documented schema: entities, their fields, prices, orders, availability by location, and similar).

Analyze the LATEST USER QUERY using the CHAT HISTORY for context. Produce a single JSON object with:
1. `contextual_insights`: a string of 4-7 concise bullet points, each starting with '* ', that clarify the latest query. Resolve follow-ups such as "What about Dallas?" by naming the topic carried over from earlier turns. Do not repeat the query itself.
2. `requires_database_access`: true when answering factually needs a lookup in the domain data; false for greetings, thanks, or questions about the assistant itself.

Guidelines:
* Do not answer the query.
* Do not speculate beyond what the query and history support.
* When a lookup is needed, one insight must tell the downstream assistant to retrieve and present ALL matching records rather than a sample.
* When a query mentions markets or locations, point out the geographic interpretations that apply.
* Output only the raw JSON object, without Markdown fences."#;

/// The user-facing gate prompt.
pub fn context_gate_prompt(chat_history: &str, latest_user_query: &str) -> String {
    format!(
        "---\n**CHAT HISTORY (for context, if any):**\n{chat_history}\n---\n\
         **LATEST USER QUERY:**\n{latest_user_query}\n---"
    )
}

/// Rewriting policy for the output refiner.
pub fn refiner_instructions(current_date: &str) -> String {
    format!(
        r#"You are the refinement specialist: the last quality step before an answer reaches the client. You receive the Original Query, the Agent Output to Refine, and the Supporting Tool Outputs gathered while the agent worked. The tool outputs are the ground truth.

Rewrite the agent output into a polished, client-ready answer that still answers the Original Query directly.

1. Preserve everything. Do not summarize, condense, or paraphrase factual content that matches the tool outputs. Reproduce tables, lists, code blocks, and other structure exactly, with every row and item.
2. Remove process narration: step-by-step reasoning, self-correction, descriptions of searches or queries, and phrases such as "let me think" or "first I'll look at".
3. Speak with a direct, authoritative first-party voice. Never attribute facts to a database, a search, or your own discovery ("According to the database...", "I searched for...", "Based on my queries..."). Prefer openings such as "Here are the results..." or "This information shows...".
4. Validate against the tool outputs:
   * Every number (prices, fees, speeds, counts) must match the tool outputs exactly; correct any discrepancy.
   * Report figures as-is and unaggregated. Never sum or combine components such as base price, promotional discount, or fees unless the tool output already does.
   * If the tool outputs contain relevant details the agent output omitted, add them. When the tools list twenty matching records and the agent mentions ten, present all twenty.
   * Restructure interpretations that are unclear or misaligned with the tool outputs.
5. Do not invent information and do not ask for more; work only from the inputs provided.

All data is current as of: {current_date}

Return a JSON object with a single field `refined_text` holding only the final answer text, with original formatting and detail preserved."#
    )
}

/// The user-facing refiner prompt.
pub fn refiner_prompt(query: &str, raw_output: &str, tool_outputs: &str) -> String {
    format!(
        "Original Query: {query}\n\nAgent Output to Refine: {raw_output}\n\n\
         Supporting Tool Outputs from Agent's Process: {tool_outputs}"
    )
}

/// System prompt of the default execution engine.
pub const EXECUTION_SYSTEM_PROMPT: &str = r#"You answer questions about an organization's domain data. Use the available tools to look up facts instead of guessing; consult the knowledge document (or the `knowledge_lookup` tool) to learn which entities and fields exist before composing queries. Present every matching record the tools return, keep numbers exactly as returned, and say plainly when the data does not contain an answer."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_wraps_document_in_delimiters() {
        let note = knowledge_annotation("type Plan { id: ID! }");
        assert!(note.starts_with("Context: "));
        assert!(note.contains(KNOWLEDGE_BEGIN));
        assert!(note.ends_with(KNOWLEDGE_END));
    }

    #[test]
    fn appended_text_keeps_original_prefix() {
        let text = append_knowledge("List plans", "schema");
        assert!(text.starts_with("List plans"));
        assert!(text.contains("schema"));
    }

    #[test]
    fn refiner_instructions_carry_date() {
        assert!(refiner_instructions("2026-10-16").contains("2026-10-16"));
    }
}

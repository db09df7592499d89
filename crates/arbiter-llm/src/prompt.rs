/// Instruction sent when a backend has no `system_prompt` of its own
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly chat assistant. \
Give direct, concise answers without showing any thinking process. \
Do not use <think> tags or explain your reasoning. \
Keep responses to 1-3 sentences and avoid markdown headings.";

/// Combine the base instruction with the recent conversation, if any
pub fn system_prompt(base: &str, context: &[String]) -> String {
    if context.is_empty() {
        return base.to_owned();
    }

    let mut prompt = String::with_capacity(base.len() + 32 + context.iter().map(String::len).sum::<usize>());
    prompt.push_str(base);
    prompt.push_str("\n\nRecent context:");

    for line in context {
        prompt.push('\n');
        prompt.push_str(line);
    }

    prompt
}

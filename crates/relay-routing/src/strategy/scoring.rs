//! Pure scoring heuristics used to pick and vet responses.

use relay_core::{Request, Response};

/// Completion budget assumed when a request does not cap `max_tokens`.
pub const DEFAULT_COMPLETION_TOKENS: u64 = 1000;

/// Characters per token used for prompt size estimates.
const CHARS_PER_TOKEN: u64 = 4;

/// Characters that suggest structured output (code, lists, headings).
const STRUCTURAL_MARKERS: [char; 4] = ['{', '[', '#', '*'];

/// Endings that indicate the model finished rather than being cut off.
const COMPLETE_ENDINGS: [char; 9] = ['.', '!', '?', '}', ']', ')', '`', '"', '\''];

/// Score used by parallel comparison to rank successful responses.
///
/// Longer content, faster answers, more tokens and a more preferred provider
/// all score higher:
///
/// `min(len/100, 50) + max(0, 20 - ms/1000) + min(tokens/100, 30) + max(0, 10 - priority)`
pub fn comparison_score(response: &Response, priority: i32) -> f64 {
    let length = response.content.chars().count() as f64;
    let seconds = response.response_time_ms as f64 / 1000.0;
    let tokens = response.tokens_used.unwrap_or(0) as f64;

    (length / 100.0).min(50.0)
        + (20.0 - seconds).max(0.0)
        + (tokens / 100.0).min(30.0)
        + (10.0 - f64::from(priority)).max(0.0)
}

/// Quality estimate in `0.0..=1.0` used by the cost-optimized strategy.
///
/// | Signal | Weight |
/// |---|---|
/// | content length, scaled up to 100 chars | 0.3 |
/// | any of `{ [ # *` present | 0.2 |
/// | ends like a finished sentence or block | 0.2 |
/// | more than 100 tokens reported | 0.3 |
pub fn quality_score(response: &Response) -> f64 {
    let content = response.content.trim();
    let mut score = 0.0;

    let length = content.chars().count() as f64;
    score += (length / 100.0).min(1.0) * 0.3;

    if content.contains(STRUCTURAL_MARKERS) {
        score += 0.2;
    }

    if content
        .chars()
        .last()
        .is_some_and(|last| COMPLETE_ENDINGS.contains(&last))
    {
        score += 0.2;
    }

    if response.tokens_used.is_some_and(|tokens| tokens > 100) {
        score += 0.3;
    }

    score
}

/// Token estimate for a request before it is sent.
///
/// Prompt and system prompt at four characters per token (rounded up), plus
/// the requested completion budget or [`DEFAULT_COMPLETION_TOKENS`].
pub fn estimate_tokens(request: &Request) -> u64 {
    let prompt_chars = request.prompt.chars().count()
        + request
            .system_prompt
            .as_deref()
            .map_or(0, |system| system.chars().count());
    let prompt_tokens = (prompt_chars as u64).div_ceil(CHARS_PER_TOKEN);
    let completion_tokens = request
        .max_tokens
        .map_or(DEFAULT_COMPLETION_TOKENS, u64::from);

    prompt_tokens + completion_tokens
}

/// Substrings marking a chat-capable model family
const CHAT_FAMILIES: &[&str] = &["gpt-4", "gpt-5", "o1", "o3", "chatgpt"];

/// Variants that cannot serve text conversations
const EXCLUDED_VARIANTS: &[&str] = &["realtime", "audio", "transcribe", "search"];

/// Prefixes listed first, in this order
const PRIORITY_PREFIXES: &[&str] = &[
    "gpt-4o-mini",
    "gpt-4o",
    "gpt-4.1",
    "gpt-4.1-mini",
    "o1-mini",
    "o1",
    "o3-mini",
    "o3",
    "gpt-5",
    "chatgpt-4o",
];

const UNRANKED: usize = 100;

/// Whether a model id belongs in the conversation model picker
pub fn is_chat_model(model_id: &str) -> bool {
    let lower = model_id.to_lowercase();
    CHAT_FAMILIES.iter().any(|family| lower.contains(family))
        && !EXCLUDED_VARIANTS
            .iter()
            .any(|variant| model_id.contains(variant))
}

fn rank(model_id: &str) -> usize {
    PRIORITY_PREFIXES
        .iter()
        .position(|prefix| model_id.starts_with(prefix))
        .unwrap_or(UNRANKED)
}

/// Filters a raw model listing down to chat models, most common first
pub fn chat_models<I>(model_ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut models: Vec<String> = model_ids
        .into_iter()
        .filter(|id| is_chat_model(id))
        .collect();
    models.sort_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| a.cmp(b)));
    models
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_filters_non_chat_models() {
        let models = chat_models(ids(&[
            "text-embedding-3-small",
            "whisper-1",
            "dall-e-3",
            "gpt-4o-realtime-preview",
            "gpt-4o-audio-preview",
            "gpt-4o-mini-transcribe",
            "gpt-4o-search-preview",
            "gpt-4o",
            "GPT-4-Custom",
        ]));
        assert_eq!(models, ids(&["gpt-4o", "GPT-4-Custom"]));
    }

    #[test]
    fn test_priority_order() {
        let models = chat_models(ids(&[
            "o3",
            "gpt-5",
            "gpt-4.1-mini",
            "gpt-4o",
            "chatgpt-4o-latest",
            "gpt-4-turbo",
            "gpt-4o-mini",
            "o1",
            "gpt-4.1",
        ]));
        assert_eq!(
            models,
            ids(&[
                "gpt-4o-mini",
                "gpt-4o",
                "gpt-4.1",
                "gpt-4.1-mini",
                "o1",
                "o3",
                "gpt-5",
                "chatgpt-4o-latest",
                "gpt-4-turbo",
            ])
        );
    }
}
